//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the speech endpoint, the WebSocket presentation endpoint and
//! the OpenAPI documentation.

use crate::{
    handlers,
    models::{ErrorResponse, HealthResponse, Message, MessageRole},
    state::AppState,
    ws::ws_handler,
};

use axum::{Router, routing::get};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Route served by [`handlers::synthesize_speech`].
pub const SPEECH_ROUTE: &str = "/api/tts";

#[derive(OpenApi)]
#[openapi(
    paths(handlers::synthesize_speech, handlers::health),
    components(schemas(ErrorResponse, HealthResponse, Message, MessageRole)),
    tags(
        (name = "Deckcast API", description = "Narrated slide presentations driven by an agent")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route(SPEECH_ROUTE, get(handlers::synthesize_speech))
        .route("/health", get(handlers::health))
        .route("/ws", get(ws_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
