//! Axum Handlers for the REST API
//!
//! The speech endpoint that narration URLs resolve to, plus a health probe.
//! It uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use deckcast_core::{error::SpeechError, speech::SPEECH_CONTENT_TYPE};
use std::sync::Arc;
use tracing::{error, info};

use crate::{
    models::{ErrorResponse, HealthResponse, SpeechQuery},
    state::AppState,
};

pub enum ApiError {
    BadRequest(String),
    BadGateway(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::BadGateway(message) => {
                error!("Upstream failure: {}", message);
                (StatusCode::BAD_GATEWAY, Json(ErrorResponse { message })).into_response()
            }
        }
    }
}

impl From<SpeechError> for ApiError {
    fn from(err: SpeechError) -> Self {
        match err {
            SpeechError::EmptyText => Self::BadRequest(err.to_string()),
            SpeechError::Backend(_) => Self::BadGateway(err.to_string()),
        }
    }
}

/// Synthesize narration audio for a piece of text.
#[utoipa::path(
    get,
    path = "/api/tts",
    params(SpeechQuery),
    responses(
        (status = 200, description = "Synthesized speech", content_type = "audio/mpeg"),
        (status = 400, description = "Empty narration text", body = ErrorResponse),
        (status = 502, description = "Speech backend failed", body = ErrorResponse)
    )
)]
pub async fn synthesize_speech(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SpeechQuery>,
) -> Result<impl IntoResponse, ApiError> {
    info!(chars = query.text.len(), "Synthesizing narration");
    let audio = state.synthesizer.synthesize(&query.text).await?;
    Ok((
        [
            (header::CONTENT_TYPE, SPEECH_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
        ],
        audio,
    ))
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
