//! Main Entrypoint for the Deckcast API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the chat model and speech synthesis clients.
//! 3. Constructing the Axum router and applying middleware.
//! 4. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use deckcast_api::{config::Config, router::create_router, state::AppState};
use deckcast_core::{
    llm_client::{LLMClient, OpenAICompatibleClient},
    speech::{OpenAISpeechSynthesizer, SpeechSynthesizer, parse_voice},
};
use std::{collections::HashMap, fs, net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        return;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// A helper function to load prompts from a directory.
fn load_prompts(prompts_path: &std::path::Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    for entry in fs::read_dir(prompts_path)
        .with_context(|| format!("Failed to read prompts from {}", prompts_path.display()))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            prompts.insert(prompt_key, fs::read_to_string(&path)?);
        }
    }
    Ok(prompts)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Shared Services ---
    let mut prompts = load_prompts(&config.prompts_path)?;
    let system_prompt = Arc::new(
        prompts
            .remove("system_prompt")
            .context("system_prompt.md not found in prompts directory")?,
    );

    info!(provider = ?config.provider, "Using chat provider.");
    let chat_config = OpenAIConfig::new()
        .with_api_key(config.chat_api_key())
        .with_api_base(config.provider.api_base());
    let llm_client: Arc<dyn LLMClient> = Arc::new(OpenAICompatibleClient::new(
        chat_config,
        config.chat_model.clone(),
    ));

    // Narration always goes through OpenAI's speech endpoint.
    let voice = parse_voice(&config.tts_voice).context("TTS_VOICE is not a known voice")?;
    let speech_config = OpenAIConfig::new().with_api_key(&config.openai_api_key);
    let synthesizer: Arc<dyn SpeechSynthesizer> = Arc::new(OpenAISpeechSynthesizer::new(
        speech_config,
        &config.tts_model,
        voice,
    ));

    let app_state = Arc::new(AppState {
        llm_client,
        synthesizer,
        system_prompt,
        config: Arc::new(config.clone()),
    });

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 5. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        tts_model = %config.tts_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
