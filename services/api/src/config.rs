use deckcast_core::{command::PipelineConfig, speech::parse_voice};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported OpenAI-compatible backends for the chat model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Gemini,
}

impl Provider {
    /// Base URL of the provider's OpenAI-compatible API.
    pub fn api_base(&self) -> &'static str {
        match self {
            Provider::OpenAI => "https://api.openai.com/v1/",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub provider: Provider,
    /// Always required: speech synthesis goes through OpenAI.
    pub openai_api_key: String,
    pub gemini_api_key: Option<String>,
    pub chat_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    /// Where narration URLs point; defaults to this service's own speech route.
    pub tts_endpoint: String,
    pub settle_delay: Duration,
    pub narration_timeout: Option<Duration>,
    pub log_level: Level,
    pub prompts_path: PathBuf,
}

fn parse_u64(var: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue(var.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let provider_str =
            std::env::var("CHAT_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "gemini" => Provider::Gemini,
            _ => Provider::OpenAI,
        };

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok();
        if provider == Provider::Gemini && gemini_api_key.is_none() {
            return Err(ConfigError::MissingVar(
                "GEMINI_API_KEY must be set for 'gemini' provider".to_string(),
            ));
        }

        let chat_model = std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let tts_model = std::env::var("TTS_MODEL").unwrap_or_else(|_| "tts-1".to_string());
        let tts_voice = std::env::var("TTS_VOICE").unwrap_or_else(|_| "alloy".to_string());
        if parse_voice(&tts_voice).is_none() {
            return Err(ConfigError::InvalidValue(
                "TTS_VOICE".to_string(),
                format!("'{}' is not a known voice", tts_voice),
            ));
        }
        let tts_endpoint =
            std::env::var("TTS_ENDPOINT").unwrap_or_else(|_| "/api/tts".to_string());

        let settle_delay = Duration::from_millis(parse_u64("SETTLE_DELAY_MS", 500)?);
        let narration_timeout = match parse_u64("NARRATION_TIMEOUT_SECS", 120)? {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./prompts"));

        Ok(Self {
            bind_address,
            provider,
            openai_api_key,
            gemini_api_key,
            chat_model,
            tts_model,
            tts_voice,
            tts_endpoint,
            settle_delay,
            narration_timeout,
            log_level,
            prompts_path,
        })
    }

    /// API key for the configured chat provider.
    pub fn chat_api_key(&self) -> &str {
        match self.provider {
            Provider::OpenAI => &self.openai_api_key,
            Provider::Gemini => self.gemini_api_key.as_deref().unwrap_or_default(),
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            settle_delay: self.settle_delay,
            narration_timeout: self.narration_timeout,
        }
    }
}
