//! Speech Synthesis
//!
//! Turns narration text into playable audio. The web service exposes this as
//! the endpoint that narration URLs point at.

use crate::error::SpeechError;
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{CreateSpeechRequestArgs, SpeechModel, SpeechResponseFormat, Voice},
};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

/// MIME type of the audio produced by [`OpenAISpeechSynthesizer`].
pub const SPEECH_CONTENT_TYPE: &str = "audio/mpeg";

/// Anything that can turn text into encoded audio.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Bytes, SpeechError>;
}

/// Speech synthesis through an OpenAI-compatible `audio/speech` endpoint.
pub struct OpenAISpeechSynthesizer {
    client: Client<OpenAIConfig>,
    model: SpeechModel,
    voice: Voice,
}

impl OpenAISpeechSynthesizer {
    pub fn new(config: OpenAIConfig, model: &str, voice: Voice) -> Self {
        Self {
            client: Client::with_config(config),
            model: parse_model(model),
            voice,
        }
    }
}

/// Maps a voice name (e.g. "alloy") to its API value.
pub fn parse_voice(name: &str) -> Option<Voice> {
    match name.to_lowercase().as_str() {
        "alloy" => Some(Voice::Alloy),
        "echo" => Some(Voice::Echo),
        "fable" => Some(Voice::Fable),
        "onyx" => Some(Voice::Onyx),
        "nova" => Some(Voice::Nova),
        "shimmer" => Some(Voice::Shimmer),
        _ => None,
    }
}

fn parse_model(name: &str) -> SpeechModel {
    match name {
        "tts-1" => SpeechModel::Tts1,
        "tts-1-hd" => SpeechModel::Tts1Hd,
        other => SpeechModel::Other(other.to_string()),
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAISpeechSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Bytes, SpeechError> {
        if text.trim().is_empty() {
            return Err(SpeechError::EmptyText);
        }

        let request = CreateSpeechRequestArgs::default()
            .input(text)
            .model(self.model.clone())
            .voice(self.voice.clone())
            .response_format(SpeechResponseFormat::Mp3)
            .build()
            .map_err(|e| SpeechError::Backend(e.to_string()))?;

        let response = self
            .client
            .audio()
            .speech(request)
            .await
            .map_err(|e| SpeechError::Backend(e.to_string()))?;
        debug!(bytes = response.bytes.len(), "Speech synthesized");
        Ok(response.bytes)
    }
}
