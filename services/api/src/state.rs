//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like the LLM and speech clients. Decks are not part of
//! it: every WebSocket session owns its own.

use crate::config::Config;
use deckcast_core::{llm_client::LLMClient, speech::SpeechSynthesizer};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub llm_client: Arc<dyn LLMClient>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub system_prompt: Arc<String>,
    pub config: Arc<Config>,
}
