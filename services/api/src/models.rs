//! API Models
//!
//! Data structures shared by the HTTP handlers, the WebSocket session and the
//! OpenAPI documentation generated with `utoipa`.

use anyhow::Result;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestUserMessageArgs,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Ai,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Ai => write!(f, "ai"),
        }
    }
}

/// One chat message exchanged with the agent during a session.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Converts the session's chat log into LLM request messages.
pub fn chat_history(messages: &[Message]) -> Result<Vec<ChatCompletionRequestMessage>> {
    messages
        .iter()
        .map(|msg| {
            Ok(match msg.role {
                MessageRole::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(msg.content.clone())
                    .build()?
                    .into(),
                MessageRole::Ai => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(msg.content.clone())
                    .build()?
                    .into(),
            })
        })
        .collect()
}

/// Query of the speech-synthesis endpoint.
#[derive(Deserialize, IntoParams, Debug)]
pub struct SpeechQuery {
    /// The narration text to speak.
    pub text: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub message: String,
}
