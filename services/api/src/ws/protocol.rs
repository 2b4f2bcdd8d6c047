//! Defines the WebSocket message protocol between the browser client and the API server.

use deckcast_core::{deck::DeckSnapshot, view::SlideView};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A chat message from the user to the agent.
    UserMessage { text: String },
    /// The "Add Slide" control: runs the one-shot slide task.
    AddSlide,
    /// Show the previous slide.
    GoBack,
    /// Show the next slide.
    GoForward,
    /// The audio element finished playing narration `id`.
    NarrationEnded { id: u64 },
    /// The audio element could not load or play narration `id`.
    NarrationFailed { id: u64, reason: String },
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once on connect with the (empty) presentation.
    Initialized {
        session_id: Uuid,
        view: SlideView,
        deck: DeckSnapshot,
    },
    /// The deck or cursor changed.
    DeckUpdate { view: SlideView, deck: DeckSnapshot },
    /// Load `url` into the audio element and play it, replacing any current source.
    PlayNarration { id: u64, url: String },
    /// A dismissible, non-fatal notice (e.g. a slide that could not be narrated).
    Notice { message: String },
    /// Whether the one-shot slide task is running.
    TaskStatus { running: bool },
    /// Reports an error to the client.
    Error { message: String },
    /// Signals the beginning of a streamed text response from the AI.
    ResponseStart,
    /// A chunk of a streamed text response.
    ResponseChunk { chunk: String },
    /// Signals the end of a streamed text response.
    ResponseEnd,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_parse_from_tagged_json() {
        let parsed: ClientMessage =
            serde_json::from_str(r#"{"type":"narration_ended","id":7}"#).unwrap();
        assert_eq!(parsed, ClientMessage::NarrationEnded { id: 7 });

        let parsed: ClientMessage = serde_json::from_str(r#"{"type":"add_slide"}"#).unwrap();
        assert_eq!(parsed, ClientMessage::AddSlide);

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"delete_slide"}"#).is_err());
    }

    #[test]
    fn play_narration_serializes_flat() {
        let json = serde_json::to_value(ServerMessage::PlayNarration {
            id: 3,
            url: "/api/tts?text=hi".into(),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "play_narration", "id": 3, "url": "/api/tts?text=hi"})
        );
    }
}
