//! Narrated slide deck engine.
//!
//! An agent builds a presentation one slide at a time; each slide is shown,
//! narrated and allowed to settle before the next command may run. A user can
//! page through the deck at any point without waiting on that pipeline.

pub mod agent;
pub mod command;
pub mod deck;
pub mod error;
pub mod llm_client;
pub mod navigation;
pub mod playback;
pub mod slide;
pub mod speech;
pub mod task;
pub mod view;

/// Notifications the engine pushes to whoever presents the deck.
#[derive(Debug, Clone)]
pub enum DeckEvent {
    /// The deck or its cursor changed.
    Updated(deck::DeckSnapshot),
    /// A slide was added but its narration could not be played.
    NarrationUnavailable { slide_index: usize, reason: String },
}
