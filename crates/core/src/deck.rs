//! Slide Store
//!
//! The ordered, append-only deck built during a session together with the
//! cursor that selects the slide on screen. The deck itself is not
//! synchronized; sessions share it as a [`SharedDeck`] and serialize appends
//! through the command handler's pipeline lock.

use crate::slide::Slide;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Deck shared between the slide pipeline, navigation and rendering.
pub type SharedDeck = Arc<tokio::sync::Mutex<Deck>>;

/// Prefix of the deck description handed to the agent on every turn.
const AGENT_CONTEXT_PREFIX: &str = "Powerpoint presentation slides: ";

/// Ordered slides plus the current-position cursor.
///
/// The cursor stays inside `[0, len - 1]` whenever the deck is non-empty and
/// sits at 0 while it is empty.
#[derive(Debug, Default, Clone)]
pub struct Deck {
    slides: Vec<Slide>,
    cursor: usize,
}

/// Serializable copy of a deck, pushed to clients after every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckSnapshot {
    pub slides: Vec<Slide>,
    pub cursor: usize,
}

impl Deck {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a fresh, empty deck for sharing across tasks.
    pub fn shared() -> SharedDeck {
        Arc::new(tokio::sync::Mutex::new(Self::new()))
    }

    /// Adds a slide to the end of the deck and returns its index.
    ///
    /// This does not move the cursor; focusing the new slide is the caller's
    /// job (see [`Deck::set_cursor`]).
    pub fn append(&mut self, slide: Slide) -> usize {
        self.slides.push(slide);
        self.slides.len() - 1
    }

    /// Bounds-checked read.
    pub fn get(&self, index: usize) -> Option<&Slide> {
        self.slides.get(index)
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Moves the cursor, clamping it to the last slide.
    pub fn set_cursor(&mut self, index: usize) {
        self.cursor = index.min(self.last_index());
    }

    /// The slide under the cursor, or `None` while the deck is empty.
    pub fn current(&self) -> Option<&Slide> {
        self.get(self.cursor)
    }

    /// Steps the cursor back one slide, stopping at the first.
    pub fn go_back(&mut self) -> usize {
        self.cursor = self.cursor.saturating_sub(1);
        self.cursor
    }

    /// Steps the cursor forward one slide, stopping at the last.
    pub fn go_forward(&mut self) -> usize {
        self.cursor = (self.cursor + 1).min(self.last_index());
        self.cursor
    }

    pub fn snapshot(&self) -> DeckSnapshot {
        DeckSnapshot {
            slides: self.slides.clone(),
            cursor: self.cursor,
        }
    }

    /// Flat textual description of the whole deck for the agent's context.
    pub fn agent_context(&self) -> String {
        let slides = serde_json::to_string(&self.slides).unwrap_or_else(|_| "[]".to_string());
        format!("{AGENT_CONTEXT_PREFIX}{slides}")
    }

    fn last_index(&self) -> usize {
        self.slides.len().saturating_sub(1)
    }
}
