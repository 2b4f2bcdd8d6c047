//! Presentation View
//!
//! Pure rendering of the slide under the cursor. Markdown is passed through
//! untouched; clients render it.

use crate::{
    deck::{Deck, DeckSnapshot},
    slide::Slide,
};
use serde::Serialize;

/// Shown when the deck has no slides yet.
pub const NO_SLIDE_MESSAGE: &str = "No Slide To Display";

const BACKGROUND_SEARCH_URL: &str = "https://source.unsplash.com/featured/?";

/// What the presentation surface should display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlideView {
    Slide {
        index: usize,
        total: usize,
        title: String,
        content: String,
        background_url: String,
    },
    Empty { message: String },
}

/// Resolves a background keyword to an image URL.
pub fn background_url(keyword: &str) -> String {
    format!("{BACKGROUND_SEARCH_URL}{}", urlencoding::encode(keyword))
}

/// Renders the slide at the deck's cursor, or the empty state.
pub fn render(deck: &Deck) -> SlideView {
    render_slides(deck.slides(), deck.cursor())
}

/// Same as [`render`], for a snapshot taken earlier.
pub fn render_snapshot(snapshot: &DeckSnapshot) -> SlideView {
    render_slides(&snapshot.slides, snapshot.cursor)
}

fn render_slides(slides: &[Slide], cursor: usize) -> SlideView {
    match slides.get(cursor) {
        Some(slide) => SlideView::Slide {
            index: cursor,
            total: slides.len(),
            title: slide.title.clone(),
            content: slide.content.clone(),
            background_url: background_url(&slide.background_image),
        },
        None => SlideView::Empty {
            message: NO_SLIDE_MESSAGE.to_string(),
        },
    }
}
