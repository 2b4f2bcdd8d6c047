//! User-driven paging through the deck.
//!
//! Navigation only touches the deck mutex, which the slide pipeline never
//! holds across a narration, so paging is never queued behind a command.

use crate::{
    DeckEvent,
    deck::{Deck, SharedDeck},
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub struct NavigationController {
    deck: SharedDeck,
    events: Option<mpsc::Sender<DeckEvent>>,
}

impl NavigationController {
    pub fn new(deck: SharedDeck, events: Option<mpsc::Sender<DeckEvent>>) -> Self {
        Self { deck, events }
    }

    /// Shows the previous slide; stays put on the first one.
    pub async fn go_back(&self) -> usize {
        self.step(|deck| deck.go_back()).await
    }

    /// Shows the next slide; stays put on the last one.
    pub async fn go_forward(&self) -> usize {
        self.step(|deck| deck.go_forward()).await
    }

    async fn step(&self, move_cursor: impl FnOnce(&mut Deck) -> usize) -> usize {
        let (cursor, snapshot) = {
            let mut deck = self.deck.lock().await;
            let cursor = move_cursor(&mut *deck);
            (cursor, deck.snapshot())
        };
        debug!(cursor, "Cursor moved");
        if let Some(tx) = &self.events {
            if tx.send(DeckEvent::Updated(snapshot)).await.is_err() {
                warn!("Failed to broadcast cursor move: receiver dropped.");
            }
        }
        cursor
    }
}
