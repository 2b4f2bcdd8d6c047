//! Narration Playback
//!
//! The audio output is a single shared resource owned by whoever renders the
//! presentation (for the web service, the browser's one `<audio>` element).
//! This module turns "audio finished" on that output into an awaitable
//! [`CompletionSignal`], so the slide pipeline can treat narration as a
//! blocking stage.

use crate::error::PlaybackError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, info, warn};

/// Resolves exactly once, when a narration stops playing.
#[derive(Debug)]
pub struct CompletionSignal {
    rx: oneshot::Receiver<Result<(), PlaybackError>>,
}

/// The resolving half of a [`CompletionSignal`].
#[derive(Debug)]
pub struct PlaybackCompletion {
    tx: oneshot::Sender<Result<(), PlaybackError>>,
}

/// Creates a connected completion/signal pair.
pub fn completion_pair() -> (PlaybackCompletion, CompletionSignal) {
    let (tx, rx) = oneshot::channel();
    (PlaybackCompletion { tx }, CompletionSignal { rx })
}

impl PlaybackCompletion {
    /// Playback reached its natural end.
    pub fn finish(self) {
        let _ = self.tx.send(Ok(()));
    }

    pub fn fail(self, error: PlaybackError) {
        let _ = self.tx.send(Err(error));
    }

    /// The signal was dropped, e.g. because its waiter timed out.
    fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

impl CompletionSignal {
    /// Waits for the narration to end.
    ///
    /// If the resolving half is dropped without reporting, the playback is
    /// treated as unavailable.
    pub async fn wait(self) -> Result<(), PlaybackError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(PlaybackError::Unavailable(
                "playback session dropped".to_string(),
            )),
        }
    }
}

/// Anything that can speak a narration on the shared audio output.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioPlayback: Send + Sync {
    /// Starts narrating `text`, replacing whatever the output was playing.
    ///
    /// Returns once playback has been requested; the returned signal resolves
    /// when it ends.
    async fn narrate(&self, text: &str) -> Result<CompletionSignal, PlaybackError>;
}

/// Instruction for the audio-output owner to load and play a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackDirective {
    pub id: u64,
    pub url: String,
}

struct ActivePlayback {
    id: u64,
    completion: PlaybackCompletion,
}

/// [`AudioPlayback`] backed by a remote audio output.
///
/// Each narration is turned into a speech-synthesis URL and sent to the
/// output as a [`PlaybackDirective`]. The output reports back through
/// [`NarrationPlayer::playback_ended`] or [`NarrationPlayer::playback_failed`].
pub struct NarrationPlayer {
    endpoint: String,
    output: mpsc::Sender<PlaybackDirective>,
    active: Mutex<Option<ActivePlayback>>,
    next_id: AtomicU64,
}

impl NarrationPlayer {
    /// Creates a player that addresses speech at `endpoint` (e.g. `/api/tts`).
    pub fn new(endpoint: impl Into<String>, output: mpsc::Sender<PlaybackDirective>) -> Self {
        Self {
            endpoint: endpoint.into(),
            output,
            active: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Builds the synthesis locator for a narration.
    pub fn speech_url(&self, text: &str) -> String {
        format!("{}?text={}", self.endpoint, urlencoding::encode(text))
    }

    /// Reports that playback `id` reached its end.
    ///
    /// Returns `false` when `id` is not the current playback.
    pub async fn playback_ended(&self, id: u64) -> bool {
        match self.take_if_current(id).await {
            Some(active) => {
                debug!(playback_id = id, "Narration finished");
                active.completion.finish();
                true
            }
            None => {
                debug!(playback_id = id, "Ignoring end of stale narration");
                false
            }
        }
    }

    /// Reports that playback `id` could not be resolved or started.
    pub async fn playback_failed(&self, id: u64, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        match self.take_if_current(id).await {
            Some(active) => {
                warn!(playback_id = id, %reason, "Narration failed on the audio output");
                active.completion.fail(PlaybackError::Unavailable(reason));
                true
            }
            None => false,
        }
    }

    /// Fails the pending narration, if any, because the output went away.
    pub async fn detach(&self) {
        if let Some(active) = self.active.lock().await.take() {
            info!(playback_id = active.id, "Audio output detached during narration");
            active.completion.fail(PlaybackError::Unavailable(
                "audio output detached".to_string(),
            ));
        }
    }

    /// Whether a narration is currently waiting for its end.
    pub async fn is_active(&self) -> bool {
        let mut active = self.active.lock().await;
        Self::clear_abandoned(&mut active);
        active.is_some()
    }

    async fn take_if_current(&self, id: u64) -> Option<ActivePlayback> {
        let mut active = self.active.lock().await;
        Self::clear_abandoned(&mut active);
        if active.as_ref().is_some_and(|a| a.id == id) {
            active.take()
        } else {
            None
        }
    }

    /// Ends a session nobody waits on any more.
    fn clear_abandoned(active: &mut Option<ActivePlayback>) {
        if let Some(abandoned) = active.take_if(|a| a.completion.is_abandoned()) {
            debug!(playback_id = abandoned.id, "Dropping abandoned narration");
        }
    }
}

#[async_trait]
impl AudioPlayback for NarrationPlayer {
    async fn narrate(&self, text: &str) -> Result<CompletionSignal, PlaybackError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (completion, signal) = completion_pair();
        let previous = self
            .active
            .lock()
            .await
            .replace(ActivePlayback { id, completion });
        if let Some(previous) = previous.filter(|p| !p.completion.is_abandoned()) {
            debug!(playback_id = previous.id, "Superseding unfinished narration");
            previous.completion.fail(PlaybackError::Superseded);
        }

        let url = self.speech_url(text);
        if self.output.send(PlaybackDirective { id, url }).await.is_err() {
            self.take_if_current(id).await;
            return Err(PlaybackError::Unavailable(
                "audio output detached".to_string(),
            ));
        }
        debug!(playback_id = id, chars = text.len(), "Narration requested");
        Ok(signal)
    }
}
