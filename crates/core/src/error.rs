//! Error types for the slide pipeline.

use std::time::Duration;

/// Why a narration did not play to its natural end.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    /// The speech resource could not be resolved or playback could not start.
    #[error("Narration playback unavailable: {0}")]
    Unavailable(String),

    /// Playback did not report completion within the configured bound.
    #[error("Narration did not finish within {0:?}")]
    TimedOut(Duration),

    /// A newer narration replaced this one on the audio output.
    #[error("Narration superseded by a newer playback")]
    Superseded,
}

/// Failure of a single slide command.
///
/// The slide is already in the deck when this is returned; only the
/// narration step failed.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Slide {slide_index} was added but its narration failed: {source}")]
    PlaybackUnavailable {
        slide_index: usize,
        #[source]
        source: PlaybackError,
    },
}

/// Failure of a one-shot slide task.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The trigger fired while a previous run was still in flight.
    #[error("A slide task is already running")]
    AlreadyRunning,

    /// The model answered without calling the slide action.
    #[error("The model did not choose to create a slide")]
    NoAction,

    #[error("Invalid arguments for slide action: {0}")]
    InvalidArguments(#[from] serde_json::Error),

    #[error("Failed to decide on a slide: {0}")]
    Decision(anyhow::Error),

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Failure of the speech-synthesis backend.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("Nothing to synthesize")]
    EmptyText,

    #[error("Speech synthesis failed: {0}")]
    Backend(String),
}
