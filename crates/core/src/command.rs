//! Slide Command Pipeline
//!
//! One command appends a slide, focuses it, narrates it and waits for the
//! narration to settle. Both invocation gates (the agent's registered tool
//! and the one-shot task) delegate here, and the pipeline lock makes sure
//! only one command, and therefore one narration, runs at a time.

use crate::{
    DeckEvent,
    deck::SharedDeck,
    error::{CommandError, PlaybackError},
    playback::AudioPlayback,
    slide::SlideRequest,
};
use std::{sync::Arc, time::Duration};
use tokio::sync::{Mutex, mpsc};
use tracing::{info, instrument, warn};

/// Pause after a narration ends before the command counts as done.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Upper bound on how long a narration may take to report its end.
pub const DEFAULT_NARRATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Timing knobs for the slide pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub settle_delay: Duration,
    /// `None` waits for the narration indefinitely.
    pub narration_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            narration_timeout: Some(DEFAULT_NARRATION_TIMEOUT),
        }
    }
}

/// Executes slide commands against a deck and the shared audio output.
pub struct CommandHandler {
    deck: SharedDeck,
    playback: Arc<dyn AudioPlayback>,
    events: Option<mpsc::Sender<DeckEvent>>,
    config: PipelineConfig,
    pipeline: Mutex<()>,
}

impl CommandHandler {
    pub fn new(
        deck: SharedDeck,
        playback: Arc<dyn AudioPlayback>,
        events: Option<mpsc::Sender<DeckEvent>>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            deck,
            playback,
            events,
            config,
            pipeline: Mutex::new(()),
        }
    }

    pub fn deck(&self) -> &SharedDeck {
        &self.deck
    }

    /// Appends, focuses and narrates one slide, returning its index.
    ///
    /// Resolves only after the narration has ended and the settle delay has
    /// passed. Commands issued while another is running wait their turn. A
    /// failed narration leaves the slide in the deck.
    #[instrument(name = "slide_command", skip_all, fields(slide_index))]
    pub async fn execute(&self, request: SlideRequest) -> Result<usize, CommandError> {
        let _turn = self.pipeline.lock().await;
        let (slide, speech) = request.into_parts();

        let (slide_index, snapshot) = {
            let mut deck = self.deck.lock().await;
            let index = deck.append(slide);
            deck.set_cursor(index);
            (index, deck.snapshot())
        };
        tracing::Span::current().record("slide_index", slide_index);
        info!(deck_len = snapshot.slides.len(), "Slide appended and focused");
        self.emit(DeckEvent::Updated(snapshot)).await;

        if let Err(source) = self.narrate(&speech).await {
            warn!(error = %source, "Narration failed; keeping slide");
            self.emit(DeckEvent::NarrationUnavailable {
                slide_index,
                reason: source.to_string(),
            })
            .await;
            return Err(CommandError::PlaybackUnavailable {
                slide_index,
                source,
            });
        }

        tokio::time::sleep(self.config.settle_delay).await;
        info!("Slide command complete");
        Ok(slide_index)
    }

    async fn narrate(&self, speech: &str) -> Result<(), PlaybackError> {
        let signal = self.playback.narrate(speech).await?;
        match self.config.narration_timeout {
            Some(limit) => tokio::time::timeout(limit, signal.wait())
                .await
                .map_err(|_| PlaybackError::TimedOut(limit))?,
            None => signal.wait().await,
        }
    }

    async fn emit(&self, event: DeckEvent) {
        if let Some(tx) = &self.events {
            if tx.send(event).await.is_err() {
                warn!("Failed to broadcast deck event: receiver dropped.");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        deck::Deck,
        playback::{
            CompletionSignal, MockAudioPlayback, NarrationPlayer, PlaybackCompletion,
            completion_pair,
        },
    };
    use async_trait::async_trait;
    use mockall::Sequence;
    use std::sync::Mutex as StdMutex;
    use tokio::time::{Instant, timeout};

    /// Playback whose completions are handed to the test to resolve.
    pub(crate) struct ScriptedPlayback {
        calls: StdMutex<Vec<String>>,
        completions: mpsc::UnboundedSender<PlaybackCompletion>,
    }

    impl ScriptedPlayback {
        pub(crate) fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<PlaybackCompletion>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                Arc::new(Self {
                    calls: StdMutex::new(Vec::new()),
                    completions: tx,
                }),
                rx,
            )
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AudioPlayback for ScriptedPlayback {
        async fn narrate(&self, text: &str) -> Result<CompletionSignal, PlaybackError> {
            self.calls.lock().unwrap().push(text.to_string());
            let (completion, signal) = completion_pair();
            self.completions.send(completion).unwrap();
            Ok(signal)
        }
    }

    pub(crate) fn request(title: &str, speech: &str) -> SlideRequest {
        SlideRequest {
            title: title.to_string(),
            content: format!("{title} content"),
            background_image: "conference".to_string(),
            speech: speech.to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn completes_only_after_narration_and_settle_delay() {
        let (playback, mut completions) = ScriptedPlayback::new();
        let handler = Arc::new(CommandHandler::new(
            Deck::shared(),
            playback.clone(),
            None,
            PipelineConfig::default(),
        ));

        let mut task = {
            let handler = handler.clone();
            tokio::spawn(async move {
                handler
                    .execute(SlideRequest {
                        title: "Intro".into(),
                        content: "Welcome to the talk".into(),
                        background_image: "conference".into(),
                        speech: "Hello everyone".into(),
                    })
                    .await
            })
        };

        let completion = completions.recv().await.unwrap();
        assert!(timeout(Duration::from_secs(30), &mut task).await.is_err());

        {
            let deck = handler.deck().lock().await;
            assert_eq!(deck.len(), 1);
            assert_eq!(deck.cursor(), 0);
            let slide = deck.get(0).unwrap();
            assert_eq!(slide.title, "Intro");
            assert_eq!(slide.content, "Welcome to the talk");
            assert_eq!(slide.background_image, "conference");
        }

        let fired_at = Instant::now();
        completion.finish();
        assert!(timeout(Duration::from_millis(499), &mut task).await.is_err());

        let index = task.await.unwrap().unwrap();
        assert_eq!(index, 0);
        assert!(fired_at.elapsed() >= DEFAULT_SETTLE_DELAY);
        assert_eq!(playback.calls(), vec!["Hello everyone".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn back_to_back_commands_never_overlap_narration() {
        let (playback, mut completions) = ScriptedPlayback::new();
        let handler = Arc::new(CommandHandler::new(
            Deck::shared(),
            playback.clone(),
            None,
            PipelineConfig::default(),
        ));

        let first = tokio::spawn({
            let handler = handler.clone();
            async move { handler.execute(request("A", "speech A")).await }
        });
        let first_completion = completions.recv().await.unwrap();
        let second = tokio::spawn({
            let handler = handler.clone();
            async move { handler.execute(request("B", "speech B")).await }
        });

        assert!(timeout(Duration::from_secs(10), completions.recv()).await.is_err());
        assert_eq!(playback.calls().len(), 1);

        let fired_at = Instant::now();
        first_completion.finish();
        let second_completion = completions.recv().await.unwrap();
        assert!(fired_at.elapsed() >= DEFAULT_SETTLE_DELAY);

        second_completion.finish();
        assert_eq!(first.await.unwrap().unwrap(), 0);
        assert_eq!(second.await.unwrap().unwrap(), 1);

        let deck = handler.deck().lock().await;
        let titles: Vec<_> = deck.slides().iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, ["A", "B"]);
        assert_eq!(deck.cursor(), 1);
        assert_eq!(playback.calls(), vec!["speech A", "speech B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_narration_keeps_slide_and_unblocks_pipeline() {
        let mut seq = Sequence::new();
        let mut playback = MockAudioPlayback::new();
        playback
            .expect_narrate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(PlaybackError::Unavailable("tts offline".into())));
        playback
            .expect_narrate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                let (completion, signal) = completion_pair();
                completion.finish();
                Ok(signal)
            });

        let (events_tx, mut events_rx) = mpsc::channel(16);
        let handler = CommandHandler::new(
            Deck::shared(),
            Arc::new(playback),
            Some(events_tx),
            PipelineConfig::default(),
        );

        let err = handler.execute(request("A", "a")).await.unwrap_err();
        let CommandError::PlaybackUnavailable {
            slide_index,
            source,
        } = err;
        assert_eq!(slide_index, 0);
        assert_eq!(source, PlaybackError::Unavailable("tts offline".into()));

        assert!(matches!(events_rx.recv().await, Some(DeckEvent::Updated(_))));
        match events_rx.recv().await {
            Some(DeckEvent::NarrationUnavailable { slide_index, reason }) => {
                assert_eq!(slide_index, 0);
                assert!(reason.contains("tts offline"));
            }
            other => panic!("unexpected event: {other:?}"),
        }

        assert_eq!(handler.execute(request("B", "b")).await.unwrap(), 1);
        assert_eq!(handler.deck().lock().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_narration_times_out() {
        let (playback, mut completions) = ScriptedPlayback::new();
        let handler = CommandHandler::new(
            Deck::shared(),
            playback,
            None,
            PipelineConfig {
                settle_delay: DEFAULT_SETTLE_DELAY,
                narration_timeout: Some(Duration::from_secs(5)),
            },
        );

        let started = Instant::now();
        let err = handler.execute(request("A", "a")).await.unwrap_err();
        let _never_finished = completions.recv().await;

        let CommandError::PlaybackUnavailable { source, .. } = err;
        assert_eq!(source, PlaybackError::TimedOut(Duration::from_secs(5)));
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(handler.deck().lock().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_narration_releases_the_player() {
        let (output_tx, mut output) = mpsc::channel(8);
        let player = Arc::new(NarrationPlayer::new("/api/tts", output_tx));
        let handler = CommandHandler::new(
            Deck::shared(),
            player.clone(),
            None,
            PipelineConfig {
                settle_delay: DEFAULT_SETTLE_DELAY,
                narration_timeout: Some(Duration::from_secs(5)),
            },
        );

        let err = handler.execute(request("A", "a")).await.unwrap_err();
        let CommandError::PlaybackUnavailable { source, .. } = err;
        assert_eq!(source, PlaybackError::TimedOut(Duration::from_secs(5)));

        let directive = output.recv().await.unwrap();
        assert!(!player.is_active().await);
        assert!(!player.playback_ended(directive.id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn append_broadcasts_focused_snapshot() {
        let mut playback = MockAudioPlayback::new();
        playback.expect_narrate().returning(|_| {
            let (completion, signal) = completion_pair();
            completion.finish();
            Ok(signal)
        });
        let (events_tx, mut events_rx) = mpsc::channel(16);
        let handler = CommandHandler::new(
            Deck::shared(),
            Arc::new(playback),
            Some(events_tx),
            PipelineConfig::default(),
        );

        handler.execute(request("A", "a")).await.unwrap();
        handler.execute(request("B", "b")).await.unwrap();

        let mut cursors = Vec::new();
        while let Ok(event) = events_rx.try_recv() {
            if let DeckEvent::Updated(snapshot) = event {
                cursors.push((snapshot.slides.len(), snapshot.cursor));
            }
        }
        assert_eq!(cursors, vec![(1, 0), (2, 1)]);
    }
}
