//! Presentation Tool Service
//!
//! This module exposes the slide pipeline to an agent as a persistently
//! registered set of Model Context Protocol (MCP) tools. Every call to
//! `createNewPowerPointSlide` runs one full slide command and only returns
//! once the narration has played and settled, so the agent cannot issue its
//! next slide early.

use crate::{
    command::CommandHandler,
    slide::{CreateSlideArgs, SlideRequest},
};
use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Name under which the slide action is registered for the agent.
pub const CREATE_SLIDE_TOOL: &str = "createNewPowerPointSlide";

/// MCP service backing the agent's reactive slide action.
pub struct PresentationService {
    /// Shared command pipeline; the one-shot task uses the same handler.
    pub commands: Arc<CommandHandler>,
    tool_router: ToolRouter<Self>,
}

#[tool_handler]
impl ServerHandler for PresentationService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Build a narrated slide presentation one slide at a time.".to_string(),
            ),
            ..Default::default()
        }
    }
}

#[tool_router]
impl PresentationService {
    pub fn new(commands: Arc<CommandHandler>) -> Self {
        Self {
            commands,
            tool_router: Self::tool_router(),
        }
    }

    /// Creates, shows and narrates one slide.
    ///
    /// Blocks until the narration has finished and settled. A failed
    /// narration is reported as a tool error, but the slide stays in the deck.
    #[tool(
        name = "createNewPowerPointSlide",
        description = "create a slide for a powerpoint presentation. Call this function multiple times to present multiple slides."
    )]
    pub async fn create_slide(
        &self,
        args: Parameters<CreateSlideArgs>,
    ) -> Result<String, String> {
        info!(title = %args.0.slide_title, "Executing tool 'createNewPowerPointSlide'");
        match self.commands.execute(SlideRequest::from(args.0)).await {
            Ok(index) => Ok(format!("OK. Slide {} is on screen and was narrated.", index + 1)),
            Err(e) => {
                warn!(error = %e, "Slide tool finished without narration");
                Err(e.to_string())
            }
        }
    }

    /// Returns the agent-readable description of the current deck.
    #[tool(
        name = "getPresentation",
        description = "Get all slides of the current presentation in order."
    )]
    pub async fn get_presentation(&self) -> Result<String, String> {
        info!("Executing tool 'getPresentation'");
        Ok(self.commands.deck().lock().await.agent_context())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        command::{DEFAULT_SETTLE_DELAY, PipelineConfig, tests::ScriptedPlayback},
        deck::Deck,
        llm_client::{LLMAction, MockLLMClient, ToolCall},
        task::SlideTask,
    };
    use async_openai::types::{ChatCompletionToolType, FunctionCall};
    use std::time::Duration;
    use tokio::time::{Instant, sleep, timeout};

    fn args(title: &str, speech: &str) -> Parameters<CreateSlideArgs> {
        Parameters(CreateSlideArgs {
            slide_title: title.to_string(),
            content: "body".to_string(),
            background_image: "dog".to_string(),
            speech: speech.to_string(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_tool_calls_build_the_deck_in_order() {
        let (playback, mut completions) = ScriptedPlayback::new();
        let commands = Arc::new(CommandHandler::new(
            Deck::shared(),
            playback.clone(),
            None,
            PipelineConfig::default(),
        ));
        let service = Arc::new(PresentationService::new(commands.clone()));

        for (title, speech) in [("A", "first"), ("B", "second")] {
            let call = tokio::spawn({
                let service = service.clone();
                let args = args(title, speech);
                async move { service.create_slide(args).await }
            });
            completions.recv().await.unwrap().finish();
            assert!(call.await.unwrap().is_ok());
        }

        let deck = commands.deck().lock().await;
        assert_eq!(deck.len(), 2);
        assert_eq!(deck.cursor(), 1);
        assert_eq!(deck.get(0).unwrap().title, "A");
        assert_eq!(deck.get(1).unwrap().title, "B");
        assert_eq!(playback.calls(), vec!["first", "second"]);
    }

    #[tokio::test(start_paused = true)]
    async fn tool_call_is_pending_until_narration_ends() {
        let (playback, mut completions) = ScriptedPlayback::new();
        let commands = Arc::new(CommandHandler::new(
            Deck::shared(),
            playback,
            None,
            PipelineConfig::default(),
        ));
        let service = Arc::new(PresentationService::new(commands));

        let mut call = tokio::spawn({
            let service = service.clone();
            async move { service.create_slide(args("A", "a")).await }
        });
        let completion = completions.recv().await.unwrap();
        assert!(timeout(Duration::from_secs(60), &mut call).await.is_err());

        let context = service.get_presentation().await.unwrap();
        assert!(context.contains(r#""title":"A""#));

        completion.finish();
        assert!(call.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn narration_failure_becomes_tool_error() {
        let (playback, mut completions) = ScriptedPlayback::new();
        let commands = Arc::new(CommandHandler::new(
            Deck::shared(),
            playback,
            None,
            PipelineConfig::default(),
        ));
        let service = Arc::new(PresentationService::new(commands.clone()));

        let call = tokio::spawn({
            let service = service.clone();
            async move { service.create_slide(args("A", "a")).await }
        });
        completions
            .recv()
            .await
            .unwrap()
            .fail(crate::error::PlaybackError::Unavailable("no audio".into()));

        let err = call.await.unwrap().unwrap_err();
        assert!(err.contains("no audio"));
        assert_eq!(commands.deck().lock().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn task_and_tool_take_turns_on_one_pipeline() {
        let (playback, mut completions) = ScriptedPlayback::new();
        let commands = Arc::new(CommandHandler::new(
            Deck::shared(),
            playback.clone(),
            None,
            PipelineConfig::default(),
        ));
        let mut llm = MockLLMClient::new();
        llm.expect_decide_action().times(1).returning(|_, _, _, _| {
            Ok(LLMAction::ToolCall(vec![ToolCall {
                id: "call_task".to_string(),
                r#type: ChatCompletionToolType::Function,
                function: FunctionCall {
                    name: "newSlide".to_string(),
                    arguments: r#"{"title":"Task","content":"body","backgroundImage":"owl","speech":"task speech"}"#
                        .to_string(),
                },
            }]))
        });
        let task = Arc::new(SlideTask::new(commands.clone(), Arc::new(llm)));
        let service = Arc::new(PresentationService::new(commands.clone()));

        let task_run = tokio::spawn({
            let task = task.clone();
            async move { task.run(vec![]).await }
        });
        let task_narration = completions.recv().await.unwrap();

        let tool_call = tokio::spawn({
            let service = service.clone();
            async move { service.create_slide(args("Tool", "tool speech")).await }
        });
        sleep(Duration::from_secs(30)).await;
        assert_eq!(playback.calls(), vec!["task speech"]);
        assert_eq!(commands.deck().lock().await.len(), 1);

        let ended = Instant::now();
        task_narration.finish();
        let tool_narration = completions.recv().await.unwrap();
        assert!(ended.elapsed() >= DEFAULT_SETTLE_DELAY);
        assert_eq!(playback.calls(), vec!["task speech", "tool speech"]);
        assert_eq!(task_run.await.unwrap().unwrap(), 0);

        tool_narration.finish();
        assert!(tool_call.await.unwrap().is_ok());

        let deck = commands.deck().lock().await;
        assert_eq!(deck.len(), 2);
        assert_eq!(deck.get(0).unwrap().title, "Task");
        assert_eq!(deck.get(1).unwrap().title, "Tool");
        assert_eq!(deck.cursor(), 1);
    }
}
