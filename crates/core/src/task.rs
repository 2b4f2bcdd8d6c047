//! One-Shot Slide Task
//!
//! A single bounded request, triggered explicitly (e.g. by an "Add Slide"
//! button) rather than at the agent's discretion. Each run asks the model to
//! pick the arguments for exactly one `newSlide` action and then runs that
//! action through the same command pipeline the agent's tool uses.

use crate::{
    command::CommandHandler,
    error::TaskError,
    llm_client::{LLMAction, LLMClient, ToolSelection},
    slide::NewSlideArgs,
};
use anyhow::Result;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionTool, ChatCompletionToolArgs, FunctionObjectArgs,
};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tracing::{info, instrument, warn};

/// Instructions given to the model for every run.
pub const TASK_INSTRUCTIONS: &str = "create a new slide";

/// The only action the task offers.
pub const NEW_SLIDE_ACTION: &str = "newSlide";

const NEW_SLIDE_DESCRIPTION: &str = "Make a new slide related to the current topic.";

/// Builds the function definition of the `newSlide` action.
pub fn new_slide_tool() -> Result<ChatCompletionTool> {
    let parameters = serde_json::to_value(schemars::schema_for!(NewSlideArgs))?;
    Ok(ChatCompletionToolArgs::default()
        .function(
            FunctionObjectArgs::default()
                .name(NEW_SLIDE_ACTION)
                .description(NEW_SLIDE_DESCRIPTION)
                .parameters(parameters)
                .build()?,
        )
        .build()?)
}

/// Clears the busy flag when a run ends, however it ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The one-shot "add one more slide now" task.
pub struct SlideTask {
    commands: Arc<CommandHandler>,
    llm: Arc<dyn LLMClient>,
    running: AtomicBool,
}

impl SlideTask {
    pub fn new(commands: Arc<CommandHandler>, llm: Arc<dyn LLMClient>) -> Self {
        Self {
            commands,
            llm,
            running: AtomicBool::new(false),
        }
    }

    /// Whether a run is currently in flight.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Claims the task for one run.
    ///
    /// Fails with [`TaskError::AlreadyRunning`] while a previous run is in
    /// flight. The task counts as running until the returned run is dropped.
    pub fn try_begin(&self) -> Result<SlideTaskRun<'_>, TaskError> {
        let busy = BusyGuard::acquire(&self.running).ok_or(TaskError::AlreadyRunning)?;
        Ok(SlideTaskRun { task: self, _busy: busy })
    }

    /// Runs the task once against the given conversation.
    pub async fn run(&self, context: Vec<ChatCompletionRequestMessage>) -> Result<usize, TaskError> {
        self.try_begin()?.run(context).await
    }
}

/// A claimed run of [`SlideTask`].
pub struct SlideTaskRun<'a> {
    task: &'a SlideTask,
    _busy: BusyGuard<'a>,
}

impl SlideTaskRun<'_> {
    /// Produces at most one slide command.
    ///
    /// The task stays claimed until `self` is dropped.
    #[instrument(name = "slide_task", skip_all)]
    pub async fn run(&self, context: Vec<ChatCompletionRequestMessage>) -> Result<usize, TaskError> {
        let task = self.task;
        info!(context_messages = context.len(), "Running one-shot slide task");

        let system_prompt = {
            let deck = task.commands.deck().lock().await;
            format!("{TASK_INSTRUCTIONS}\n\n{}", deck.agent_context())
        };
        let tool = new_slide_tool().map_err(TaskError::Decision)?;

        let action = task
            .llm
            .decide_action(
                system_prompt,
                context,
                vec![tool],
                ToolSelection::Function(NEW_SLIDE_ACTION.to_string()),
            )
            .await
            .map_err(TaskError::Decision)?;

        let calls = match action {
            LLMAction::ToolCall(calls) => calls,
            LLMAction::TextResponse(text) => {
                warn!(response = %text, "Model answered without creating a slide");
                return Err(TaskError::NoAction);
            }
        };
        if calls.len() > 1 {
            warn!(calls = calls.len(), "Model requested several slides; running only the first");
        }
        let call = calls
            .into_iter()
            .find(|call| call.function.name == NEW_SLIDE_ACTION)
            .ok_or(TaskError::NoAction)?;

        let args: NewSlideArgs = serde_json::from_str(&call.function.arguments)?;
        let index = task.commands.execute(args.into()).await?;
        info!(slide_index = index, "Slide task finished");
        Ok(index)
    }
}
