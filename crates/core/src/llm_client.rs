use anyhow::{Context, Result, anyhow};
use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionNamedToolChoice, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionTool, ChatCompletionToolChoiceOption,
        ChatCompletionToolType, CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
        FunctionName,
    },
};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// Represents a tool call requested by the LLM.
pub type ToolCall = async_openai::types::ChatCompletionMessageToolCall;

/// Represents the events that can be yielded from a streaming text response.
#[derive(Debug, Clone)]
pub enum LLMStreamEvent {
    TextChunk(String),
}

/// A stream of text chunks from the LLM.
pub type LLMStream = Pin<Box<dyn Stream<Item = Result<LLMStreamEvent, OpenAIError>> + Send>>;

/// Represents the two possible outcomes of the LLM's decision-making turn.
#[derive(Debug, Clone)]
pub enum LLMAction {
    /// The LLM decided to respond directly with text.
    TextResponse(String),
    /// The LLM decided to call one or more tools.
    ToolCall(Vec<ToolCall>),
}

/// How much freedom the LLM has when picking tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolSelection {
    /// The model may answer with text or call any tool.
    Auto,
    /// The model must call the named function.
    Function(String),
}

impl From<ToolSelection> for ChatCompletionToolChoiceOption {
    fn from(selection: ToolSelection) -> Self {
        match selection {
            ToolSelection::Auto => ChatCompletionToolChoiceOption::Auto,
            ToolSelection::Function(name) => {
                ChatCompletionToolChoiceOption::Named(ChatCompletionNamedToolChoice {
                    r#type: ChatCompletionToolType::Function,
                    function: FunctionName { name },
                })
            }
        }
    }
}

/// A generic client for interacting with an LLM.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Makes a single, non-streaming call to the LLM to decide on the next action.
    async fn decide_action(
        &self,
        system_prompt: String,
        history: Vec<ChatCompletionRequestMessage>,
        tools: Vec<ChatCompletionTool>,
        selection: ToolSelection,
    ) -> Result<LLMAction>;

    /// Makes a streaming call to the LLM after tools have been executed.
    async fn stream_after_tools(
        &self,
        system_prompt: String,
        history_with_tool_results: Vec<ChatCompletionRequestMessage>,
    ) -> Result<LLMStream>;
}

/// An implementation of `LLMClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `model` - The model identifier to use for chat completions (e.g., "gpt-4o").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

/// Puts `system_prompt` in front of the conversation unless it is empty.
fn with_system_prompt(
    system_prompt: String,
    history: Vec<ChatCompletionRequestMessage>,
) -> Result<Vec<ChatCompletionRequestMessage>> {
    if system_prompt.is_empty() {
        return Ok(history);
    }
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(
        ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt)
            .build()?
            .into(),
    );
    messages.extend(history);
    Ok(messages)
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn decide_action(
        &self,
        system_prompt: String,
        history: Vec<ChatCompletionRequestMessage>,
        tools: Vec<ChatCompletionTool>,
        selection: ToolSelection,
    ) -> Result<LLMAction> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(with_system_prompt(system_prompt, history)?)
            .tools(tools)
            .tool_choice(selection)
            .build()?;

        let response: CreateChatCompletionResponse = self.client.chat().create(request).await?;
        let choice = response
            .choices
            .first()
            .context("No response choice from LLM")?;

        if let Some(tool_calls) = &choice.message.tool_calls {
            Ok(LLMAction::ToolCall(tool_calls.clone()))
        } else if let Some(content) = &choice.message.content {
            Ok(LLMAction::TextResponse(content.clone()))
        } else {
            Err(anyhow!(
                "LLM response had neither text content nor tool calls."
            ))
        }
    }

    async fn stream_after_tools(
        &self,
        system_prompt: String,
        history_with_tool_results: Vec<ChatCompletionRequestMessage>,
    ) -> Result<LLMStream> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(with_system_prompt(system_prompt, history_with_tool_results)?)
            .stream(true)
            .build()?;

        let stream = self.client.chat().create_stream(request).await?;

        Ok(Box::pin(stream.filter_map(|result| async move {
            match result {
                Ok(response) => {
                    let content = response.choices.first()?.delta.content.clone()?;
                    if content.is_empty() {
                        None
                    } else {
                        Some(Ok(LLMStreamEvent::TextChunk(content)))
                    }
                }
                Err(e) => Some(Err(e)),
            }
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_selection_targets_the_function() {
        let option: ChatCompletionToolChoiceOption =
            ToolSelection::Function("newSlide".to_string()).into();
        match option {
            ChatCompletionToolChoiceOption::Named(choice) => {
                assert_eq!(choice.function.name, "newSlide")
            }
            other => panic!("unexpected tool choice: {other:?}"),
        }
    }

    #[test]
    fn empty_system_prompt_is_not_sent() {
        let messages = with_system_prompt(String::new(), vec![]).unwrap();
        assert!(messages.is_empty());

        let messages = with_system_prompt("be brief".to_string(), vec![]).unwrap();
        assert!(matches!(
            messages[0],
            ChatCompletionRequestMessage::System(_)
        ));
    }
}
