//! Contains the logic for the agent's "ReAct" (Reason and Act) turn.

use crate::{
    models::{self, Message, MessageRole},
    state::AppState,
    ws::{protocol::ServerMessage, session::SocketSink, session::send_msg},
};
use anyhow::{Context, Result};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestToolMessageArgs, ChatCompletionTool, ChatCompletionToolArgs,
    FunctionObjectArgs,
};
use deckcast_core::{
    deck::SharedDeck,
    error::TaskError,
    llm_client::{LLMAction, LLMStreamEvent, ToolSelection},
    task::SlideTask,
};
use futures_util::StreamExt;
use rmcp::{
    model::{CallToolRequestParam, RawContent},
    service::{RoleClient, RunningService},
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Handles a single user message, driving the agent through one ReAct turn.
///
/// This involves:
/// 1.  Constructing the prompt with the current deck and the chat history.
/// 2.  Calling the LLM to decide on an action (answer or create slides).
/// 3.  If tools are chosen, executing them one after another. Each slide
///     tool only returns after its narration has played, so slides are
///     presented strictly in order.
/// 4.  Streaming the final text response back to the client.
pub(crate) async fn handle_react_cycle(
    state: &AppState,
    deck: &SharedDeck,
    history: &Mutex<Vec<Message>>,
    mcp_client: &RunningService<RoleClient, ()>,
    user_text: &str,
    socket_tx: &SocketSink,
) -> Result<()> {
    let conversation = {
        let mut history = history.lock().await;
        history.push(Message::new(MessageRole::User, user_text));
        history.clone()
    };

    let system_prompt = format!(
        "{}\n\n# Current Context for This Turn\n\n{}",
        state.system_prompt,
        deck.lock().await.agent_context()
    );
    let messages = models::chat_history(&conversation)?;
    let tools = list_tools(mcp_client).await?;

    let action = state
        .llm_client
        .decide_action(
            system_prompt.clone(),
            messages.clone(),
            tools,
            ToolSelection::Auto,
        )
        .await?;

    let mut full_response = String::new();
    {
        let mut sink = socket_tx.lock().await;
        send_msg(&mut sink, ServerMessage::ResponseStart).await?;
    }

    match action {
        LLMAction::TextResponse(response_text) => {
            send_chunk(socket_tx, &response_text).await?;
            full_response = response_text;
        }
        LLMAction::ToolCall(tool_calls) => {
            info!(calls = tool_calls.len(), "Agent requested tool calls");
            let mut history_with_tools: Vec<ChatCompletionRequestMessage> = messages;
            history_with_tools.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .tool_calls(tool_calls.clone())
                    .build()?
                    .into(),
            );
            for call in &tool_calls {
                let result_text = call_tool(mcp_client, &call.function.name, &call.function.arguments).await?;
                history_with_tools.push(
                    ChatCompletionRequestToolMessageArgs::default()
                        .tool_call_id(call.id.clone())
                        .content(result_text)
                        .build()?
                        .into(),
                );
            }

            // Call the LLM again with the tool results to get the final response.
            let mut final_stream = state
                .llm_client
                .stream_after_tools(system_prompt, history_with_tools)
                .await?;
            while let Some(event_result) = final_stream.next().await {
                match event_result {
                    Ok(LLMStreamEvent::TextChunk(chunk)) => {
                        send_chunk(socket_tx, &chunk).await?;
                        full_response.push_str(&chunk);
                    }
                    Err(e) => warn!(error = %e, "Dropping failed response chunk"),
                }
            }
        }
    }

    {
        let mut sink = socket_tx.lock().await;
        send_msg(&mut sink, ServerMessage::ResponseEnd).await?;
    }

    if !full_response.is_empty() {
        history
            .lock()
            .await
            .push(Message::new(MessageRole::Ai, full_response));
    }
    Ok(())
}

/// Lists the presentation tools in the shape the LLM expects.
async fn list_tools(mcp_client: &RunningService<RoleClient, ()>) -> Result<Vec<ChatCompletionTool>> {
    mcp_client
        .list_all_tools()
        .await?
        .into_iter()
        .map(|t| {
            Ok(ChatCompletionToolArgs::default()
                .function(
                    FunctionObjectArgs::default()
                        .name(t.name)
                        .description(t.description.unwrap_or_default())
                        .parameters(serde_json::to_value(&*t.input_schema)?)
                        .build()?,
                )
                .build()?)
        })
        .collect()
}

/// Runs one tool through the MCP client and returns its text result.
///
/// Tool failures (including a slide whose narration failed) are returned as
/// text so the model can react to them.
async fn call_tool(
    mcp_client: &RunningService<RoleClient, ()>,
    name: &str,
    arguments: &str,
) -> Result<String> {
    let arguments = match serde_json::from_str(arguments) {
        Ok(arguments) => arguments,
        Err(e) => {
            warn!(tool = %name, error = %e, "Model sent malformed tool arguments");
            return Ok(format!("{{\"error\": \"Invalid arguments: {e}\"}}"));
        }
    };
    let result = mcp_client
        .peer()
        .call_tool(CallToolRequestParam {
            name: name.to_string().into(),
            arguments: Some(arguments),
        })
        .await?;

    let annotated_content = result
        .content
        .context("Tool call returned no content")?
        .pop()
        .context("Content list was empty")?;
    Ok(match annotated_content.raw {
        RawContent::Text(text_content) => text_content.text,
        _ => "{\"error\": \"Unexpected content type from tool\"}".to_string(),
    })
}

async fn send_chunk(socket_tx: &SocketSink, chunk: &str) -> Result<()> {
    let mut sink = socket_tx.lock().await;
    send_msg(
        &mut sink,
        ServerMessage::ResponseChunk {
            chunk: chunk.to_string(),
        },
    )
    .await
}

/// Spawn-friendly wrapper that reports failures to the client.
pub(crate) async fn run_turn(
    state: Arc<AppState>,
    deck: SharedDeck,
    history: Arc<Mutex<Vec<Message>>>,
    turn_lock: Arc<Mutex<()>>,
    mcp_client: Arc<RunningService<RoleClient, ()>>,
    user_text: String,
    socket_tx: SocketSink,
) {
    let _turn = turn_lock.lock().await;
    if let Err(e) =
        handle_react_cycle(&state, &deck, &history, &mcp_client, &user_text, &socket_tx).await
    {
        warn!(error = ?e, "Agent turn failed");
        let mut sink = socket_tx.lock().await;
        let _ = send_msg(
            &mut sink,
            ServerMessage::Error {
                message: format!("The agent could not finish its turn: {e}"),
            },
        )
        .await;
    }
}

/// Runs the one-shot slide task for the "Add Slide" control.
///
/// The run is claimed before `running: true` is announced, so a rejected
/// trigger never reports the in-flight run as finished. Narration failures
/// are already reported through the deck's event channel, so only the other
/// task failures become notices here.
pub(crate) async fn run_slide_task(
    task: Arc<SlideTask>,
    history: Arc<Mutex<Vec<Message>>>,
    socket_tx: SocketSink,
) {
    let claimed = match task.try_begin() {
        Ok(claimed) => claimed,
        Err(e) => {
            info!(error = %e, "Ignoring slide task trigger");
            let _ = send_msg(
                &mut *socket_tx.lock().await,
                ServerMessage::Notice {
                    message: e.to_string(),
                },
            )
            .await;
            return;
        }
    };

    let _ = send_msg(
        &mut *socket_tx.lock().await,
        ServerMessage::TaskStatus { running: true },
    )
    .await;
    let context = {
        let history = history.lock().await;
        models::chat_history(&history)
    };
    let outcome = match context {
        Ok(context) => claimed.run(context).await,
        Err(e) => Err(TaskError::Decision(e)),
    };

    let mut sink = socket_tx.lock().await;
    match outcome {
        Ok(index) => info!(slide_index = index, "Slide task finished"),
        Err(TaskError::Command(e)) => warn!(error = %e, "Slide task narration failed"),
        Err(e) => {
            warn!(error = %e, "Slide task did not produce a slide");
            let _ = send_msg(
                &mut sink,
                ServerMessage::Notice {
                    message: e.to_string(),
                },
            )
            .await;
        }
    }
    let _ = send_msg(&mut sink, ServerMessage::TaskStatus { running: false }).await;
    // Release the claim only once the client has been told the run ended.
    drop(sink);
    drop(claimed);
}
