//! Manages the primary WebSocket connection lifecycle for a presentation session.

use super::{
    cycle::{run_slide_task, run_turn},
    protocol::{ClientMessage, ServerMessage},
};
use crate::{models, state::AppState};
use anyhow::Result;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use deckcast_core::{
    DeckEvent,
    agent::PresentationService,
    command::CommandHandler,
    deck::{Deck, SharedDeck},
    navigation::NavigationController,
    playback::NarrationPlayer,
    task::SlideTask,
    view,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use rmcp::ServiceExt;
use std::sync::Arc;
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinSet,
};
use tracing::{Instrument, error, info, instrument, warn};
use uuid::Uuid;

/// The write half of a client socket, shared between the session loop and its tasks.
pub(crate) type SocketSink = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual WebSocket connection.
///
/// Every connection gets a fresh, empty deck. The session loop runs until the
/// client closes the socket.
#[instrument(name = "ws_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    tracing::Span::current().record("session_id", tracing::field::display(session_id));
    info!("New WebSocket connection");

    let (socket_tx, socket_rx) = socket.split();
    let socket_tx: SocketSink = Arc::new(Mutex::new(socket_tx));

    let session_span = tracing::info_span!("presentation_runtime", %session_id);
    async move {
        if let Err(e) = run_presentation_session(state, socket_tx, socket_rx, session_id).await {
            error!(error = ?e, "Presentation session terminated with error.");
        }
        info!("Presentation session finished.");
    }
    .instrument(session_span)
    .await
}

/// The main event loop for an active WebSocket session.
///
/// Listens for client messages, playback directives from the narration
/// player and deck events from the slide pipeline. Agent turns and slide
/// tasks run as separate tasks so that narration reports keep flowing while
/// a slide command is waiting on its narration.
async fn run_presentation_session(
    state: Arc<AppState>,
    socket_tx: SocketSink,
    mut socket_rx: SplitStream<WebSocket>,
    session_id: Uuid,
) -> Result<()> {
    let deck: SharedDeck = Deck::shared();

    // Nothing is spawned yet, so an early return here needs no cleanup.
    {
        let deck = deck.lock().await;
        send_msg(
            &mut *socket_tx.lock().await,
            ServerMessage::Initialized {
                session_id,
                view: view::render(&deck),
                deck: deck.snapshot(),
            },
        )
        .await?;
    }

    let (event_tx, mut event_rx) = mpsc::channel::<DeckEvent>(32);
    let (directive_tx, mut directive_rx) = mpsc::channel(8);

    let player = Arc::new(NarrationPlayer::new(
        state.config.tts_endpoint.clone(),
        directive_tx,
    ));
    let commands = Arc::new(CommandHandler::new(
        deck.clone(),
        player.clone(),
        Some(event_tx),
        state.config.pipeline_config(),
    ));
    // Navigation answers on the socket directly; the loop below is the only
    // consumer of the event channel.
    let navigation = NavigationController::new(deck.clone(), None);
    let slide_task = Arc::new(SlideTask::new(commands.clone(), state.llm_client.clone()));

    let presentation_service = PresentationService::new(commands);
    let (server_transport, client_transport) = tokio::io::duplex(4096);

    // Spawn the agent's tool-handling service.
    let agent_tool_handle = tokio::spawn(async move {
        if let Ok(service) = presentation_service.serve(server_transport).await {
            let _ = service.waiting().await;
        }
    });
    let mcp_client = Arc::new(().serve(client_transport).await?);

    let history = Arc::new(Mutex::new(Vec::<models::Message>::new()));
    let turn_lock = Arc::new(Mutex::new(()));
    let mut background = JoinSet::new();

    loop {
        tokio::select! {
            // Handle messages from the client WebSocket.
            incoming = socket_rx.next() => {
                let msg = match read_client(incoming) {
                    Inbound::Message(msg) => msg,
                    Inbound::Skip => continue,
                    Inbound::Closed => break,
                };
                match msg {
                    ClientMessage::UserMessage { text } => {
                        background.spawn(
                            run_turn(
                                state.clone(),
                                deck.clone(),
                                history.clone(),
                                turn_lock.clone(),
                                mcp_client.clone(),
                                text,
                                socket_tx.clone(),
                            )
                            .in_current_span(),
                        );
                    }
                    ClientMessage::AddSlide => {
                        background.spawn(
                            run_slide_task(slide_task.clone(), history.clone(), socket_tx.clone())
                                .in_current_span(),
                        );
                    }
                    ClientMessage::GoBack => {
                        navigation.go_back().await;
                        if let Err(e) = send_deck_update(&deck, &socket_tx).await {
                            warn!(error = ?e, "Failed to send deck update; closing session.");
                            break;
                        }
                    }
                    ClientMessage::GoForward => {
                        navigation.go_forward().await;
                        if let Err(e) = send_deck_update(&deck, &socket_tx).await {
                            warn!(error = ?e, "Failed to send deck update; closing session.");
                            break;
                        }
                    }
                    ClientMessage::NarrationEnded { id } => {
                        if !player.playback_ended(id).await {
                            info!(narration_id = id, "Ignoring end report for stale narration.");
                        }
                    }
                    ClientMessage::NarrationFailed { id, reason } => {
                        if !player.playback_failed(id, reason).await {
                            info!(narration_id = id, "Ignoring failure report for stale narration.");
                        }
                    }
                }
            },
            // Forward narration requests to the client's audio element.
            Some(directive) = directive_rx.recv() => {
                let msg = ServerMessage::PlayNarration { id: directive.id, url: directive.url };
                if let Err(e) = send_msg(&mut *socket_tx.lock().await, msg).await {
                    warn!(error = ?e, "Failed to forward narration; closing session.");
                    break;
                }
            },
            // Handle deck events from the slide pipeline.
            Some(event) = event_rx.recv() => {
                let msg = match event {
                    DeckEvent::Updated(snapshot) => ServerMessage::DeckUpdate {
                        view: view::render_snapshot(&snapshot),
                        deck: snapshot,
                    },
                    DeckEvent::NarrationUnavailable { slide_index, reason } => ServerMessage::Notice {
                        message: format!("Slide {} could not be narrated: {}", slide_index + 1, reason),
                    },
                };
                if let Err(e) = send_msg(&mut *socket_tx.lock().await, msg).await {
                    warn!(error = ?e, "Failed to send deck event; closing session.");
                    break;
                }
            },
            Some(joined) = background.join_next() => {
                if let Err(e) = joined {
                    error!(error = ?e, "Session task panicked.");
                }
            },
        }
    }

    // Clean up background tasks on exit.
    player.detach().await;
    background.abort_all();
    agent_tool_handle.abort();
    info!("WebSocket connection closed and presentation session terminated.");
    Ok(())
}

/// What the session loop does with one read from the client socket.
#[derive(Debug, PartialEq)]
enum Inbound {
    Message(ClientMessage),
    Skip,
    Closed,
}

fn read_client(incoming: Option<Result<Message, axum::Error>>) -> Inbound {
    match incoming {
        None => {
            info!("Client stream ended. Shutting down session.");
            Inbound::Closed
        }
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
            Ok(msg) => Inbound::Message(msg),
            Err(e) => {
                warn!(error = %e, "Ignoring malformed client message.");
                Inbound::Skip
            }
        },
        Some(Ok(Message::Binary(_))) => {
            warn!("Ignoring unexpected binary message.");
            Inbound::Skip
        }
        Some(Ok(Message::Close(_))) => {
            info!("Client sent close frame. Shutting down session.");
            Inbound::Closed
        }
        Some(Ok(Message::Ping(_) | Message::Pong(_))) => Inbound::Skip,
        Some(Err(e)) => {
            error!("Error receiving from client WebSocket: {:?}", e);
            Inbound::Closed
        }
    }
}

async fn send_deck_update(deck: &SharedDeck, socket_tx: &SocketSink) -> Result<()> {
    let snapshot = deck.lock().await.snapshot();
    send_msg(
        &mut *socket_tx.lock().await,
        ServerMessage::DeckUpdate {
            view: view::render_snapshot(&snapshot),
            deck: snapshot,
        },
    )
    .await
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
