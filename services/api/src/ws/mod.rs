//! WebSocket Presentation Sessions
//!
//! Every WebSocket connection is one presentation: its own deck, its own
//! narration player bound to the browser's audio element, and the agent
//! that builds the slides. It is structured into submodules:
//!
//! - `protocol`: Defines the JSON-based message format for client-server communication.
//! - `session`: Manages the connection lifecycle and routes messages between components.
//! - `cycle`: Implements the agent's "ReAct" (Reason-Act) turn for chat messages.

mod cycle;
pub mod protocol;
pub mod session;

pub use session::ws_handler;
