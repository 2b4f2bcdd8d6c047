//! Deckcast API Library Crate
//!
//! This library contains the web service around the slide engine: the
//! application state, configuration, HTTP handlers (including the speech
//! endpoint narrations point at), the WebSocket presentation session and
//! routing. The `api` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
