//! # connect4-gateway
//!
//! WebSocket session server for live two-player Connect Four games with
//! any number of spectators.
//!
//! A connection's first message decides what it is: a starter creates a
//! session and receives secret join and watch tokens, a joiner attaches to
//! the players of an existing session, a watcher attaches to its
//! spectators and gets the moves played so far replayed. Every accepted
//! move is fanned out to all attached connections. Sessions live only in
//! memory and end when their starter disconnects.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket, HTTP)
//!     │
//!     ├── WS transport + session handler (ws/)
//!     ├── Health / stats endpoints (api/)
//!     │
//!     ├── SessionRegistry, Session, broadcast, replay (domain/)
//!     │
//!     └── Connect Four engine (game/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod game;
pub mod server;
pub mod ws;
