//! WebSocket layer: upgrade, transport, wire messages, session handling.
//!
//! The WebSocket endpoint at `/` (also `/ws`) carries the whole game
//! protocol: one `init` event selects start, join or watch, after which
//! the starter sends `play` events and everyone receives `play`/`win`.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod session_handler;
