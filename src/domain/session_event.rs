//! Events the server sends to clients.
//!
//! Serialized as JSON objects tagged by `"type"`. Only [`SessionEvent::Init`]
//! is ever sent point-to-point to the session's creator; `play` and `win` are
//! broadcast; `error` goes to the one connection that caused it.

use serde::Serialize;

use super::{Frame, SessionToken};
use crate::error::GatewayError;
use crate::game::{Move, Player};

/// Server → client event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Sent once to the starting connection with the session's secrets.
    Init {
        /// Token a second player uses to join.
        join: SessionToken,
        /// Token spectators use to watch.
        watch: SessionToken,
    },

    /// A disc was dropped.
    Play {
        /// Who played.
        player: Player,
        /// Column played.
        column: usize,
        /// Row the disc landed on.
        row: usize,
    },

    /// The game has been won.
    Win {
        /// The winner.
        player: Player,
    },

    /// Something the receiving client did was rejected.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

impl SessionEvent {
    /// Builds an [`SessionEvent::Error`] with the given message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serializes the event into a shareable text frame.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Encode`] if JSON serialization fails.
    pub fn encode(&self) -> Result<Frame, GatewayError> {
        Ok(Frame::from(serde_json::to_string(self)?))
    }

    /// Returns the `"type"` tag as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::Play { .. } => "play",
            Self::Win { .. } => "win",
            Self::Error { .. } => "error",
        }
    }
}

impl From<Move> for SessionEvent {
    fn from(mv: Move) -> Self {
        Self::Play {
            player: mv.player,
            column: mv.column,
            row: mv.row,
        }
    }
}
