//! Gateway error types.
//!
//! [`GatewayError`] is the central error type. Errors that a client caused
//! are reported back to that client only, as an `error` event whose text
//! comes from [`GatewayError::client_message`]; nothing here is ever
//! surfaced to other connections.

use crate::game::GameError;

/// Server-side error enum.
///
/// # Severity
///
/// | Variant             | Reported to        | Handler continues? |
/// |---------------------|--------------------|--------------------|
/// | `Protocol` (init)   | offending client   | no, closes         |
/// | `Protocol` (play)   | offending client   | yes                |
/// | `SessionNotFound`   | requesting client  | no, closes         |
/// | `IllegalMove`       | moving client      | yes                |
/// | `ConnectionClosed`  | nobody             | no                 |
/// | `QueueFull`         | nobody (evicted)   | no                 |
/// | `Encode`, `Config`  | logs               | no                 |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// No live session matches the supplied join or watch token.
    #[error("session not found")]
    SessionNotFound,

    /// The client sent a message that does not fit the protocol.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The game engine rejected a move.
    #[error("illegal move: {0}")]
    IllegalMove(#[from] GameError),

    /// The connection's writer has shut down.
    #[error("connection closed")]
    ConnectionClosed,

    /// The connection stopped reading and its outbound queue filled up.
    #[error("outbound queue full")]
    QueueFull,

    /// An outgoing event could not be serialized.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Returns the text sent to the client in an `error` event.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::SessionNotFound => "Game not found.".to_string(),
            Self::IllegalMove(err) => err.to_string(),
            Self::Protocol(reason) => reason.clone(),
            Self::ConnectionClosed | Self::QueueFull | Self::Encode(_) | Self::Config(_) => {
                "Internal error.".to_string()
            }
        }
    }
}
