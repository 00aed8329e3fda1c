//! Client → server wire messages.
//!
//! Incoming text frames are parsed into [`ClientEvent`] at the boundary.
//! Anything that does not deserialize, or that carries a field combination
//! the protocol does not allow, becomes a [`GatewayError::Protocol`].

use serde::Deserialize;

use crate::domain::SessionToken;
use crate::error::GatewayError;

/// Client → server event, tagged by `"type"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// First message on every connection.
    Init {
        /// Join an existing game as a player.
        #[serde(default)]
        join: Option<SessionToken>,
        /// Watch an existing game as a spectator.
        #[serde(default)]
        watch: Option<SessionToken>,
    },

    /// Drop a disc into `column`.
    Play {
        /// Target column. Signed so that out-of-range values reach the
        /// engine as an illegal move instead of a parse failure.
        column: i64,
    },
}

/// What a new connection asked for in its `init` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Initiation {
    /// Neither token: start a new game.
    Start,
    /// Join the game behind this join token.
    Join(SessionToken),
    /// Watch the game behind this watch token.
    Watch(SessionToken),
}

impl TryFrom<ClientEvent> for Initiation {
    type Error = GatewayError;

    fn try_from(event: ClientEvent) -> Result<Self, Self::Error> {
        match event {
            ClientEvent::Init {
                join: None,
                watch: None,
            } => Ok(Self::Start),
            ClientEvent::Init {
                join: Some(token),
                watch: None,
            } => Ok(Self::Join(token)),
            ClientEvent::Init {
                join: None,
                watch: Some(token),
            } => Ok(Self::Watch(token)),
            ClientEvent::Init { .. } => Err(GatewayError::Protocol(
                "Init event must not carry both join and watch.".to_string(),
            )),
            ClientEvent::Play { .. } => Err(GatewayError::Protocol(
                "Expected an init event.".to_string(),
            )),
        }
    }
}

/// Parses the initiating message of a connection.
///
/// # Errors
///
/// Returns [`GatewayError::Protocol`] if `text` is not a well-formed
/// `init` event carrying at most one token.
pub fn parse_init(text: &str) -> Result<Initiation, GatewayError> {
    serde_json::from_str::<ClientEvent>(text)
        .map_err(|_| GatewayError::Protocol("Expected an init event.".to_string()))?
        .try_into()
}

/// Parses a `play` event and returns its column.
///
/// # Errors
///
/// Returns [`GatewayError::Protocol`] if `text` is not a well-formed
/// `play` event.
pub fn parse_play(text: &str) -> Result<i64, GatewayError> {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(ClientEvent::Play { column }) => Ok(column),
        _ => Err(GatewayError::Protocol(
            "Expected a play event.".to_string(),
        )),
    }
}
