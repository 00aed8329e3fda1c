//! One-shot transmission of a game's history to a newly attached peer.
//!
//! The history handed in is a snapshot taken when the peer was attached
//! (see [`super::Session::attach_with_history`]), never a live view, so a
//! move played while the replay is being queued cannot shift the iteration.
//! That move reaches the peer through the live broadcast instead. Every move
//! is therefore delivered exactly once across replay and broadcast, but a
//! live move may be queued ahead of the tail of the replay: ordering across
//! the two paths is only eventually consistent.

use super::{Peer, SessionEvent};
use crate::error::GatewayError;
use crate::game::Move;

/// Queues one `play` event per move in `history`, in recorded order.
///
/// Returns the number of events queued.
///
/// # Errors
///
/// Returns [`GatewayError::ConnectionClosed`] as soon as the peer's writer
/// is gone, or [`GatewayError::QueueFull`] if the peer's queue overflows;
/// the remaining moves are not attempted.
pub fn replay(peer: &Peer, history: &[Move]) -> Result<usize, GatewayError> {
    for mv in history {
        peer.send_event(&SessionEvent::from(*mv))?;
    }
    if !history.is_empty() {
        tracing::debug!(connection_id = %peer.id(), moves = history.len(), "history replayed");
    }
    Ok(history.len())
}
