//! Fan-out of one event to many connections.

use std::sync::Arc;

use super::{Frame, Peer, SessionEvent};
use crate::error::GatewayError;

/// Encodes `event` once and queues the same frame on every peer in
/// `targets`.
///
/// Callers pass a snapshot (see [`super::ConnectionSet::snapshot`]), so
/// membership changes during the call cannot skip or duplicate a target.
/// Queueing never waits on the network. A peer whose connection is already
/// gone, or whose queue overflows and gets it evicted, is skipped and left
/// in its set; its own handler removes it on disconnect.
///
/// Returns the number of peers the frame was queued for.
///
/// # Errors
///
/// Returns [`GatewayError::Encode`] if the event cannot be serialized.
/// Per-peer delivery failures are never reported as errors.
pub fn broadcast(targets: &[Peer], event: &SessionEvent) -> Result<usize, GatewayError> {
    let frame = event.encode()?;
    Ok(deliver(targets, &frame, event.event_type_str()))
}

/// Queues an already encoded `frame` on every peer in `targets`.
///
/// `event` names the frame in logs. Returns the number of peers the frame
/// was queued for.
pub fn deliver(targets: &[Peer], frame: &Frame, event: &'static str) -> usize {
    let mut delivered = 0;
    for peer in targets {
        match peer.send(Arc::clone(frame)) {
            Ok(()) => delivered += 1,
            Err(GatewayError::QueueFull) => {
                tracing::warn!(
                    connection_id = %peer.id(),
                    event,
                    "outbound queue full; evicting connection"
                );
            }
            Err(_) => {
                tracing::debug!(
                    connection_id = %peer.id(),
                    event,
                    "skipping closed connection"
                );
            }
        }
    }
    delivered
}
