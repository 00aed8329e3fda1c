//! Set of live connections attached to one session in one role.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::{ConnectionId, Peer};

/// Mutex-protected map of [`ConnectionId`] to [`Peer`].
///
/// Every operation is a single short critical section; the lock is never
/// held across an `.await`. Broadcasts work on a [`snapshot`](Self::snapshot)
/// so a connection joining or leaving mid-broadcast cannot cause a skip or a
/// duplicate within that broadcast.
#[derive(Debug, Default)]
pub struct ConnectionSet {
    peers: Mutex<HashMap<ConnectionId, Peer>>,
}

impl ConnectionSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `peer`. Returns `false` if a peer with the same id was already
    /// present (it is replaced).
    pub fn insert(&self, peer: Peer) -> bool {
        self.peers.lock().insert(peer.id(), peer).is_none()
    }

    /// Removes the peer with `id`. Returns `true` if it was present.
    pub fn remove(&self, id: ConnectionId) -> bool {
        self.peers.lock().remove(&id).is_some()
    }

    /// Returns a copy of the current members.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Peer> {
        self.peers.lock().values().cloned().collect()
    }

    /// Returns the number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.lock().len()
    }

    /// Returns `true` if the set has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.lock().is_empty()
    }
}
