//! Token-indexed store of live sessions.
//!
//! [`SessionRegistry`] maps join tokens and watch tokens (two separate
//! namespaces) to the same [`Session`]. Both maps sit behind one
//! `parking_lot::RwLock`, so creating, resolving and retiring are each a
//! single short critical section and a retire can never interleave with a
//! half-finished lookup or attach. Lock order is registry, then a session's
//! game, then its connection sets. Per-game contention is confined to each
//! session's own locks.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;

use super::session_token::DEFAULT_TOKEN_BYTES;
use super::{Membership, Peer, Role, Session, SessionToken};
use crate::error::GatewayError;
use crate::game::Move;

#[derive(Debug, Default)]
struct TokenTable {
    join: HashMap<SessionToken, Arc<Session>>,
    watch: HashMap<SessionToken, Arc<Session>>,
}

impl TokenTable {
    /// Draws tokens until one is unused in both namespaces.
    fn fresh_token(&self, len: usize) -> SessionToken {
        loop {
            let token = SessionToken::generate(len);
            if !self.join.contains_key(&token) && !self.watch.contains_key(&token) {
                return token;
            }
        }
    }
}

/// Central store for all live sessions.
///
/// Constructed once at startup and shared as `Arc<SessionRegistry>` with
/// every connection handler.
#[derive(Debug)]
pub struct SessionRegistry {
    tokens: RwLock<TokenTable>,
    token_bytes: usize,
}

impl SessionRegistry {
    /// Creates an empty registry issuing tokens of the default length.
    #[must_use]
    pub fn new() -> Self {
        Self::with_token_bytes(DEFAULT_TOKEN_BYTES)
    }

    /// Creates an empty registry issuing tokens built from `token_bytes`
    /// random bytes.
    #[must_use]
    pub fn with_token_bytes(token_bytes: usize) -> Self {
        Self {
            tokens: RwLock::new(TokenTable::default()),
            token_bytes,
        }
    }

    /// Starts a new session with `starter` as its first player.
    ///
    /// The starter is attached before the tokens become resolvable. The
    /// returned lease retires both tokens when dropped.
    #[must_use]
    pub fn create_session(self: &Arc<Self>, starter: Peer) -> SessionLease {
        let mut tokens = self.tokens.write();
        let join = tokens.fresh_token(self.token_bytes);
        let watch = loop {
            let candidate = tokens.fresh_token(self.token_bytes);
            if candidate != join {
                break candidate;
            }
        };

        let session = Arc::new(Session::new(join.clone(), watch.clone()));
        let membership = session.attach(starter, Role::Player);
        tokens.join.insert(join, Arc::clone(&session));
        tokens.watch.insert(watch, Arc::clone(&session));
        drop(tokens);

        tracing::info!(
            session_id = %session.id(),
            connection_id = %membership.connection_id(),
            "session created"
        );

        SessionLease {
            registry: Arc::clone(self),
            membership,
        }
    }

    /// Looks up a session by join token.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SessionNotFound`] if the token was never
    /// issued or has been retired.
    pub fn resolve_join(&self, token: &str) -> Result<Arc<Session>, GatewayError> {
        self.tokens
            .read()
            .join
            .get(token)
            .cloned()
            .ok_or(GatewayError::SessionNotFound)
    }

    /// Looks up a session by watch token.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SessionNotFound`] if the token was never
    /// issued or has been retired.
    pub fn resolve_watch(&self, token: &str) -> Result<Arc<Session>, GatewayError> {
        self.tokens
            .read()
            .watch
            .get(token)
            .cloned()
            .ok_or(GatewayError::SessionNotFound)
    }

    /// Resolves `token` in the `role` namespace and attaches `peer` to the
    /// session, returning its membership guard and a snapshot of the moves
    /// played so far.
    ///
    /// Lookup and attachment happen under one registry read lock, so a
    /// concurrent [`retire`](Self::retire) either completes first and the
    /// lookup fails, or completes after the peer is attached.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SessionNotFound`] if the token was never
    /// issued or has been retired; `peer` is not attached anywhere.
    pub fn attach(
        &self,
        token: &str,
        role: Role,
        peer: Peer,
    ) -> Result<(Membership, Vec<Move>), GatewayError> {
        let tokens = self.tokens.read();
        let table = match role {
            Role::Player => &tokens.join,
            Role::Spectator => &tokens.watch,
        };
        let session = table.get(token).ok_or(GatewayError::SessionNotFound)?;
        let attached = session.attach_with_history(peer, role);
        drop(tokens);
        Ok(attached)
    }

    /// Removes the session registered under `join_token`, together with its
    /// watch token. Returns the session if it was still registered.
    ///
    /// Connections already attached keep their handle until they close;
    /// only new lookups fail.
    pub fn retire(&self, join_token: &str) -> Option<Arc<Session>> {
        let mut tokens = self.tokens.write();
        let session = tokens.join.remove(join_token)?;
        tokens.watch.remove(session.watch_token().as_str());
        drop(tokens);

        tracing::info!(
            session_id = %session.id(),
            moves = session.move_count(),
            age_secs = (Utc::now() - session.created_at()).num_seconds(),
            "session retired"
        );
        Some(session)
    }

    /// Returns the number of joinable sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.tokens.read().join.len()
    }

    /// Returns the number of watchable sessions.
    #[must_use]
    pub fn watchable_count(&self) -> usize {
        self.tokens.read().watch.len()
    }

    /// Returns the number of player and spectator connections attached to
    /// joinable sessions.
    #[must_use]
    pub fn connection_counts(&self) -> (usize, usize) {
        self.tokens
            .read()
            .join
            .values()
            .fold((0, 0), |(players, spectators), session| {
                (
                    players + session.connections(Role::Player).len(),
                    spectators + session.connections(Role::Spectator).len(),
                )
            })
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Ownership of a session held by the connection that created it.
///
/// Dropping the lease retires the session's tokens and detaches the
/// starter, on every exit path of the starter's handler.
#[derive(Debug)]
pub struct SessionLease {
    registry: Arc<SessionRegistry>,
    membership: Membership,
}

impl SessionLease {
    /// Returns the leased session.
    #[must_use]
    pub const fn session(&self) -> &Arc<Session> {
        self.membership.session()
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.registry
            .retire(self.membership.session().join_token().as_str());
    }
}
