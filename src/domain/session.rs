//! One live game and the connections attached to it.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::broadcast::deliver;
use super::{ConnectionId, ConnectionSet, Peer, SessionEvent, SessionId, SessionToken};
use crate::error::GatewayError;
use crate::game::{Connect4, Move, Player};

/// Which connection set a peer is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The starter or a connection that joined with the join token.
    Player,
    /// A connection that attached with the watch token.
    Spectator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Player => "player",
            Self::Spectator => "spectator",
        })
    }
}

/// Result of an accepted move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayOutcome {
    /// The recorded move.
    pub played: Move,
    /// Winner after the move, if any.
    pub winner: Option<Player>,
    /// Number of connections the `play` event was queued for.
    pub delivered: usize,
}

/// A game plus its player and spectator connection sets.
///
/// The join and watch tokens both resolve to the same `Session`, so
/// spectators always observe the authoritative [`Connect4`] instance while
/// keeping their own connection set.
///
/// # Locking
///
/// The game lock is taken before either set lock, never the other way
/// round. It is held while a move is applied and broadcast, and while a
/// peer is attached together with its history snapshot; none of these
/// sections contain an `.await`.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    join_token: SessionToken,
    watch_token: SessionToken,
    game: Mutex<Connect4>,
    players: ConnectionSet,
    spectators: ConnectionSet,
    created_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session with an empty board and no connections.
    #[must_use]
    pub fn new(join_token: SessionToken, watch_token: SessionToken) -> Self {
        Self {
            id: SessionId::new(),
            join_token,
            watch_token,
            game: Mutex::new(Connect4::new()),
            players: ConnectionSet::new(),
            spectators: ConnectionSet::new(),
            created_at: Utc::now(),
        }
    }

    /// Returns the session identifier.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the token players use to join.
    #[must_use]
    pub const fn join_token(&self) -> &SessionToken {
        &self.join_token
    }

    /// Returns the token spectators use to watch.
    #[must_use]
    pub const fn watch_token(&self) -> &SessionToken {
        &self.watch_token
    }

    /// Returns when the session was created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the connection set for `role`.
    #[must_use]
    pub const fn connections(&self, role: Role) -> &ConnectionSet {
        match role {
            Role::Player => &self.players,
            Role::Spectator => &self.spectators,
        }
    }

    /// Snapshot of every attached peer, players first.
    #[must_use]
    pub fn audience(&self) -> Vec<Peer> {
        let mut peers = self.players.snapshot();
        peers.extend(self.spectators.snapshot());
        peers
    }

    /// Returns the winner, if decided.
    #[must_use]
    pub fn winner(&self) -> Option<Player> {
        self.game.lock().winner()
    }

    /// Returns the number of moves played.
    #[must_use]
    pub fn move_count(&self) -> usize {
        self.game.lock().moves().len()
    }

    /// Returns a copy of the move log.
    #[must_use]
    pub fn history(&self) -> Vec<Move> {
        self.game.lock().snapshot()
    }

    /// Adds `peer` to the `role` set. The returned guard removes it again
    /// when dropped.
    #[must_use]
    pub fn attach(self: &Arc<Self>, peer: Peer, role: Role) -> Membership {
        let connection_id = peer.id();
        self.connections(role).insert(peer);
        Membership {
            session: Arc::clone(self),
            role,
            connection_id,
        }
    }

    /// Adds `peer` to the `role` set and snapshots the move log in the same
    /// critical section as move application.
    ///
    /// Every move is then either in the returned history or broadcast to the
    /// peer live, never both and never neither.
    #[must_use]
    pub fn attach_with_history(self: &Arc<Self>, peer: Peer, role: Role) -> (Membership, Vec<Move>) {
        let game = self.game.lock();
        let membership = self.attach(peer, role);
        let history = game.snapshot();
        drop(game);
        (membership, history)
    }

    /// Plays `column` for `player` and broadcasts the resulting `play`
    /// event, followed by a `win` event if the move decided the game, to
    /// every attached player and spectator.
    ///
    /// Both frames are encoded before the move is recorded, so a recorded
    /// move is always broadcast.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::IllegalMove`] if the engine rejects the move,
    /// or [`GatewayError::Encode`] if an event cannot be serialized; in
    /// either case nothing is broadcast and the game is unchanged.
    pub fn play(&self, player: Player, column: usize) -> Result<PlayOutcome, GatewayError> {
        let mut game = self.game.lock();
        let row = game.check(player, column)?;
        let played = Move {
            player,
            column,
            row,
        };
        let play_frame = SessionEvent::from(played).encode()?;
        let win_frame = SessionEvent::Win { player }.encode()?;

        game.play(player, column)?;
        let winner = game.winner();

        let audience = self.audience();
        let delivered = deliver(&audience, &play_frame, "play");
        if winner.is_some() {
            deliver(&audience, &win_frame, "win");
        }
        drop(game);

        Ok(PlayOutcome {
            played,
            winner,
            delivered,
        })
    }
}

/// Scoped membership of one connection in one session's connection set.
///
/// Dropping the guard removes the connection, whatever the reason the
/// owning handler exited.
#[derive(Debug)]
pub struct Membership {
    session: Arc<Session>,
    role: Role,
    connection_id: ConnectionId,
}

impl Membership {
    /// Returns the session this membership belongs to.
    #[must_use]
    pub const fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Returns the attached connection's id.
    #[must_use]
    pub const fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        if self
            .session
            .connections(self.role)
            .remove(self.connection_id)
        {
            tracing::debug!(
                session_id = %self.session.id(),
                connection_id = %self.connection_id,
                role = %self.role,
                "connection detached"
            );
        }
    }
}
