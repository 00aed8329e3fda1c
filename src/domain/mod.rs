//! Domain layer: identifiers, sessions, the session registry and fan-out.
//!
//! This module holds the server-side model: connection and session
//! identity, unguessable tokens, per-session connection sets, the registry
//! that indexes sessions by token, and the broadcast and replay paths that
//! move events from a game to its connections.

pub mod broadcast;
pub mod connection_set;
pub mod ids;
pub mod peer;
pub mod registry;
pub mod replay;
pub mod session;
pub mod session_event;
pub mod session_token;

pub use broadcast::{broadcast, deliver};
pub use connection_set::ConnectionSet;
pub use ids::{ConnectionId, SessionId};
pub use peer::{Frame, Outbox, Peer};
pub use registry::{SessionLease, SessionRegistry};
pub use replay::replay;
pub use session::{Membership, PlayOutcome, Role, Session};
pub use session_event::SessionEvent;
pub use session_token::SessionToken;
