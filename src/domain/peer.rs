//! Outbound handle to one live connection.
//!
//! A [`Peer`] pairs a [`ConnectionId`] with the sending half of a bounded
//! queue. The transport drains the other half, an [`Outbox`], into the
//! socket on its own task, so enqueueing never waits on the network.
//!
//! A client that stops reading cannot hold memory indefinitely: once its
//! queue is full the next send fails with [`GatewayError::QueueFull`] and
//! the connection is evicted. Its [`Outbox`] then reports end of stream,
//! the writer closes the socket, and later sends fail with
//! [`GatewayError::ConnectionClosed`]. Other connections are unaffected.

use std::sync::Arc;

use tokio::sync::{Notify, mpsc};

use super::{ConnectionId, SessionEvent};
use crate::error::GatewayError;
use crate::game::{COLUMNS, ROWS};

/// An encoded text frame, shared between every recipient of a broadcast.
pub type Frame = Arc<str>;

/// Default number of frames a connection may have queued.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Smallest accepted queue capacity: a full game's replay plus its `win`
/// event and an `error` must fit without a read.
pub const MIN_QUEUE_CAPACITY: usize = COLUMNS * ROWS + 8;

/// Cloneable sending handle for a single connection.
#[derive(Debug, Clone)]
pub struct Peer {
    id: ConnectionId,
    outbox: mpsc::Sender<Frame>,
    evicted: Arc<Notify>,
}

impl Peer {
    /// Creates a peer with a fresh [`ConnectionId`] and the default queue
    /// capacity, returning the receiving end of its outbound queue.
    #[must_use]
    pub fn channel() -> (Self, Outbox) {
        Self::bounded(DEFAULT_QUEUE_CAPACITY)
    }

    /// Creates a peer whose queue holds `capacity` frames (never below
    /// [`MIN_QUEUE_CAPACITY`]).
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, Outbox) {
        let (tx, rx) = mpsc::channel(capacity.max(MIN_QUEUE_CAPACITY));
        let evicted = Arc::new(Notify::new());
        let peer = Self {
            id: ConnectionId::new(),
            outbox: tx,
            evicted: Arc::clone(&evicted),
        };
        let outbox = Outbox {
            frames: rx,
            evicted,
            overflowed: false,
        };
        (peer, outbox)
    }

    /// Returns the identity of the underlying connection.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues an already encoded frame.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::QueueFull`] if the queue is full, which also
    /// evicts the connection, or [`GatewayError::ConnectionClosed`] if the
    /// connection's writer has shut down.
    pub fn send(&self, frame: Frame) -> Result<(), GatewayError> {
        match self.outbox.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.evicted.notify_one();
                Err(GatewayError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(GatewayError::ConnectionClosed),
        }
    }

    /// Encodes `event` and queues it for this connection only.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Encode`] if serialization fails, otherwise
    /// whatever [`Peer::send`] returns.
    pub fn send_event(&self, event: &SessionEvent) -> Result<(), GatewayError> {
        self.send(event.encode()?)
    }
}

/// Receiving end of a [`Peer`]'s queue, owned by the connection's writer.
#[derive(Debug)]
pub struct Outbox {
    frames: mpsc::Receiver<Frame>,
    evicted: Arc<Notify>,
    overflowed: bool,
}

impl Outbox {
    /// Waits for the next frame.
    ///
    /// Returns `None` once every [`Peer`] handle is gone, or as soon as the
    /// connection has been evicted for overflowing its queue. Frames still
    /// queued at eviction are discarded.
    pub async fn recv(&mut self) -> Option<Frame> {
        if self.overflowed {
            return None;
        }
        tokio::select! {
            biased;
            () = self.evicted.notified() => {
                self.overflowed = true;
                self.frames.close();
                None
            }
            frame = self.frames.recv() => frame,
        }
    }

    /// Takes a queued frame without waiting.
    ///
    /// # Errors
    ///
    /// Returns the channel's [`TryRecvError`](mpsc::error::TryRecvError)
    /// when nothing is queued or every sender is gone.
    pub fn try_recv(&mut self) -> Result<Frame, mpsc::error::TryRecvError> {
        self.frames.try_recv()
    }

    /// Returns `true` if the connection was evicted for overflowing.
    #[must_use]
    pub const fn overflowed(&self) -> bool {
        self.overflowed
    }
}
