//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::SessionRegistry;
use crate::domain::peer::DEFAULT_QUEUE_CAPACITY;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Registry of live game sessions.
    pub registry: Arc<SessionRegistry>,
    /// When the server started.
    pub started_at: DateTime<Utc>,
    /// Outbound frames each connection may have queued before eviction.
    pub queue_capacity: usize,
}

impl AppState {
    /// Creates state around an existing registry with the default
    /// per-connection queue capacity.
    #[must_use]
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            registry,
            started_at: Utc::now(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Sets the per-connection outbound queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }
}
