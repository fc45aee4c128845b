//! Connection identity and in-flight tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Count pipelines that are still running
//!
//! The count is purely observational. Stopping the server never waits on it
//! and never cancels the connections it counts.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection number, shown as `conn-N` in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        // Only uniqueness matters here.
        Self(NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Counts connections whose pipeline has not finished yet.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    in_flight: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            in_flight: Arc::clone(&self.in_flight),
            id: ConnectionId::next(),
        }
    }

    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// Held by a connection task for as long as its pipeline runs.
#[derive(Debug)]
pub struct ConnectionGuard {
    in_flight: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}
