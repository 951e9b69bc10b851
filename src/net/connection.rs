//! Per-connection bookkeeping.
//!
//! # Responsibilities
//! - Give every accepted connection an id for log correlation
//! - Keep the open-connection count (and its gauge) accurate
//! - Log each connection's lifetime when it ends
//!
//! # Design Decisions
//! - RAII: `ConnectionGuard` is moved into the connection task, so the
//!   count is released on every exit path, panics included

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::observability::metrics;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection id, rendered as `conn-<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Shared counter of open client connections.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    open: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection from `peer`.
    pub fn open(&self, peer: SocketAddr) -> ConnectionGuard {
        self.open.fetch_add(1, Ordering::SeqCst);
        metrics::connection_opened();

        let guard = ConnectionGuard {
            open: Arc::clone(&self.open),
            id: ConnectionId::next(),
            peer,
            opened_at: Instant::now(),
        };
        tracing::trace!(connection_id = %guard.id, peer_addr = %peer, "Connection opened");
        guard
    }

    /// Connections currently open.
    pub fn open_count(&self) -> u64 {
        self.open.load(Ordering::SeqCst)
    }
}

/// Holds one slot in the tracker for as long as the connection lives.
#[derive(Debug)]
pub struct ConnectionGuard {
    open: Arc<AtomicU64>,
    id: ConnectionId,
    peer: SocketAddr,
    opened_at: Instant,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
        metrics::connection_closed();
        tracing::trace!(
            connection_id = %self.id,
            peer_addr = %self.peer,
            duration_ms = self.opened_at.elapsed().as_millis() as u64,
            "Connection closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "192.0.2.7:51000".parse().unwrap()
    }

    #[test]
    fn ids_are_distinct_and_formatted() {
        let tracker = ConnectionTracker::new();
        let a = tracker.open(peer());
        let b = tracker.open(peer());

        assert_ne!(a.id(), b.id());
        assert_eq!(a.id().to_string(), format!("conn-{}", a.id().as_u64()));
        assert_eq!(a.peer(), peer());
    }

    #[test]
    fn guards_release_their_slot() {
        let tracker = ConnectionTracker::new();
        let first = tracker.open(peer());
        let second = tracker.open(peer());
        assert_eq!(tracker.open_count(), 2);

        drop(first);
        assert_eq!(tracker.open_count(), 1);

        drop(second);
        assert_eq!(tracker.open_count(), 0);
    }
}
