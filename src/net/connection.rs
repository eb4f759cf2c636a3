//! Connection state machine and lifecycle tracking.
//!
//! # Responsibilities
//! - Track per-connection state through the proxy state machine
//! - Generate unique connection IDs for tracing
//! - Count connections past the admission point (current and peak)
//!
//! # State Machine
//! ```text
//! Init ─┬─ CONNECT ──→ Tunneling ─────────────────────────────→ Closed
//!       ├─ GET ──────→ CacheLookup ─┬─ hit ─→ RespondingFromCache → Closed
//!       │                           └─ miss → Forwarding → Caching → Closed
//!       └─ other / malformed ─────────────────────────────────→ Closed
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::observability::metrics;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Where a connection is in its single request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Admitted, request line not yet classified.
    Init,
    /// Relaying bytes for a CONNECT request.
    Tunneling,
    /// Checking the cache for a GET target.
    CacheLookup,
    /// Writing a cached payload to the client.
    RespondingFromCache,
    /// Streaming an origin response to the client.
    Forwarding,
    /// Handing a completed origin response to the cache.
    Caching,
    /// Finished; both directions closed.
    Closed,
}

/// Tracks connections past the admission point.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    /// Current count of active connections.
    active_count: Arc<AtomicU64>,
    /// Highest count observed since creation.
    peak_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        let active = self.active_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_count.fetch_max(active, Ordering::SeqCst);
        metrics::record_connection_opened(active);

        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: ConnectionId::new(),
            state: ConnectionState::Init,
        }
    }

    /// Get current active connection count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Get the highest number of simultaneously active connections seen.
    pub fn peak_count(&self) -> u64 {
        self.peak_count.load(Ordering::SeqCst)
    }

    /// Resolve once no tracked connection remains. Callers bound this with
    /// a timeout.
    pub async fn wait_idle(&self) {
        while self.active_count.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }
}

/// Guard that tracks a connection's lifetime and state.
/// Decrements active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
    state: ConnectionState,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Move to `next`, logging the transition.
    pub fn transition(&mut self, next: ConnectionState) {
        tracing::trace!(
            connection_id = %self.id,
            from = ?self.state,
            to = ?next,
            "Connection state change"
        );
        self.state = next;
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.transition(ConnectionState::Closed);
        let active = self.active_count.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::record_connection_closed(active);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id1.to_string().starts_with("conn-"));
    }

    #[test]
    fn connection_tracker_counts() {
        let tracker = ConnectionTracker::new();
        assert_eq!(tracker.active_count(), 0);

        let guard1 = tracker.track();
        assert_eq!(tracker.active_count(), 1);

        let guard2 = tracker.track();
        assert_eq!(tracker.active_count(), 2);

        drop(guard1);
        assert_eq!(tracker.active_count(), 1);

        drop(guard2);
        assert_eq!(tracker.active_count(), 0);
        assert_eq!(tracker.peak_count(), 2);
    }

    #[test]
    fn guard_follows_transitions() {
        let tracker = ConnectionTracker::new();
        let mut guard = tracker.track();
        assert_eq!(guard.state(), ConnectionState::Init);

        guard.transition(ConnectionState::CacheLookup);
        guard.transition(ConnectionState::Forwarding);
        assert_eq!(guard.state(), ConnectionState::Forwarding);
    }

    #[tokio::test]
    async fn wait_idle_resolves_after_last_guard() {
        let tracker = ConnectionTracker::new();
        let guard = tracker.track();

        let waiter = tracker.clone();
        let idle = tokio::spawn(async move { waiter.wait_idle().await });
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        assert!(!idle.is_finished());

        drop(guard);
        tokio::time::timeout(std::time::Duration::from_secs(1), idle)
            .await
            .expect("wait_idle should resolve once idle")
            .unwrap();
    }
}
