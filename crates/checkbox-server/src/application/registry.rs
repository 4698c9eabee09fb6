//! ConnectionRegistry: the set of currently connected clients.
//!
//! The registry is the only structure in the server that several sessions
//! mutate, and therefore the only synchronization point.  It maps each
//! [`ConnectionId`] to a [`ConnectionHandle`], the sending end of that
//! connection's bounded outbound queue.
//!
//! # Ownership
//!
//! The registry does **not** own connections.  Each session task owns its
//! socket and its writer task; the registry only holds a handle that lets the
//! broadcaster enqueue frames.  Closing a connection is the session's job.
//!
//! # Locking
//!
//! One `std::sync::RwLock` guards the map.  `register` / `unregister` take the
//! write lock; `snapshot` / `count` take the read lock.  No lock is ever held
//! across an `.await` or while a broadcast iterates: [`ConnectionRegistry::snapshot`]
//! copies the handles out and releases the lock before returning.
//!
//! A poisoned lock (a panic while holding it) is recovered rather than
//! propagated; the map itself is never left half-updated by these methods.
//!
//! # Wire format
//!
//! Each handle carries the [`WireFormat`] its client speaks.  It starts at
//! the server's configured default and follows the last message the client
//! sent, so a JSON-only browser keeps receiving JSON and a binary client
//! keeps receiving 5-byte frames.  The format cell is shared by every clone
//! of the handle, including the one held by the registry.
//!
//! # Lifecycle
//!
//! ```text
//! acquire(id, handle) ──► Registration ──(drop: close, error or panic)──► unregister(id)
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use checkbox_core::{OutboundFrame, WireFormat};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

use crate::domain::ConnectionId;

/// Why a frame could not be queued for a connection.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum EnqueueError {
    /// The connection's outbound queue is at capacity.
    #[error("outbound queue full")]
    Full,

    /// The connection's writer has gone away.
    #[error("connection closed")]
    Closed,
}

const FORMAT_BINARY: u8 = 0;
const FORMAT_TEXT: u8 = 1;

fn format_tag(format: WireFormat) -> u8 {
    match format {
        WireFormat::Binary => FORMAT_BINARY,
        WireFormat::Text => FORMAT_TEXT,
    }
}

/// Non-owning handle to a connection's outbound queue.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    tx: mpsc::Sender<OutboundFrame>,
    format: Arc<AtomicU8>,
}

impl ConnectionHandle {
    /// Creates a bounded queue for a client that speaks `format`, and returns
    /// the handle plus its receiving end.
    pub fn channel(capacity: usize, format: WireFormat) -> (Self, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(capacity);
        let handle = Self {
            tx,
            format: Arc::new(AtomicU8::new(format_tag(format))),
        };
        (handle, rx)
    }

    /// The wire format frames for this client are encoded in.
    pub fn format(&self) -> WireFormat {
        match self.format.load(Ordering::Relaxed) {
            FORMAT_TEXT => WireFormat::Text,
            _ => WireFormat::Binary,
        }
    }

    /// Switches the client to `format`; visible through every clone.
    pub fn set_format(&self, format: WireFormat) {
        self.format.store(format_tag(format), Ordering::Relaxed);
    }

    /// Queues `frame` without waiting.
    ///
    /// # Errors
    ///
    /// [`EnqueueError::Full`] if the queue is at capacity,
    /// [`EnqueueError::Closed`] if the receiver was dropped.
    pub fn try_enqueue(&self, frame: OutboundFrame) -> Result<(), EnqueueError> {
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    /// Queues `frame`, waiting for capacity.
    ///
    /// Only the owning session uses this (initial sync and direct replies),
    /// since it may wait on its own writer.
    ///
    /// # Errors
    ///
    /// [`EnqueueError::Closed`] if the receiver was dropped.
    pub async fn enqueue(&self, frame: OutboundFrame) -> Result<(), EnqueueError> {
        self.tx.send(frame).await.map_err(|_| EnqueueError::Closed)
    }

    /// Returns `true` once the receiving end has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Thread-safe membership set of open connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection.
    ///
    /// Registering an id that is already present is a no-op: the existing
    /// handle is kept and the count does not change.  Returns `true` if the
    /// connection was newly added.
    pub fn register(&self, id: ConnectionId, handle: ConnectionHandle) -> bool {
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if connections.contains_key(&id) {
            return false;
        }
        connections.insert(id, handle);
        info!("client {id} registered. Total connections: {}", connections.len());
        true
    }

    /// Removes a connection if present.  Returns `true` if it was a member.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if connections.remove(&id).is_some() {
            info!("client {id} unregistered. Total connections: {}", connections.len());
            true
        } else {
            false
        }
    }

    /// Returns a point-in-time copy of all members.
    ///
    /// The read lock is released before this returns, so callers may iterate
    /// (and enqueue) without blocking concurrent register/unregister calls.
    pub fn snapshot(&self) -> Vec<(ConnectionId, ConnectionHandle)> {
        let connections = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        connections
            .iter()
            .map(|(id, handle)| (*id, handle.clone()))
            .collect()
    }

    /// Returns the number of registered connections.
    pub fn count(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if `id` is currently registered.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    /// Registers `id` and returns a guard that unregisters it on drop.
    ///
    /// Returns `None` if `id` is already registered; the existing member is
    /// left untouched and no guard is created for it.
    pub fn acquire(
        self: &Arc<Self>,
        id: ConnectionId,
        handle: ConnectionHandle,
    ) -> Option<Registration> {
        self.register(id, handle).then(|| Registration {
            registry: Arc::clone(self),
            id,
        })
    }
}

/// Scoped registry membership.
///
/// Dropping the guard unregisters the connection exactly once, whichever way
/// the owning session ends.
#[derive(Debug)]
pub struct Registration {
    registry: Arc<ConnectionRegistry>,
    id: ConnectionId,
}

impl Registration {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> (ConnectionHandle, mpsc::Receiver<OutboundFrame>) {
        ConnectionHandle::channel(4, WireFormat::Binary)
    }

    #[test]
    fn test_registry_starts_empty() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.count(), 0);
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_register_adds_connection() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        let (h, _rx) = handle();

        assert!(registry.register(id, h));
        assert_eq!(registry.count(), 1);
        assert!(registry.contains(id));
    }

    #[test]
    fn test_double_register_counts_once() {
        // Arrange
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        let (h, _rx) = handle();

        // Act
        let first = registry.register(id, h.clone());
        let second = registry.register(id, h);

        // Assert
        assert!(first);
        assert!(!second);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_unregister_removes_connection() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        let (h, _rx) = handle();
        registry.register(id, h);

        assert!(registry.unregister(id));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_unregister_non_member_is_noop() {
        let registry = ConnectionRegistry::new();
        let (h, _rx) = handle();
        registry.register(ConnectionId::new(), h);

        assert!(!registry.unregister(ConnectionId::new()));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_snapshot_is_detached_from_later_changes() {
        let registry = ConnectionRegistry::new();
        let a = ConnectionId::new();
        let (h, _rx) = handle();
        registry.register(a, h.clone());

        let snapshot = registry.snapshot();
        registry.register(ConnectionId::new(), h);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].0, a);
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn test_registration_guard_unregisters_on_drop() {
        let registry = Arc::new(ConnectionRegistry::new());
        let id = ConnectionId::new();
        let (h, _rx) = handle();

        {
            let guard = registry.acquire(id, h).unwrap();
            assert_eq!(guard.id(), id);
            assert!(registry.contains(id));
        }

        assert!(!registry.contains(id));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_registration_guard_unregisters_on_panic() {
        let registry = Arc::new(ConnectionRegistry::new());
        let id = ConnectionId::new();
        let (h, _rx) = handle();

        let reg = Arc::clone(&registry);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = reg.acquire(id, h).unwrap();
            panic!("session loop blew up");
        }));

        assert!(result.is_err());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_acquire_of_registered_id_leaves_member_alone() {
        // Arrange: `id` is already held by a live guard
        let registry = Arc::new(ConnectionRegistry::new());
        let id = ConnectionId::new();
        let (first, _rx1) = handle();
        let (second, _rx2) = handle();
        let _held = registry.acquire(id, first).unwrap();

        // Act
        let duplicate = registry.acquire(id, second);

        // Assert: no second guard, and the original member survives
        assert!(duplicate.is_none());
        assert!(registry.contains(id));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_format_change_is_seen_by_registry_copy() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        let (h, _rx) = ConnectionHandle::channel(1, WireFormat::Text);
        registry.register(id, h.clone());

        h.set_format(WireFormat::Binary);

        let (_, stored) = registry.snapshot().remove(0);
        assert_eq!(stored.format(), WireFormat::Binary);
        h.set_format(WireFormat::Text);
        assert_eq!(stored.format(), WireFormat::Text);
    }

    #[test]
    fn test_try_enqueue_reports_full_queue() {
        let (h, _rx) = ConnectionHandle::channel(1, WireFormat::Binary);
        h.try_enqueue(OutboundFrame::Binary([1, 0, 0, 0, 1])).unwrap();

        let err = h.try_enqueue(OutboundFrame::Binary([1, 0, 0, 1, 1])).unwrap_err();
        assert_eq!(err, EnqueueError::Full);
    }

    #[test]
    fn test_try_enqueue_reports_closed_queue() {
        let (h, rx) = ConnectionHandle::channel(1, WireFormat::Binary);
        drop(rx);

        assert!(h.is_closed());
        assert_eq!(
            h.try_enqueue(OutboundFrame::Binary([1, 0, 0, 0, 1])),
            Err(EnqueueError::Closed)
        );
    }

    #[tokio::test]
    async fn test_concurrent_register_unregister_leaves_registry_empty() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut tasks = Vec::new();

        for _ in 0..32 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                let (h, _rx) = ConnectionHandle::channel(1, WireFormat::Binary);
                let _guard = registry.acquire(ConnectionId::new(), h).unwrap();
                tokio::task::yield_now().await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(registry.count(), 0);
    }
}
