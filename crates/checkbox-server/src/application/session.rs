//! Per-connection sequencing contract.
//!
//! The socket plumbing lives in `infrastructure::ws_server`; this module
//! decides what happens at each step of a session so it can be tested
//! without a network:
//!
//! ```text
//! Connecting ──► Active ──────────────────────────────► Closed
//!                  │ register (Registration guard)        │ guard drop
//!                  │ initial_sync: SET for every checked  │ unregisters
//!                  │ index in [0, N)                      │ exactly once
//!                  │ loop: handle_event per message       │
//! ```
//!
//! # Grid bounds
//!
//! A SET or GET for an index at or beyond the grid size is rejected before
//! it reaches the store: text clients get an `"Index out of range"` ERROR
//! reply, binary clients are ignored.  Nothing is written or broadcast.
//!
//! # Store failures
//!
//! Store and broadcast are independent best-effort operations.  A failed
//! write is logged and the broadcast still goes out with the client-asserted
//! state.  A failed read during initial sync is treated as "unchecked" and
//! sync moves on to the next index.

use std::sync::Arc;

use checkbox_core::{InboundEvent, MalformedReason, OutboundFrame, StateChange, WireFormat};
use tracing::{debug, warn};

use crate::application::broadcast::Broadcaster;
use crate::application::registry::{ConnectionHandle, ConnectionRegistry, EnqueueError};
use crate::application::store::BitStore;
use crate::domain::{ConnectionId, ServerConfig};

/// Shared server state plus the per-message logic every session runs.
///
/// One instance is created at startup and shared by `Arc` with every session
/// task.
pub struct SessionCore {
    store: Arc<dyn BitStore>,
    registry: Arc<ConnectionRegistry>,
    broadcaster: Broadcaster,
    checkbox_count: u32,
}

impl SessionCore {
    pub fn new(
        store: Arc<dyn BitStore>,
        registry: Arc<ConnectionRegistry>,
        checkbox_count: u32,
    ) -> Self {
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        Self {
            store,
            registry,
            broadcaster,
            checkbox_count,
        }
    }

    /// Builds the core from the relevant [`ServerConfig`] fields.
    pub fn from_config(
        store: Arc<dyn BitStore>,
        registry: Arc<ConnectionRegistry>,
        config: &ServerConfig,
    ) -> Self {
        Self::new(store, registry, config.checkbox_count)
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Replays the current state to a newly registered connection.
    ///
    /// Only checked boxes are sent; unchecked is every client's default, so
    /// the payload is proportional to the number of checked boxes.  Returns
    /// the number of frames queued.  Frames use the handle's current format.
    ///
    /// # Errors
    ///
    /// [`EnqueueError::Closed`] if the client went away mid-sync.
    pub async fn initial_sync(
        &self,
        id: ConnectionId,
        handle: &ConnectionHandle,
    ) -> Result<usize, EnqueueError> {
        let format = handle.format();
        let mut sent = 0;

        for index in 0..self.checkbox_count {
            match self.store.get(index).await {
                Ok(true) => {
                    handle
                        .enqueue(OutboundFrame::state(StateChange::checked(index), format))
                        .await?;
                    sent += 1;
                }
                Ok(false) => {}
                Err(e) => warn!("session {id}: initial sync read of index {index} failed: {e}"),
            }
        }

        debug!("session {id}: initial sync sent {sent} checked boxes");
        Ok(sent)
    }

    /// Processes one inbound event from connection `id`.
    ///
    /// Returns the reply for the sender, if any.  Replies are never broadcast.
    pub async fn handle_event(&self, id: ConnectionId, event: InboundEvent) -> Option<OutboundFrame> {
        match self.within_grid(event) {
            InboundEvent::BinarySet(change) | InboundEvent::TextSet(change) => {
                self.apply(id, change).await;
                None
            }

            InboundEvent::Query { index, wire } => match self.store.get(index).await {
                Ok(checked) => Some(OutboundFrame::state(StateChange::new(index, checked), wire)),
                Err(e) => {
                    warn!("session {id}: read of index {index} failed: {e}");
                    None
                }
            },

            InboundEvent::Ignored { wire, command } => {
                debug!("session {id}: ignoring {wire} command {command}");
                None
            }

            InboundEvent::Malformed {
                wire: WireFormat::Text,
                reason,
            } => {
                warn!("session {id}: text message rejected: {reason}");
                Some(OutboundFrame::rejection(&reason))
            }

            InboundEvent::Malformed {
                wire: WireFormat::Binary,
                reason,
            } => {
                warn!("session {id}: binary message rejected: {reason}");
                None
            }
        }
    }

    /// Turns a SET or GET outside `[0, checkbox_count)` into a malformed event.
    fn within_grid(&self, event: InboundEvent) -> InboundEvent {
        match event.target_index() {
            Some(index) if index >= self.checkbox_count => InboundEvent::Malformed {
                wire: event.wire(),
                reason: MalformedReason::IndexOutOfRange {
                    index,
                    limit: self.checkbox_count,
                },
            },
            _ => event,
        }
    }

    /// Writes `change` to the store, then broadcasts it to everyone else.
    async fn apply(&self, id: ConnectionId, change: StateChange) {
        debug!(
            "session {id}: updating index {} -> {}",
            change.index, change.checked
        );

        if let Err(e) = self.store.set(change.index, change.checked).await {
            warn!(
                "session {id}: store write of index {} failed, broadcasting anyway: {e}",
                change.index
            );
        }

        self.broadcaster.broadcast(id, change);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
