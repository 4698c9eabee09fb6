//! Fan-out of one state change to every other connected client.
//!
//! The broadcaster takes a registry snapshot and *tries* to enqueue the change
//! on every other connection's outbound queue, encoded in the format that
//! connection speaks.  Each format is encoded at most once per broadcast:
//!
//! ```text
//! sender ── StateChange ──► Broadcaster ──try_send──► queue B ──► writer B ──► client B
//!                                        ├─try_send──► queue C ──► writer C ──► client C
//!                                        └─(skip sender)
//! ```
//!
//! `try_send` never waits, so a slow or stalled recipient can never hold up
//! the sending session.  A full queue drops the frame for that recipient
//! only; a closed queue means the recipient is already tearing down.  Both
//! are logged and counted, and delivery continues to everyone else.  There is
//! no retry.
//!
//! Connections registered after the snapshot is taken do not receive this
//! broadcast; they get the current state from their own initial sync.

use std::sync::Arc;

use checkbox_core::{OutboundFrame, StateChange, WireFormat};
use tracing::{debug, warn};

use crate::application::registry::{ConnectionRegistry, EnqueueError};
use crate::domain::ConnectionId;

/// Outcome of one [`Broadcaster::broadcast`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Recipients whose queue accepted the frame.
    pub delivered: usize,
    /// Recipients skipped because their queue was full.
    pub dropped: usize,
    /// Recipients whose queue was already closed.
    pub closed: usize,
}

/// Pushes state changes to all registered connections except the origin.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Sends `change` to every registered connection except `sender`.
    pub fn broadcast(&self, sender: ConnectionId, change: StateChange) -> BroadcastReport {
        let mut binary: Option<OutboundFrame> = None;
        let mut text: Option<OutboundFrame> = None;
        let mut report = BroadcastReport::default();

        for (id, handle) in self.registry.snapshot() {
            if id == sender {
                continue;
            }
            let format = handle.format();
            let slot = match format {
                WireFormat::Binary => &mut binary,
                WireFormat::Text => &mut text,
            };
            let frame = slot.get_or_insert_with(|| OutboundFrame::state(change, format));
            match handle.try_enqueue(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(EnqueueError::Full) => {
                    warn!(
                        "broadcast from {sender}: queue for {id} is full, dropping index {}",
                        change.index
                    );
                    report.dropped += 1;
                }
                Err(EnqueueError::Closed) => {
                    debug!("broadcast from {sender}: {id} already closed");
                    report.closed += 1;
                }
            }
        }

        debug!(
            "broadcast from {sender}: index {} -> {} (delivered={}, dropped={}, closed={})",
            change.index, change.checked, report.delivered, report.dropped, report.closed
        );
        report
    }
}
