//! Application layer for checkbox-server.
//!
//! Holds everything that decides *what happens* to a client message, without
//! knowing how bytes reach the socket or how bits reach Redis:
//!
//! - [`store`]: the [`BitStore`] trait the persistence backends implement.
//! - [`registry`]: the set of currently connected clients.
//! - [`broadcast`]: fan-out of one state change to every other client.
//! - [`session`]: the per-connection sequencing contract (initial sync, then
//!   store-write-and-broadcast for every SET).

pub mod broadcast;
pub mod registry;
pub mod session;
pub mod store;

pub use broadcast::{BroadcastReport, Broadcaster};
pub use registry::{ConnectionHandle, ConnectionRegistry, EnqueueError, Registration};
pub use session::SessionCore;
pub use store::{BitStore, StoreError};
