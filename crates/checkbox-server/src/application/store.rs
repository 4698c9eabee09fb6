//! The bit-addressable store seam.
//!
//! The application layer only needs three things from persistence: read one
//! bit, write one bit, and check the backend is alive.  Infrastructure
//! implementations live in `crate::infrastructure::store`; tests use either
//! the in-memory backend or a `mockall` mock of this trait.
//!
//! # Default-unchecked
//!
//! An index that has never been written reads as `false`.  Implementations
//! must not surface "absent" as an error; initial sync relies on it to send
//! only the checked boxes to a new client.

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by a [`BitStore`] backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached (connect or ping failed).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The backend was reached but the operation failed.
    #[error("store operation failed: {0}")]
    Backend(String),
}

/// One bit of persistent state per checkbox index.
///
/// Point writes are atomic with respect to each other: concurrent writers
/// never corrupt neighbouring bits.  Writes to the same index are
/// last-write-wins.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BitStore: Send + Sync {
    /// Writes the bit at `index`.
    async fn set(&self, index: u32, value: bool) -> Result<(), StoreError>;

    /// Reads the bit at `index`; never-written indices read `false`.
    async fn get(&self, index: u32) -> Result<bool, StoreError>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Materializes `[0, count)` by repeated point reads.
    ///
    /// Stops at the first failing read and returns its error.
    async fn get_range(&self, count: u32) -> Result<Vec<bool>, StoreError> {
        let mut bits = Vec::with_capacity(count as usize);
        for index in 0..count {
            bits.push(self.get(index).await?);
        }
        Ok(bits)
    }
}
