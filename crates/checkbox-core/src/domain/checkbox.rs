//! Checkbox index space and state-change events.
//!
//! A checkbox has no identity beyond its index and exactly one attribute:
//! whether it is checked.  Indices are plain `u32` values; the binary wire
//! format can only carry 24 of those bits (see [`crate::protocol::frame`]).

use serde::{Deserialize, Serialize};

/// Number of checkboxes in the grid when nothing else is configured.
///
/// The browser client renders a 10 x 10 grid.
pub const DEFAULT_CHECKBOX_COUNT: u32 = 100;

/// A single checkbox transition: "index `index` is now `checked`".
///
/// This is the only event that flows through the server's write path.  It is
/// produced by either wire adapter, written to the bit store, and re-encoded
/// for every other connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateChange {
    /// Zero-based checkbox index.
    pub index: u32,
    /// New state of the checkbox.
    pub checked: bool,
}

impl StateChange {
    /// Creates a new state change.
    pub fn new(index: u32, checked: bool) -> Self {
        Self { index, checked }
    }

    /// Shorthand for `StateChange::new(index, true)`.
    pub fn checked(index: u32) -> Self {
        Self::new(index, true)
    }

    /// Shorthand for `StateChange::new(index, false)`.
    pub fn unchecked(index: u32) -> Self {
        Self::new(index, false)
    }
}
