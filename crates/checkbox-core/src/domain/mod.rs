//! Domain layer: the checkbox index space and the state-change event.
//!
//! Nothing in here performs I/O.  Both the wire codecs and the server's store
//! and broadcast paths are expressed in terms of these types.

pub mod checkbox;

pub use checkbox::{StateChange, DEFAULT_CHECKBOX_COUNT};
