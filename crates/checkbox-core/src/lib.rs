//! # checkbox-core
//!
//! Shared library for the checkbox grid server containing the wire codecs and
//! the small set of domain types every other crate speaks.
//!
//! It has zero dependencies on sockets, async runtimes, or storage backends.
//!
//! # Architecture overview
//!
//! The server keeps one boolean per checkbox index and fans every change out
//! to all connected clients.  This crate defines what a change *is* and how it
//! travels over the wire:
//!
//! - **`domain`** – The checkbox index space and [`StateChange`], the single
//!   event type that store writes and broadcasts carry.
//!
//! - **`protocol`** – The two wire formats.  The compact 5-byte binary frame
//!   (`[command:1][index:3][checked:1]`) and the legacy JSON control messages
//!   (`{"cmd":"SET","index":7,"value":"true"}`).  Both are decoded into one
//!   [`InboundEvent`] sum type so the server has a single state-change path.

pub mod domain;
pub mod protocol;

pub use domain::checkbox::{StateChange, DEFAULT_CHECKBOX_COUNT};
pub use protocol::event::{InboundEvent, MalformedReason, OutboundFrame, WireFormat};
pub use protocol::frame::{decode_frame, encode_frame, Command, Frame, FrameError, FRAME_SIZE, MAX_INDEX};
pub use protocol::text::{decode_text, TextError, TextMessage};
