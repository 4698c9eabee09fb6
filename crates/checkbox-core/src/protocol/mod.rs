//! Protocol module containing the binary frame codec, the JSON control
//! messages, and the inbound/outbound event types built on top of them.

pub mod event;
pub mod frame;
pub mod text;

pub use event::{InboundEvent, MalformedReason, OutboundFrame, WireFormat};
pub use frame::{decode_frame, encode_frame, Command, Frame, FrameError, FRAME_SIZE, MAX_INDEX};
pub use text::{decode_text, TextError, TextMessage};
