//! Inbound and outbound events at the transport edge.
//!
//! The server accepts two wire variants for the same operation.  Rather than
//! branching on the wire format throughout the session loop, each raw message
//! is turned into an [`InboundEvent`] by one of two adapters:
//!
//! ```text
//! binary message ──► InboundEvent::from_binary ─┐
//!                                               ├─► InboundEvent ──► store + broadcast
//! text message   ──► InboundEvent::from_text  ──┘
//! ```
//!
//! Going the other way, [`OutboundFrame`] is what a writer task puts on the
//! socket, rendered in the configured [`WireFormat`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::checkbox::StateChange;
use crate::protocol::frame::{decode_frame, encode_frame, Command, FrameError, FRAME_SIZE};
use crate::protocol::text::{
    decode_text, TextMessage, CMD_GET, CMD_SET, INDEX_OUT_OF_RANGE_REPLY, INVALID_JSON_REPLY,
};

// ── Wire format ───────────────────────────────────────────────────────────────

/// Which of the two wire variants a message used (or should use).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// 5-byte binary frames.
    #[default]
    Binary,
    /// JSON control messages.
    Text,
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireFormat::Binary => f.write_str("binary"),
            WireFormat::Text => f.write_str("text"),
        }
    }
}

impl FromStr for WireFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binary" => Ok(WireFormat::Binary),
            "text" | "json" => Ok(WireFormat::Text),
            other => Err(format!("unknown wire format '{other}' (expected 'binary' or 'text')")),
        }
    }
}

// ── Inbound ───────────────────────────────────────────────────────────────────

/// Why an inbound message could not be turned into a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    /// The binary frame failed to decode.
    Frame(FrameError),
    /// The text payload was not a valid control message.
    Text(String),
    /// A text SET or GET arrived without an `index` field.
    MissingIndex,
    /// A SET or GET named a box at or beyond the grid size.
    IndexOutOfRange { index: u32, limit: u32 },
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::Frame(e) => write!(f, "{e}"),
            MalformedReason::Text(e) => f.write_str(e),
            MalformedReason::MissingIndex => f.write_str("missing index"),
            MalformedReason::IndexOutOfRange { index, limit } => {
                write!(f, "index {index} out of range (grid has {limit} boxes)")
            }
        }
    }
}

/// One decoded client message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A SET command received as a binary frame.
    BinarySet(StateChange),
    /// A SET command received as a JSON control message.
    TextSet(StateChange),
    /// A point read of one checkbox.
    Query { index: u32, wire: WireFormat },
    /// A well-formed message the server has nothing to do for
    /// (binary ERROR frames, unknown text commands).
    Ignored { wire: WireFormat, command: String },
    /// A message that failed to decode.
    Malformed {
        wire: WireFormat,
        reason: MalformedReason,
    },
}

impl InboundEvent {
    /// Adapter for binary WebSocket messages.
    pub fn from_binary(bytes: &[u8]) -> Self {
        match decode_frame(bytes) {
            Ok(frame) => match frame.command {
                Command::Set => InboundEvent::BinarySet(StateChange::new(frame.index, frame.checked)),
                Command::Get => InboundEvent::Query {
                    index: frame.index,
                    wire: WireFormat::Binary,
                },
                Command::Error => InboundEvent::Ignored {
                    wire: WireFormat::Binary,
                    command: "ERROR".to_string(),
                },
            },
            Err(e) => InboundEvent::Malformed {
                wire: WireFormat::Binary,
                reason: MalformedReason::Frame(e),
            },
        }
    }

    /// Adapter for text WebSocket messages.
    pub fn from_text(text: &str) -> Self {
        let msg = match decode_text(text) {
            Ok(m) => m,
            Err(e) => {
                return InboundEvent::Malformed {
                    wire: WireFormat::Text,
                    reason: MalformedReason::Text(e.to_string()),
                }
            }
        };

        match (msg.cmd.as_str(), msg.index) {
            (CMD_SET, Some(index)) => {
                InboundEvent::TextSet(StateChange::new(index, msg.is_checked()))
            }
            (CMD_GET, Some(index)) => InboundEvent::Query {
                index,
                wire: WireFormat::Text,
            },
            (CMD_SET | CMD_GET, None) => InboundEvent::Malformed {
                wire: WireFormat::Text,
                reason: MalformedReason::MissingIndex,
            },
            (other, _) => InboundEvent::Ignored {
                wire: WireFormat::Text,
                command: other.to_string(),
            },
        }
    }

    /// Returns the state change carried by either SET variant.
    pub fn state_change(&self) -> Option<StateChange> {
        match self {
            InboundEvent::BinarySet(change) | InboundEvent::TextSet(change) => Some(*change),
            _ => None,
        }
    }

    /// Returns the checkbox index a SET or GET addresses.
    pub fn target_index(&self) -> Option<u32> {
        match self {
            InboundEvent::BinarySet(change) | InboundEvent::TextSet(change) => Some(change.index),
            InboundEvent::Query { index, .. } => Some(*index),
            InboundEvent::Ignored { .. } | InboundEvent::Malformed { .. } => None,
        }
    }

    /// Returns the wire variant this event arrived on.
    pub fn wire(&self) -> WireFormat {
        match self {
            InboundEvent::BinarySet(_) => WireFormat::Binary,
            InboundEvent::TextSet(_) => WireFormat::Text,
            InboundEvent::Query { wire, .. }
            | InboundEvent::Ignored { wire, .. }
            | InboundEvent::Malformed { wire, .. } => *wire,
        }
    }
}

// ── Outbound ──────────────────────────────────────────────────────────────────

/// A message ready to be written to a client socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Binary([u8; FRAME_SIZE]),
    Text(String),
}

impl OutboundFrame {
    /// Renders a SET for `change` in `format`.
    pub fn state(change: StateChange, format: WireFormat) -> Self {
        match format {
            WireFormat::Binary => {
                OutboundFrame::Binary(encode_frame(Command::Set, change.index, change.checked))
            }
            WireFormat::Text => OutboundFrame::Text(TextMessage::set(change).to_json()),
        }
    }

    /// The reply sent to a client whose text message did not parse.
    pub fn invalid_json() -> Self {
        OutboundFrame::Text(TextMessage::invalid_json().to_json())
    }

    /// The ERROR reply for a rejected text message.
    pub fn rejection(reason: &MalformedReason) -> Self {
        let text = match reason {
            MalformedReason::IndexOutOfRange { .. } => INDEX_OUT_OF_RANGE_REPLY,
            _ => INVALID_JSON_REPLY,
        };
        OutboundFrame::Text(TextMessage::error(text).to_json())
    }
}
