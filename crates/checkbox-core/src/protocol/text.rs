//! JSON control messages for the legacy text protocol.
//!
//! Browsers that predate the binary frame speak a small JSON dialect:
//!
//! ```json
//! {"cmd":"SET","index":7,"value":"true"}
//! {"cmd":"GET","index":7}
//! {"cmd":"ERROR","value":"Invalid JSON format"}
//! {"cmd":"ERROR","value":"Index out of range"}
//! ```
//!
//! `value` is a *string*.  Only the exact string `"true"` means checked.

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::checkbox::StateChange;

/// Command string for a state change.
pub const CMD_SET: &str = "SET";
/// Command string for a point read.
pub const CMD_GET: &str = "GET";
/// Command string for an error reply.
pub const CMD_ERROR: &str = "ERROR";

/// Reply text sent back when a text frame cannot be parsed.
pub const INVALID_JSON_REPLY: &str = "Invalid JSON format";

/// Reply text sent back when a SET or GET names a box outside the grid.
pub const INDEX_OUT_OF_RANGE_REPLY: &str = "Index out of range";

/// Errors that can occur while decoding a text control message.
#[derive(Debug, Error)]
pub enum TextError {
    /// The payload is not a JSON object with the expected field types.
    #[error("invalid JSON control message: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// One JSON control message, in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TextMessage {
    /// Command name, e.g. `"SET"`.
    pub cmd: String,

    #[serde(default)]
    pub index: Option<u32>,

    /// `"true"` / `"false"` for SET, free text for ERROR.
    #[serde(default)]
    pub value: Option<String>,
}

impl TextMessage {
    /// Builds a SET message for `change`.
    pub fn set(change: StateChange) -> Self {
        Self {
            cmd: CMD_SET.to_string(),
            index: Some(change.index),
            value: Some(if change.checked { "true" } else { "false" }.to_string()),
        }
    }

    /// Builds an ERROR reply carrying `reason`.
    pub fn error(reason: &str) -> Self {
        Self {
            cmd: CMD_ERROR.to_string(),
            index: None,
            value: Some(reason.to_string()),
        }
    }

    /// Builds the error reply for unparseable input.
    pub fn invalid_json() -> Self {
        Self::error(INVALID_JSON_REPLY)
    }

    /// Returns `true` when `value` is exactly `"true"`.
    pub fn is_checked(&self) -> bool {
        self.value.as_deref() == Some("true")
    }

    /// Renders this message as JSON text, omitting absent fields.
    pub fn to_json(&self) -> String {
        let mut object = Map::new();
        object.insert("cmd".to_string(), Value::from(self.cmd.as_str()));
        if let Some(index) = self.index {
            object.insert("index".to_string(), Value::from(index));
        }
        if let Some(value) = &self.value {
            object.insert("value".to_string(), Value::from(value.as_str()));
        }
        Value::Object(object).to_string()
    }
}

/// Parses one text control message.
///
/// # Errors
///
/// Returns [`TextError::InvalidJson`] if `text` is not valid JSON or a field
/// has the wrong type (for example a negative `index`).
pub fn decode_text(text: &str) -> Result<TextMessage, TextError> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_set_message() {
        let msg = decode_text(r#"{"cmd":"SET","index":7,"value":"true"}"#).unwrap();
        assert_eq!(msg.cmd, "SET");
        assert_eq!(msg.index, Some(7));
        assert!(msg.is_checked());
    }

    #[test]
    fn test_value_other_than_true_is_unchecked() {
        for value in ["false", "TRUE", "1", ""] {
            let json = format!(r#"{{"cmd":"SET","index":1,"value":"{value}"}}"#);
            let msg = decode_text(&json).unwrap();
            assert!(!msg.is_checked(), "value {value:?} must be unchecked");
        }
    }

    #[test]
    fn test_missing_value_is_unchecked() {
        let msg = decode_text(r#"{"cmd":"SET","index":1}"#).unwrap();
        assert!(!msg.is_checked());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_text("not json").is_err());
    }

    #[test]
    fn test_decode_rejects_negative_index() {
        assert!(decode_text(r#"{"cmd":"SET","index":-1,"value":"true"}"#).is_err());
    }

    #[test]
    fn test_decode_rejects_missing_cmd() {
        assert!(decode_text(r#"{"index":1,"value":"true"}"#).is_err());
    }

    #[test]
    fn test_set_serializes_like_browser_client() {
        let json = TextMessage::set(StateChange::checked(7)).to_json();
        assert_eq!(json, r#"{"cmd":"SET","index":7,"value":"true"}"#);
    }

    #[test]
    fn test_invalid_json_reply_omits_index() {
        let json = TextMessage::invalid_json().to_json();
        assert_eq!(json, r#"{"cmd":"ERROR","value":"Invalid JSON format"}"#);
    }

    #[test]
    fn test_error_reply_round_trips_through_decoder() {
        let json = TextMessage::error(INDEX_OUT_OF_RANGE_REPLY).to_json();
        let msg = decode_text(&json).unwrap();
        assert_eq!(msg.cmd, CMD_ERROR);
        assert_eq!(msg.index, None);
        assert_eq!(msg.value.as_deref(), Some("Index out of range"));
    }

    #[test]
    fn test_to_json_escapes_free_text() {
        let json = TextMessage::error("bad \"quote\"").to_json();
        assert_eq!(json, r#"{"cmd":"ERROR","value":"bad \"quote\""}"#);
    }
}
