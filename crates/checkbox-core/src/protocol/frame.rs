//! Binary codec for the fixed-size checkbox command frame.
//!
//! Wire format:
//! ```text
//! [command:1][index:3][checked:1]
//! ```
//! Total frame size: 5 bytes.  The index is a big-endian 24-bit unsigned
//! integer (byte 1 holds bits 23–16, byte 2 bits 15–8, byte 3 bits 7–0).
//!
//! # Index range
//!
//! Only 24 bits are available on the wire.  [`encode_frame`] clamps any larger
//! index to [`MAX_INDEX`] instead of failing, so encoding is total.  Distinct
//! out-of-range indices therefore collapse onto the same slot; callers that
//! need more than 16 777 216 checkboxes must widen the format.

use thiserror::Error;

/// Total size of one frame in bytes.
pub const FRAME_SIZE: usize = 5;

/// Largest index that fits in the 24-bit index field.
pub const MAX_INDEX: u32 = 0x00FF_FFFF;

/// Errors that can occur while decoding a frame.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The input is not exactly [`FRAME_SIZE`] bytes long.
    #[error("invalid frame size: expected {expected} bytes, got {actual}")]
    BadLength { expected: usize, actual: usize },

    /// The command byte is not a recognized value.
    #[error("invalid command byte: 0x{0:02X}")]
    BadCommand(u8),
}

/// Command byte values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Set the checkbox at `index` to `checked`.
    Set = 0x01,
    /// Query the checkbox at `index`.
    Get = 0x02,
    /// Error notification.
    Error = 0x03,
}

impl TryFrom<u8> for Command {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, FrameError> {
        match value {
            0x01 => Ok(Command::Set),
            0x02 => Ok(Command::Get),
            0x03 => Ok(Command::Error),
            other => Err(FrameError::BadCommand(other)),
        }
    }
}

/// A decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frame {
    pub command: Command,
    pub index: u32,
    pub checked: bool,
}

impl Frame {
    /// Creates a frame; no clamping happens until the frame is encoded.
    pub fn new(command: Command, index: u32, checked: bool) -> Self {
        Self {
            command,
            index,
            checked,
        }
    }

    /// Encodes this frame.  See [`encode_frame`].
    pub fn encode(&self) -> [u8; FRAME_SIZE] {
        encode_frame(self.command, self.index, self.checked)
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes one command into a 5-byte frame.
///
/// Indices above [`MAX_INDEX`] are clamped to `MAX_INDEX`.
///
/// # Examples
///
/// ```rust
/// use checkbox_core::protocol::frame::{encode_frame, Command};
///
/// let bytes = encode_frame(Command::Set, 0x01_02_03, true);
/// assert_eq!(bytes, [0x01, 0x01, 0x02, 0x03, 0x01]);
/// ```
pub fn encode_frame(command: Command, index: u32, checked: bool) -> [u8; FRAME_SIZE] {
    let index = index.min(MAX_INDEX);
    let [_, high, mid, low] = index.to_be_bytes();
    [command as u8, high, mid, low, u8::from(checked)]
}

/// Decodes one frame from `bytes`.
///
/// `checked` is `true` only when the last byte is exactly `0x01`; every other
/// value decodes as `false`.
///
/// # Errors
///
/// - [`FrameError::BadLength`] if `bytes` is not exactly [`FRAME_SIZE`] long.
/// - [`FrameError::BadCommand`] if the command byte is not SET, GET or ERROR.
///
/// # Examples
///
/// ```rust
/// use checkbox_core::protocol::frame::{decode_frame, Command};
///
/// let frame = decode_frame(&[0x01, 0x00, 0x00, 0x07, 0x01]).unwrap();
/// assert_eq!(frame.command, Command::Set);
/// assert_eq!(frame.index, 7);
/// assert!(frame.checked);
/// ```
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, FrameError> {
    let bytes: &[u8; FRAME_SIZE] = bytes.try_into().map_err(|_| FrameError::BadLength {
        expected: FRAME_SIZE,
        actual: bytes.len(),
    })?;

    let command = Command::try_from(bytes[0])?;
    let index = u32::from_be_bytes([0, bytes[1], bytes[2], bytes[3]]);
    let checked = bytes[4] == 0x01;

    Ok(Frame {
        command,
        index,
        checked,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_set_packs_index_big_endian() {
        let bytes = encode_frame(Command::Set, 0x00AB_CDEF, true);
        assert_eq!(bytes, [0x01, 0xAB, 0xCD, 0xEF, 0x01]);
    }

    #[test]
    fn test_encode_unchecked_writes_zero_byte() {
        let bytes = encode_frame(Command::Get, 3, false);
        assert_eq!(bytes, [0x02, 0x00, 0x00, 0x03, 0x00]);
    }

    #[test]
    fn test_encode_clamps_index_above_24_bits() {
        // Arrange / Act
        let bytes = encode_frame(Command::Set, 0x0100_0000, true);

        // Assert: clamped, not wrapped to zero
        assert_eq!(&bytes[1..4], &[0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_encode_clamps_u32_max() {
        let bytes = encode_frame(Command::Error, u32::MAX, false);
        assert_eq!(bytes, [0x03, 0xFF, 0xFF, 0xFF, 0x00]);
    }

    #[test]
    fn test_decode_rejects_short_input() {
        let err = decode_frame(&[0x01, 0x00, 0x00, 0x01]).unwrap_err();
        assert_eq!(
            err,
            FrameError::BadLength {
                expected: 5,
                actual: 4
            }
        );
    }

    #[test]
    fn test_decode_rejects_unknown_command() {
        let err = decode_frame(&[0x99, 0x00, 0x00, 0x00, 0x01]).unwrap_err();
        assert_eq!(err, FrameError::BadCommand(0x99));
    }

    #[test]
    fn test_decode_rejects_zero_command() {
        let err = decode_frame(&[0x00, 0x00, 0x00, 0x00, 0x01]).unwrap_err();
        assert_eq!(err, FrameError::BadCommand(0x00));
    }

    #[test]
    fn test_decode_checked_only_for_exact_one() {
        for last in [0x00u8, 0x02, 0x10, 0x80, 0xFF] {
            let frame = decode_frame(&[0x01, 0, 0, 0, last]).unwrap();
            assert!(!frame.checked, "byte 0x{last:02X} must decode as unchecked");
        }
        assert!(decode_frame(&[0x01, 0, 0, 0, 0x01]).unwrap().checked);
    }

    #[test]
    fn test_decode_max_index() {
        let frame = decode_frame(&[0x02, 0xFF, 0xFF, 0xFF, 0x00]).unwrap();
        assert_eq!(frame.command, Command::Get);
        assert_eq!(frame.index, MAX_INDEX);
    }

    #[test]
    fn test_frame_encode_matches_free_function() {
        let frame = Frame::new(Command::Set, 42, true);
        assert_eq!(frame.encode(), encode_frame(Command::Set, 42, true));
    }

    #[test]
    fn test_bad_length_error_message() {
        let err = decode_frame(&[]).unwrap_err();
        assert_eq!(err.to_string(), "invalid frame size: expected 5 bytes, got 0");
    }
}
