//! Error types for Synheart Stream

use thiserror::Error;

/// Errors that can occur while decoding frames or deriving signals.
///
/// None of these are fatal to a session: the offending frame is dropped and
/// processing continues with the next notification.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("{kind} frame too short: need {needed} bytes, got {actual}")]
    FrameTooShort {
        kind: &'static str,
        needed: usize,
        actual: usize,
    },

    #[error("Read of {length} bytes at offset {offset} exceeds buffer of {len} bytes")]
    OutOfBounds {
        offset: usize,
        length: usize,
        len: usize,
    },

    #[error("Invalid integer width: {0} bytes (expected 1-8)")]
    InvalidWidth(usize),

    #[error("Unsupported {kind} frame type: 0x{frame_type:02x}")]
    UnsupportedFrameType { kind: &'static str, frame_type: u8 },

    #[error("Unknown characteristic: {0}")]
    UnknownCharacteristic(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to parse notification record: {0}")]
    Parse(String),
}
