//! Error types for the Hybridchat wire format.

use thiserror::Error;

/// Errors that can occur while framing or decoding protocol payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    // Framing errors
    /// Buffer is shorter than the length prefix
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Expected minimum size in bytes
        expected: usize,
        /// Actual size received
        actual: usize,
    },

    /// Payload exceeds maximum allowed size
    #[error("payload too large: {size} bytes exceeds maximum {max}")]
    PayloadTooLarge {
        /// Actual payload size
        size: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// Length prefix claims more data than available
    #[error("frame truncated: prefix claims {expected} payload bytes, but only {actual} available")]
    FrameTruncated {
        /// Payload size from the prefix
        expected: usize,
        /// Actual bytes available
        actual: usize,
    },

    // JSON errors (wrapped for testability)
    /// Failed to encode a payload as JSON
    #[error("failed to encode JSON: {0}")]
    JsonEncode(String),

    /// Failed to decode a JSON payload
    #[error("failed to decode JSON: {0}")]
    JsonDecode(String),

    // Validation errors
    /// Timestamp field is not a non-negative integer
    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    /// Content shape does not agree with the `encrypted` flag
    #[error("content mismatch: {0}")]
    ContentMismatch(&'static str),
}

/// Convenient Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
