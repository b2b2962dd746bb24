//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
///
/// Delivery never fails outward; these only surface when decoding frames.
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Input ended inside the length prefix
    #[error("frame length prefix is truncated")]
    TruncatedPrefix,

    /// Length prefix continues past the longest accepted varint
    #[error("frame length prefix exceeds {max} bytes")]
    PrefixTooLong { max: usize },

    /// Length prefix does not fit in a u64
    #[error("frame length prefix overflows u64")]
    PrefixOverflow,

    /// Declared length cannot be addressed on this platform
    #[error("frame length {length} does not fit in memory")]
    LengthOverflow { length: u64 },

    /// Input ended inside the message body
    #[error("frame body truncated: expected {expected} bytes, {available} available")]
    TruncatedBody { expected: usize, available: usize },

    /// Message body is not UTF-8
    #[error("frame body is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}
