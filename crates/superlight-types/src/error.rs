//! Error types for data parsing in superlight-types.

use thiserror::Error;

/// Errors that can occur when parsing Superlight wire data.
///
/// This error type is platform-agnostic and does not include
/// BLE-specific errors (those belong in superlight-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Command frame is not exactly the expected length.
    #[error("malformed frame: expected {expected} bytes, got {actual}")]
    MalformedFrame {
        /// Expected frame size.
        expected: usize,
        /// Actual frame size received.
        actual: usize,
    },
}

/// Result type alias using superlight-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
