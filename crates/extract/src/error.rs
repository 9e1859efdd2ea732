//! Extraction Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An extraction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input is not a markup document at all.
    #[display("malformed HTML: {_0}")]
    MalformedHtml(#[error(not(source))] &'static str),
    /// The document parsed, but carries no preview image.
    #[display("no preview image found in document")]
    MissingImage,
    /// The data URI has no comma separating metadata from payload.
    #[display("invalid data URI: missing payload separator")]
    InvalidDataUri,
    /// The payload contains a `%` not followed by two hex digits.
    #[display("invalid percent-encoding at byte {position}")]
    PercentEncoding {
        /// Byte offset of the offending `%` within the payload.
        position: usize,
    },
    /// The unescaped payload is not valid (standard alphabet, padded) base64.
    #[display("invalid base64 payload")]
    Base64,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // The same document or reference will fail the same way every time.
        false
    }
}
