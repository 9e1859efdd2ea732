//! Resolution Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Every kind carries the link, URL or
//! identifier it is about, so the error alone is enough to log or report.

use derive_more::{Display, Error};

/// A resolution error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for resolution operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The link has no final path segment usable as a file name.
    #[display("invalid link: {_0}")]
    InvalidLink(#[error(not(source))] String),
    /// The HTTP client could not be constructed.
    #[display("could not build HTTP client")]
    Client,
    /// The remote resource could not be reached.
    #[display("request to {url} failed")]
    Fetch {
        #[error(not(source))]
        url: String,
    },
    /// The remote resource answered with a non-success status.
    #[display("request to {url} returned status {status}")]
    Status { url: String, status: u16 },
    /// The remote resource did not answer within the configured timeout.
    #[display("request to {url} timed out")]
    Timeout {
        #[error(not(source))]
        url: String,
    },
    /// The preview page could not be parsed.
    #[display("could not parse preview page {url}")]
    Parse {
        #[error(not(source))]
        url: String,
    },
    /// The preview page carries no preview image.
    #[display("no preview image found on {url}")]
    Extraction {
        #[error(not(source))]
        url: String,
    },
    /// The preview image reference is neither a URL nor an inline image.
    #[display("unsupported image reference on {url}: {reference}")]
    UnsupportedReference { url: String, reference: String },
    /// The inline image on the preview page could not be decoded.
    #[display("could not decode inline image on {url}")]
    Decode {
        #[error(not(source))]
        url: String,
    },
    /// Checking, reading or writing the store failed.
    #[display("storage failure for {identifier}")]
    Storage {
        #[error(not(source))]
        identifier: String,
    },
    /// The caller cancelled the resolution.
    #[display("resolution of {url} cancelled")]
    Cancelled {
        #[error(not(source))]
        url: String,
    },
    /// The image host rejected the upload or answered with garbage.
    #[display("could not upload {name}")]
    Upload {
        #[error(not(source))]
        name: String,
    },
}

impl ErrorKind {
    /// Returns `true` for failures reaching a remote resource (transport,
    /// status and timeout).
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Status { .. } | Self::Timeout { .. })
    }

    /// Returns `true` if retrying might succeed. Nothing in this crate
    /// retries on its own; this is for callers.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch { .. } | Self::Timeout { .. } | Self::Storage { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
