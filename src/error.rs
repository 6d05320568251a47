//! Error types for the validation engine.
//!
//! Checks never return errors: anything a check detects becomes a message on
//! the [`ErrorBundle`](crate::bundle::ErrorBundle). The variants here cover
//! only environmental failures that prevent validation from completing at
//! all, which callers must treat separately from the structured report.

use thiserror::Error;

/// Errors that can occur while preparing or reading a package.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The archive container could not be opened or read.
    #[error("could not read archive: {reason}")]
    UnopenableArchive {
        /// Description of the underlying failure.
        reason: String,
    },

    /// A requested entry does not exist in the archive.
    #[error("archive entry {path} not found")]
    MissingEntry {
        /// The `/`-separated in-archive path.
        path: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The structured report could not be serialized.
    #[error("report serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type alias using [`ValidationError`].
pub type Result<T> = std::result::Result<T, ValidationError>;
