//! Extraction Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An extraction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// A file without any embedded tags is not an error: see
/// [`TagStatus::NoEmbeddedMetadata`](crate::TagStatus::NoEmbeddedMetadata).
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The file is corrupt, truncated, or in a container format that can't
    /// be parsed. The file should be reported as unresolved and skipped.
    #[display("unreadable audio container: {}", _0.display())]
    UnreadableContainer(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Same bytes, same outcome.
        false
    }
}
