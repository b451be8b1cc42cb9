//! Configuration Error Types
//!
//! Every variant here is fatal to whatever was about to use the
//! configuration: a scan with a broken configuration never starts.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq)]
pub enum ErrorKind {
    /// The config file extension isn't one of the supported formats.
    #[display("unsupported config file format: {}", _0.display())]
    UnsupportedFormat(#[error(not(source))] PathBuf),
    /// A config layer failed to parse, or a value had the wrong type.
    #[display("could not load configuration")]
    Load,
    /// No platform directories could be determined for default paths.
    #[display("could not determine default directories for this platform")]
    NoHomeDirectory,
    /// A value parsed fine but isn't allowed.
    #[display("invalid value for '{field}': {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Configuration is either valid or it isn't.
        false
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid { field, reason: reason.into() }
    }
}
