//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Per-file and per-group failures during a scan are not errors at this
//! level: they're recovered where they happen and show up in the
//! [`ScanReport`](crate::ScanReport). What surfaces here either stopped the
//! whole operation or was asked for directly by an operator.

use derive_more::{Display, Error};
use shelf_catalog::models::VersionId;

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The scan can't start with the configuration it was given. Nothing was
    /// attempted.
    #[display("configuration error: {_0}")]
    Configuration(#[error(not(source))] String),
    /// A catalog read or write failed.
    #[display("catalog operation failed")]
    Catalog,
    /// Tags could not be read for an inspected file.
    #[display("could not extract metadata")]
    Extract,
    /// An inspected file could not be read for fingerprinting.
    #[display("could not fingerprint file")]
    Storage,
    #[display("version {_0} does not exist")]
    VersionNotFound(#[error(not(source))] VersionId),
    #[display("version {_0} is already soft-deleted")]
    AlreadyDeleted(#[error(not(source))] VersionId),
    #[display("version {_0} is not soft-deleted")]
    NotDeleted(#[error(not(source))] VersionId),
    /// Restoring would leave two active versions with the same content under
    /// one work.
    #[display("version {restoring} duplicates active version {active}")]
    DuplicateActive { restoring: VersionId, active: VersionId },
    /// Not a 64-character hex digest.
    #[display("invalid fingerprint: {_0:?}")]
    InvalidFingerprint(#[error(not(source))] String),
    #[display("fingerprint {_0} is already blocked")]
    AlreadyBlocked(#[error(not(source))] String),
    #[display("fingerprint {_0} is not blocked")]
    NotBlocked(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Catalog | Self::Storage)
    }
}
