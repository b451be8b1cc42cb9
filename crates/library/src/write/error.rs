//! Error types for the [`write`](super) module.
//!
//! Each variant names the step of a group's transaction that failed; the
//! store error that caused it is kept as a child in the error tree.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A group write error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for group writes.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("could not start a catalog transaction")]
    Begin,
    #[display("blocklist lookup failed")]
    Blocklist,
    #[display("group has no member with both a title and an author")]
    Unidentifiable,
    #[display("could not get or create author")]
    Author,
    #[display("could not get or create series")]
    Series,
    #[display("could not get or create work")]
    Work,
    #[display("could not look up the work's version group")]
    VersionGroup,
    #[display("could not write version for {}", _0.display())]
    Upsert(#[error(not(source))] PathBuf),
    #[display("could not commit catalog transaction")]
    Commit,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Unidentifiable)
    }
}
