mod consts;
pub mod error;
mod filename;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod models;
mod resolve;
mod tags;

use std::path::Path;
use tracing::instrument;

use crate::error::Result;
pub use crate::filename::{explain_filename, parse_filename};
use crate::models::{RawMetadata, ResolvedMetadata, TagReading};
pub use crate::models::{TagStatus, normalize};
pub use crate::resolve::resolve;
pub use crate::tags::read_tags;

/// Both readings of one file and their reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub tags: TagReading,
    pub filename: RawMetadata,
    pub resolved: ResolvedMetadata,
}

/// Easy, top-level entrypoint: read the tags of `file`, parse its
/// `relative` path (the name as it sits under its import root), and resolve
/// the two.
///
/// Blocking; call it from a blocking-capable context.
#[instrument(level = "debug", skip(file), fields(path = %relative.display()))]
pub fn extract(file: &Path, relative: &Path) -> Result<Extraction> {
    let tags = read_tags(file)?;
    let filename = parse_filename(relative);
    let resolved = resolve(&tags.metadata, &filename);
    Ok(Extraction {
        tags,
        filename,
        resolved,
    })
}
