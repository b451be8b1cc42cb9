//! Single-file diagnostics: everything the scanner would learn about one
//! file, without running a scan or touching the catalog.

use crate::error::{ErrorKind, Result};
use crate::models::GroupKey;
use exn::ResultExt;
use serde::Serialize;
use shelf_extract::models::{RawMetadata, ResolvedMetadata, StreamInfo, TagStatus};
use shelf_extract::{explain_filename, read_tags, resolve};
use shelf_storage::{fingerprint, relative_to};
use std::path::{Path, PathBuf};
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inspection {
    pub path: PathBuf,
    /// The name the filename parser was given: relative to the import root
    /// the file sits under, or the full path if it's under none.
    pub parsed_as: PathBuf,
    pub tag_status: TagStatus,
    pub tags: RawMetadata,
    pub filename: RawMetadata,
    /// Which filename rule matched, if any.
    pub filename_rule: Option<&'static str>,
    pub resolved: ResolvedMetadata,
    pub stream: StreamInfo,
    pub fingerprint: String,
    pub size: u64,
    /// `None` if the file would be reported as incomplete.
    pub group_key: Option<GroupKey>,
}

/// Inspect the file at `path` (absolute), parsing its name relative to the
/// innermost of `roots` that contains it.
pub async fn inspect(path: impl Into<PathBuf>, roots: &[PathBuf]) -> Result<Inspection> {
    let path = path.into();
    let roots = roots.to_vec();
    tokio::task::spawn_blocking(move || inspect_blocking(&path, &roots))
        .await
        .or_raise(|| ErrorKind::Extract)?
}

#[instrument(level = "debug", skip(roots), fields(path = %path.display()))]
fn inspect_blocking(path: &Path, roots: &[PathBuf]) -> Result<Inspection> {
    let parsed_as = roots
        .iter()
        .filter_map(|root| relative_to(root, path).ok())
        .min_by_key(|relative| relative.components().count())
        .unwrap_or_else(|| path.to_path_buf());
    let tags = read_tags(path).or_raise(|| ErrorKind::Extract)?;
    let (filename, filename_rule) = explain_filename(&parsed_as);
    let resolved = resolve(&tags.metadata, &filename);
    let fingerprint = fingerprint(path).or_raise(|| ErrorKind::Storage)?;
    Ok(Inspection {
        path: path.to_path_buf(),
        parsed_as,
        tag_status: tags.status,
        group_key: GroupKey::new(&resolved),
        tags: tags.metadata,
        filename,
        filename_rule,
        resolved,
        stream: tags.stream,
        size: fingerprint.length,
        fingerprint: fingerprint.digest,
    })
}
