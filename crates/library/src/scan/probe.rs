use crate::models::ScannedFile;
use shelf_storage::{DiscoveredFile, fingerprint};
use std::path::PathBuf;
use tracing::instrument;

/// Outcome of reading and hashing one discovered file.
#[derive(Debug)]
pub(crate) enum Probe {
    Scanned(Box<ScannedFile>),
    /// Corrupt or unsupported container.
    Unreadable(PathBuf),
    /// Readable tags, but the bytes couldn't be hashed.
    Unhashable(PathBuf),
}

/// Read tags, parse the path, resolve, then fingerprint.
///
/// Blocking: runs on the blocking pool, one call per file. A file is only
/// ever reported as a whole, never with metadata but no fingerprint.
#[instrument(level = "debug", skip_all, fields(path = %file.relative.display()))]
pub(crate) fn probe(file: &DiscoveredFile) -> Probe {
    let path = file.absolute();
    let extraction = match shelf_extract::extract(&path, file.relative()) {
        Ok(extraction) => extraction,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = ?err, "Unreadable audio file; skipping");
            return Probe::Unreadable(path);
        },
    };
    let fingerprint = match fingerprint(&path) {
        Ok(fingerprint) => fingerprint,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = ?err, "Could not fingerprint file; skipping");
            return Probe::Unhashable(path);
        },
    };
    Probe::Scanned(Box::new(ScannedFile {
        path,
        metadata: extraction.resolved,
        stream: extraction.tags.stream,
        fingerprint,
    }))
}
