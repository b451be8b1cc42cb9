use std::path::{Path, PathBuf};

/// A file found under one of the import roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Import root the file was found under (absolute)
    pub root: PathBuf,
    /// Path relative to `root`
    pub relative: PathBuf,
    /// File size in bytes at discovery time
    pub size: u64,
}
impl DiscoveredFile {
    pub fn new(root: impl Into<PathBuf>, relative: impl Into<PathBuf>, size: u64) -> Self {
        Self { root: root.into(), relative: relative.into(), size }
    }

    pub fn absolute(&self) -> PathBuf {
        self.root.join(&self.relative)
    }

    pub fn relative(&self) -> &Path {
        &self.relative
    }
}
