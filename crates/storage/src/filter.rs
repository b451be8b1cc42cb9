//! Which discovered files are worth scanning.

use crate::error::{ErrorKind, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Restricts discovery to supported audio extensions and drops anything
/// matching an exclude pattern.
///
/// Extensions are compared case-insensitively and without the leading dot.
/// Exclude patterns are globs matched against the full (absolute) path, so
/// `**/samples/**` excludes every `samples` directory in every root.
#[derive(Debug, Clone)]
pub struct FileFilter {
    extensions: Vec<String>,
    excludes: GlobSet,
}
impl FileFilter {
    pub fn new(
        extensions: impl IntoIterator<Item = impl AsRef<str>>,
        exclude_patterns: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Result<Self> {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        let mut builder = GlobSetBuilder::new();
        for pattern in exclude_patterns {
            let pattern = pattern.as_ref();
            let glob = GlobBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| ErrorKind::InvalidPattern(format!("{pattern}: {e}")))?;
            builder.add(glob);
        }
        let excludes = builder.build().map_err(|e| ErrorKind::InvalidPattern(e.to_string()))?;
        Ok(Self { extensions, excludes })
    }

    pub fn has_supported_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        self.excludes.is_match(path)
    }

    pub fn accepts(&self, path: &Path) -> bool {
        self.has_supported_extension(path) && !self.is_excluded(path)
    }
}
