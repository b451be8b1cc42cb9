use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_EXTENSIONS: [&str; 8] = ["m4b", "mp3", "m4a", "aac", "ogg", "flac", "wma", "opus"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub library: LibraryConfig,
    pub scan: ScanConfig,
    pub catalog: CatalogConfig,
}

/// A configured filesystem root to scan for audiobooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportPath {
    pub path: PathBuf,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}
impl ImportPath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), enabled: true }
    }
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub import_paths: Vec<ImportPath>,
    /// Lowercase extensions without the leading dot (normalized on load).
    pub supported_extensions: Vec<String>,
    /// Glob patterns matched against the full path of each discovered file.
    pub exclude_patterns: Vec<String>,
}
impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            import_paths: Vec::new(),
            supported_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            exclude_patterns: Vec::new(),
        }
    }
}
impl LibraryConfig {
    pub fn enabled_import_paths(&self) -> impl Iterator<Item = &ImportPath> {
        self.import_paths.iter().filter(|i| i.enabled)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Upper bound on files being read and hashed at the same time.
    pub max_concurrent_files: usize,
    /// Stop dispatching new files once a scan has been running this long.
    pub deadline_secs: Option<u64>,
    /// Relative duration difference above which same-key editions get a
    /// possible mismatch advisory.
    pub mismatch_tolerance: f64,
}
impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_concurrent_files: 4,
            deadline_secs: None,
            mismatch_tolerance: 0.05,
        }
    }
}
impl ScanConfig {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// SQLite database file. Empty means the platform data directory.
    pub database: PathBuf,
    pub purge_soft_deleted_after_days: u32,
}
impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::new(),
            purge_soft_deleted_after_days: 30,
        }
    }
}
