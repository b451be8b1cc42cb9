//! Import path discovery.
//!
//! An [`ImportSource`] turns the configured import roots into a lazy stream
//! of candidate audio files. Each call to [`discover`](ImportSource::discover)
//! starts a fresh walk, so the same source can be re-used for every scan.

use crate::error::{ErrorKind, Result};
use crate::filter::FileFilter;
use crate::models::DiscoveredFile;
use crate::path::relative_to;
use async_stream::stream;
use futures::Stream;
use shelf_config::ImportPath;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs::{self, DirEntry};

pub type DiscoveryStream<'a> = Pin<Box<dyn Stream<Item = Result<DiscoveredFile>> + Send + 'a>>;

enum WalkEntry {
    File(DiscoveredFile),
    Descend(PathBuf),
    Skip,
}

/// Anything that can enumerate files to scan.
pub trait ImportSource: Send + Sync {
    /// Stream every candidate file under every enabled root.
    ///
    /// Errors for individual directories or entries are yielded in-line and
    /// the walk carries on; the stream only ends once every root has been
    /// walked.
    fn discover<'a>(&'a self) -> DiscoveryStream<'a>;

    /// The roots this source walks.
    fn roots(&self) -> Vec<PathBuf>;
}

/// Walks enabled import roots on the local filesystem.
///
/// # Examples
///
/// ```no_run
/// use futures::TryStreamExt;
/// use shelf_config::ImportPath;
/// use shelf_storage::{FileFilter, ImportSource, LocalSource};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let filter = FileFilter::new(["m4b", "mp3"], ["**/samples/**"]).unwrap();
/// let source = LocalSource::new([ImportPath::new("/srv/audiobooks")], filter);
/// let mut files = source.discover();
/// while let Ok(Some(file)) = files.try_next().await {
///     println!("{}", file.absolute().display());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LocalSource {
    roots: Vec<PathBuf>,
    filter: FileFilter,
}
impl LocalSource {
    /// Only enabled import paths are kept; disabled ones are never walked.
    pub fn new(import_paths: impl IntoIterator<Item = ImportPath>, filter: FileFilter) -> Self {
        let roots = import_paths.into_iter().filter(|i| i.enabled).map(|i| i.path).collect();
        Self { roots, filter }
    }

    async fn process_entry(&self, root: &Path, entry: DirEntry) -> Result<WalkEntry> {
        let path = entry.path();
        let file_type = entry.file_type().await.map_err(|e| ErrorKind::from_io(e, &path))?;
        if file_type.is_dir() {
            return Ok(WalkEntry::Descend(path));
        }
        // Follows symlinks to files; symlinked directories are not descended
        // into (no loop detection needed).
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            // Broken symlink.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(WalkEntry::Skip),
            Err(e) => exn::bail!(ErrorKind::from_io(e, &path)),
        };
        if !metadata.is_file() || !self.filter.accepts(&path) {
            return Ok(WalkEntry::Skip);
        }
        let relative = relative_to(root, &path)?;
        Ok(WalkEntry::File(DiscoveredFile::new(root, relative, metadata.len())))
    }
}

impl ImportSource for LocalSource {
    fn discover<'a>(&'a self) -> DiscoveryStream<'a> {
        Box::pin(stream! {
            for root in &self.roots {
                if !fs::try_exists(root).await.unwrap_or(false) {
                    tracing::warn!(root = %root.display(), "Import path does not exist; skipping");
                    continue;
                }
                let mut stack = vec![root.clone()];
                'dirs: while let Some(current) = stack.pop() {
                    let mut entries = match fs::read_dir(&current).await {
                        Ok(entries) => entries,
                        // Removed between being listed and being walked.
                        Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                        Err(err) => {
                            yield Err(exn::Exn::from(ErrorKind::from_io(err, &current)));
                            continue 'dirs;
                        }
                    };
                    'entries: loop {
                        let entry = match entries.next_entry().await {
                            Ok(Some(entry)) => entry,
                            Ok(None) => break 'entries,
                            Err(e) => { yield Err(exn::Exn::from(ErrorKind::from_io(e, &current))); continue 'dirs; },
                        };
                        match self.process_entry(root, entry).await {
                            Ok(WalkEntry::File(f)) => yield Ok(f),
                            Ok(WalkEntry::Descend(d)) => stack.push(d),
                            Ok(WalkEntry::Skip) => {},
                            Err(e) => yield Err(e),
                        };
                    }
                }
            }
        })
    }

    fn roots(&self) -> Vec<PathBuf> {
        self.roots.clone()
    }
}
