//! Scan orchestration.
//!
//! Files stream in from an [`ImportSource`] and are read, resolved and
//! fingerprinted on the blocking pool, at most `max_concurrent_files` at a
//! time. Once every dispatched file is done, the batch is grouped and handed
//! to the [`CatalogWriter`].

mod probe;
mod report;

pub use self::report::{Completion, ScanCounts, ScanReport};

use self::probe::{Probe, probe};
use self::report::Collected;
use crate::error::{ErrorKind, Result};
use crate::group::group;
use crate::models::ScannedFile;
use crate::write::CatalogWriter;
use exn::ResultExt;
use futures::StreamExt;
use shelf_config::{LibraryConfig, ScanConfig};
use shelf_storage::{FileFilter, ImportSource, LocalSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

#[derive(Debug, Clone, PartialEq)]
pub struct ScanOptions {
    pub max_concurrent_files: usize,
    /// Stop dispatching new files this long after the scan started.
    pub deadline: Option<Duration>,
    pub mismatch_tolerance: f64,
    /// Compute everything, commit nothing.
    pub dry_run: bool,
}
impl From<&ScanConfig> for ScanOptions {
    fn from(config: &ScanConfig) -> Self {
        Self {
            max_concurrent_files: config.max_concurrent_files,
            deadline: config.deadline(),
            mismatch_tolerance: config.mismatch_tolerance,
            dry_run: false,
        }
    }
}
impl Default for ScanOptions {
    fn default() -> Self {
        Self::from(&ScanConfig::default())
    }
}

/// The filesystem source described by the library configuration.
pub fn import_source(config: &LibraryConfig) -> Result<LocalSource> {
    let filter = FileFilter::new(&config.supported_extensions, &config.exclude_patterns)
        .or_raise(|| ErrorKind::Configuration("invalid library file filter".to_string()))?;
    Ok(LocalSource::new(config.enabled_import_paths().cloned(), filter))
}

/// Run one scan to completion, cancellation or deadline.
///
/// Only configuration problems fail the scan; everything that goes wrong
/// with individual files or groups is recovered and counted in the report.
#[instrument(skip_all, fields(dry_run = options.dry_run))]
pub async fn scan(
    source: &dyn ImportSource,
    writer: &CatalogWriter,
    options: &ScanOptions,
    cancel: &CancellationToken,
) -> Result<ScanReport> {
    let roots = source.roots();
    if roots.is_empty() {
        exn::bail!(ErrorKind::Configuration("no enabled import paths".to_string()));
    }
    if options.max_concurrent_files == 0 {
        exn::bail!(ErrorKind::Configuration("max_concurrent_files must be at least 1".to_string()));
    }
    let started = Instant::now();
    tracing::info!(roots = roots.len(), concurrency = options.max_concurrent_files, "Scan started");

    let (collected, files, completion) = collect(source, options, cancel, started).await;
    if completion.is_partial() {
        tracing::warn!(?completion, files = files.len(), "Scan stopped early; writing what was collected");
    }
    let grouping = group(files, options.mismatch_tolerance);
    for advisory in &grouping.advisories {
        tracing::info!(group = %advisory.key, reason = %advisory.reason, "Possible mismatch");
    }
    let writes = writer.write_all(&grouping.groups, options.dry_run).await;

    let report = ScanReport::new(completion, options.dry_run, started.elapsed(), collected, grouping, writes);
    let counts = &report.counts;
    tracing::info!(
        ?completion,
        files = counts.files_seen,
        resolved = counts.resolved,
        created = counts.groups_created,
        updated = counts.groups_updated,
        failed = counts.groups_failed,
        elapsed = ?report.elapsed,
        "Scan finished"
    );
    Ok(report)
}

/// The dispatch loop. Cancellation and the deadline are only ever checked
/// here: once a file is dispatched it runs to completion.
async fn collect(
    source: &dyn ImportSource,
    options: &ScanOptions,
    cancel: &CancellationToken,
    started: Instant,
) -> (Collected, Vec<ScannedFile>, Completion) {
    let deadline = options.deadline.map(|d| started + d);
    let semaphore = Arc::new(Semaphore::new(options.max_concurrent_files));
    let mut tasks: JoinSet<Probe> = JoinSet::new();
    let mut collected = Collected::default();
    let mut files = Vec::new();
    let mut completion = Completion::Complete;

    let mut discovered = source.discover();
    loop {
        if let Some(stopped) = stop_reason(cancel, deadline) {
            completion = stopped;
            break;
        }
        let Some(item) = discovered.next().await else {
            break;
        };
        let file = match item {
            Ok(file) => file,
            Err(err) => {
                tracing::warn!(error = ?err, "Discovery error; carrying on");
                collected.discovery_errors += 1;
                continue;
            },
        };
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                completion = Completion::Cancelled;
                break;
            },
            _ = deadline_passed(deadline) => {
                completion = Completion::DeadlineExceeded;
                break;
            },
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                // The semaphore is never closed.
                Err(_) => break,
            },
        };
        collected.files_seen += 1;
        tasks.spawn_blocking(move || {
            let _permit = permit;
            probe(&file)
        });
        while let Some(joined) = tasks.try_join_next() {
            record(&mut collected, &mut files, joined);
        }
    }
    while let Some(joined) = tasks.join_next().await {
        record(&mut collected, &mut files, joined);
    }
    (collected, files, completion)
}

fn stop_reason(cancel: &CancellationToken, deadline: Option<Instant>) -> Option<Completion> {
    if cancel.is_cancelled() {
        return Some(Completion::Cancelled);
    }
    match deadline {
        Some(deadline) if Instant::now() >= deadline => Some(Completion::DeadlineExceeded),
        _ => None,
    }
}

async fn deadline_passed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn record(collected: &mut Collected, files: &mut Vec<ScannedFile>, joined: std::result::Result<Probe, JoinError>) {
    match joined {
        Ok(Probe::Scanned(file)) => {
            collected.resolved += 1;
            files.push(*file);
        },
        Ok(Probe::Unreadable(path)) => collected.unreadable.push(path),
        Ok(Probe::Unhashable(path)) => collected.unhashable.push(path),
        Err(err) => {
            tracing::error!(error = %err, "File task failed");
            collected.task_failures += 1;
        },
    }
}
