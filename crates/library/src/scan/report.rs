use crate::group::{Grouping, MismatchAdvisory};
use crate::write::{GroupOutcome, GroupWrite};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// How far a scan got before it stopped dispatching files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Completion {
    Complete,
    /// Cancelled by the caller. Files already in flight were finished,
    /// grouped and written.
    Cancelled,
    /// The overall scan deadline passed. Same partial semantics as
    /// cancellation.
    DeadlineExceeded,
}
impl Completion {
    pub fn is_partial(&self) -> bool {
        !matches!(self, Self::Complete)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScanCounts {
    /// Files handed to a worker.
    pub files_seen: usize,
    /// Files with resolved metadata and a fingerprint.
    pub resolved: usize,
    pub skipped_unreadable: usize,
    pub fingerprint_io_errors: usize,
    pub exact_duplicates_found: usize,
    /// One per skipped file, duplicates of a blocked file included.
    pub blocked_skipped: usize,
    pub groups_created: usize,
    pub groups_updated: usize,
    pub groups_failed: usize,
    pub possible_mismatches: usize,
    pub discovery_errors: usize,
    /// Resolved records missing a title or author.
    pub incomplete: usize,
    pub versions_inserted: usize,
    pub versions_updated: usize,
    /// Workers that panicked; their file is unaccounted for.
    pub task_failures: usize,
}

/// Everything a scan did, for the operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    pub completion: Completion,
    /// Nothing was committed to the catalog.
    pub dry_run: bool,
    #[serde(with = "seconds")]
    pub elapsed: Duration,
    pub counts: ScanCounts,
    pub advisories: Vec<MismatchAdvisory>,
    /// Per-group outcome, in group key order.
    pub groups: Vec<GroupWrite>,
    pub unreadable: Vec<PathBuf>,
    pub unhashable: Vec<PathBuf>,
    pub incomplete: Vec<PathBuf>,
}

/// What the dispatch loop gathered before grouping.
#[derive(Debug, Default)]
pub(crate) struct Collected {
    pub(crate) files_seen: usize,
    pub(crate) resolved: usize,
    pub(crate) discovery_errors: usize,
    pub(crate) task_failures: usize,
    pub(crate) unreadable: Vec<PathBuf>,
    pub(crate) unhashable: Vec<PathBuf>,
}

impl ScanReport {
    pub(crate) fn new(
        completion: Completion,
        dry_run: bool,
        elapsed: Duration,
        mut collected: Collected,
        grouping: Grouping,
        writes: Vec<GroupWrite>,
    ) -> Self {
        collected.unreadable.sort();
        collected.unhashable.sort();
        let mut counts = ScanCounts {
            files_seen: collected.files_seen,
            resolved: collected.resolved,
            skipped_unreadable: collected.unreadable.len(),
            fingerprint_io_errors: collected.unhashable.len(),
            exact_duplicates_found: grouping.groups.iter().map(|g| g.duplicates()).sum(),
            possible_mismatches: grouping.advisories.len(),
            discovery_errors: collected.discovery_errors,
            incomplete: grouping.incomplete.len(),
            task_failures: collected.task_failures,
            ..ScanCounts::default()
        };
        for write in &writes {
            counts.blocked_skipped += write.blocked;
            match &write.outcome {
                GroupOutcome::Created(_) => counts.groups_created += 1,
                GroupOutcome::Updated(_) => counts.groups_updated += 1,
                GroupOutcome::Failed { .. } => counts.groups_failed += 1,
                GroupOutcome::Blocked => {},
            }
            if let Some(written) = write.outcome.written() {
                counts.versions_inserted += written.inserted;
                counts.versions_updated += written.updated;
            }
        }
        Self {
            completion,
            dry_run,
            elapsed,
            counts,
            advisories: grouping.advisories,
            groups: writes,
            unreadable: collected.unreadable,
            unhashable: collected.unhashable,
            incomplete: grouping.incomplete,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &GroupWrite> {
        self.groups.iter().filter(|g| g.outcome.is_failure())
    }
}

mod seconds {
    use serde::Serializer;
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }
}
