//! The catalog writer: the only part of the engine that mutates the
//! catalog.
//!
//! Each version group is written in its own transaction while holding that
//! work's lock. A failure rolls back that group alone; the rest of the batch
//! carries on.

pub(crate) mod error;
mod locks;

use self::error::{ErrorKind, Result};
use self::locks::WorkLocks;
use crate::group::VersionGroup;
use crate::models::{GroupKey, ScannedFile};
use exn::{OptionExt, ResultExt};
use serde::Serialize;
use shelf_catalog::models::{Upsert, VersionFields, VersionGroupId, WorkId};
use shelf_catalog::{Store, Transaction};
use std::sync::Arc;
use tracing::instrument;

/// What was written for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Written {
    pub work: WorkId,
    pub version_group: VersionGroupId,
    pub inserted: usize,
    pub updated: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "status")]
pub enum GroupOutcome {
    /// The work had no active versions; the group got a fresh identity.
    Created(Written),
    /// Merged into a version group already in the catalog.
    Updated(Written),
    /// Every member's fingerprint is blocked. Nothing was created.
    Blocked,
    /// Rolled back.
    Failed { reason: String },
}
impl GroupOutcome {
    pub fn written(&self) -> Option<&Written> {
        match self {
            Self::Created(written) | Self::Updated(written) => Some(written),
            Self::Blocked | Self::Failed { .. } => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupWrite {
    pub key: GroupKey,
    pub members: usize,
    /// Members skipped because their fingerprint is blocked, duplicates
    /// included.
    pub blocked: usize,
    pub outcome: GroupOutcome,
}

/// Writes version groups through a [`Store`].
///
/// Clones share the same work locks, so concurrent scans writing through
/// clones of one writer never interleave writes to the same work.
#[derive(Clone)]
pub struct CatalogWriter {
    store: Arc<dyn Store>,
    locks: WorkLocks,
}

impl CatalogWriter {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            locks: WorkLocks::default(),
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Write every group in order, each in its own transaction.
    pub async fn write_all(&self, groups: &[VersionGroup], dry_run: bool) -> Vec<GroupWrite> {
        let mut writes = Vec::with_capacity(groups.len());
        for group in groups {
            writes.push(self.write_group(group, dry_run).await);
        }
        writes
    }

    /// Write one group atomically.
    ///
    /// In a dry run the transaction is rolled back instead of committed, so
    /// the outcome is exactly what a real run would report.
    #[instrument(level = "debug", skip_all, fields(group = %group.key, members = group.members.len()))]
    pub async fn write_group(&self, group: &VersionGroup, dry_run: bool) -> GroupWrite {
        let _lock = self.locks.lock(&group.key.seed()).await;
        let mut blocked = 0;
        let outcome = match self.write_group_inner(group, dry_run, &mut blocked).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(group = %group.key, error = ?err, "Group write failed; rolled back");
                GroupOutcome::Failed {
                    reason: (*err).to_string(),
                }
            },
        };
        GroupWrite {
            key: group.key.clone(),
            members: group.members.len(),
            blocked,
            outcome,
        }
    }

    async fn write_group_inner(&self, group: &VersionGroup, dry_run: bool, blocked: &mut usize) -> Result<GroupOutcome> {
        let mut tx = self.store.begin().await.or_raise(|| ErrorKind::Begin)?;

        // Checked before anything is created, so a fully blocked group leaves
        // no trace in the catalog.
        let mut writable: Vec<&ScannedFile> = Vec::new();
        for member in &group.members {
            let fingerprint = &member.file.fingerprint;
            if tx.is_fingerprint_blocked(&fingerprint.digest).await.or_raise(|| ErrorKind::Blocklist)? {
                tracing::warn!(path = %member.file.path.display(), fingerprint = fingerprint.short(), "Fingerprint is blocked; skipping");
                *blocked += 1;
            } else if member.class.is_unique() {
                writable.push(&member.file);
            }
        }
        if writable.is_empty() {
            return Ok(GroupOutcome::Blocked);
        }

        let primary = &group.primary().file;
        let title = primary.metadata.title.as_deref().ok_or_raise(|| ErrorKind::Unidentifiable)?;
        let author = primary.metadata.author.as_deref().ok_or_raise(|| ErrorKind::Unidentifiable)?;
        let series = primary
            .metadata
            .series
            .as_deref()
            .or_else(|| writable.iter().find_map(|file| file.metadata.series.as_deref()));

        let author = tx.get_or_create_author(author).await.or_raise(|| ErrorKind::Author)?;
        let series = match series {
            Some(name) => Some(tx.get_or_create_series(name).await.or_raise(|| ErrorKind::Series)?),
            None => None,
        };
        let work = tx
            .get_or_create_work(author, title, series, group.key.position)
            .await
            .or_raise(|| ErrorKind::Work)?;
        let (version_group, inherited) = match tx.version_group_for_work(work).await.or_raise(|| ErrorKind::VersionGroup)? {
            Some(existing) => (existing, true),
            None => (VersionGroupId::derive(&group.key.seed()), false),
        };

        let mut written = Written {
            work,
            version_group,
            inserted: 0,
            updated: 0,
        };
        for file in writable {
            let fields = version_fields(work, &written.version_group, file);
            match upsert(tx.as_mut(), &fields).await? {
                Upsert::Inserted(id) => {
                    tracing::debug!(path = %file.path.display(), version = %id, "Inserted version");
                    written.inserted += 1;
                },
                Upsert::Updated(id) => {
                    tracing::debug!(path = %file.path.display(), version = %id, "Updated version in place");
                    written.updated += 1;
                },
            }
        }

        if dry_run {
            drop(tx);
        } else {
            tx.commit().await.or_raise(|| ErrorKind::Commit)?;
        }
        Ok(if inherited {
            GroupOutcome::Updated(written)
        } else {
            GroupOutcome::Created(written)
        })
    }
}

async fn upsert(tx: &mut dyn Transaction, fields: &VersionFields) -> Result<Upsert> {
    tx.upsert_audiobook_version(fields)
        .await
        .or_raise(|| ErrorKind::Upsert(fields.file_path.clone()))
}

fn version_fields(work: WorkId, version_group: &VersionGroupId, file: &ScannedFile) -> VersionFields {
    let metadata = &file.metadata;
    VersionFields {
        work_id: work,
        version_group_id: version_group.clone(),
        file_path: file.path.clone(),
        fingerprint: file.fingerprint.clone(),
        title: metadata.title.clone().unwrap_or_default(),
        narrator: metadata.narrator.clone(),
        format: metadata.format.clone(),
        duration: metadata.duration,
        stream: file.stream.clone(),
        provenance: metadata.provenance.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::group;
    use crate::group::tests::scanned;
    use shelf_catalog::MemoryStore;

    fn writer() -> (MemoryStore, CatalogWriter) {
        let store = MemoryStore::new();
        (store.clone(), CatalogWriter::new(Arc::new(store)))
    }

    async fn block(store: &MemoryStore, fingerprint: &str) {
        let mut tx = store.begin().await.unwrap();
        tx.block_fingerprint(fingerprint, Some("test")).await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_new_group_creates_entities() {
        let (store, writer) = writer();
        let grouping = group(
            vec![
                scanned("/lib/a.mp3", "Title", "Smith", 100, "a"),
                scanned("/lib/b.mp3", "Title", "Smith", 100, "b"),
                scanned("/lib/c.mp3", "Title", "Smith", 100, "a"),
            ],
            0.05,
        );
        let write = writer.write_group(&grouping.groups[0], false).await;
        let GroupOutcome::Created(written) = &write.outcome else {
            panic!("expected a new group, got {:?}", write.outcome);
        };
        assert_eq!(written.inserted, 2);
        assert_eq!(written.updated, 0);
        assert_eq!(written.version_group, VersionGroupId::derive(&grouping.groups[0].key.seed()));
        let stats = store.stats().await.unwrap();
        assert_eq!((stats.authors, stats.works, stats.active_versions), (1, 1, 2));
    }

    #[tokio::test]
    async fn test_rewriting_updates_in_place() {
        let (store, writer) = writer();
        let grouping = group(vec![scanned("/lib/a.mp3", "Title", "Smith", 100, "a")], 0.05);
        let first = writer.write_group(&grouping.groups[0], false).await;
        let second = writer.write_group(&grouping.groups[0], false).await;
        let GroupOutcome::Updated(written) = &second.outcome else {
            panic!("expected an update, got {:?}", second.outcome);
        };
        assert_eq!((written.inserted, written.updated), (0, 1));
        assert_eq!(first.outcome.written().unwrap().version_group, written.version_group);
        let stats = store.stats().await.unwrap();
        assert_eq!((stats.authors, stats.works, stats.active_versions), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_new_edition_inherits_group_identity() {
        let (store, writer) = writer();
        let first = group(vec![scanned("/lib/a.mp3", "Title", "Smith", 100, "a")], 0.05);
        let created = writer.write_group(&first.groups[0], false).await;
        let second = group(vec![scanned("/other/b.m4b", "TITLE", "smith", 100, "b")], 0.05);
        let merged = writer.write_group(&second.groups[0], false).await;
        let GroupOutcome::Updated(written) = &merged.outcome else {
            panic!("expected a merge, got {:?}", merged.outcome);
        };
        assert_eq!(written.inserted, 1);
        assert_eq!(created.outcome.written().unwrap().version_group, written.version_group);
        let versions = store.list_versions().await.unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].fields.version_group_id, versions[1].fields.version_group_id);
    }

    #[tokio::test]
    async fn test_blocked_fingerprints_are_skipped() {
        let (store, writer) = writer();
        block(&store, "a").await;
        let grouping = group(
            vec![
                scanned("/lib/a.mp3", "Title", "Smith", 100, "a"),
                scanned("/lib/a-copy.mp3", "Title", "Smith", 100, "a"),
                scanned("/lib/b.mp3", "Title", "Smith", 100, "b"),
            ],
            0.05,
        );
        let write = writer.write_group(&grouping.groups[0], false).await;
        assert_eq!(write.blocked, 2);
        assert_eq!(write.outcome.written().unwrap().inserted, 1);
        let versions = store.list_versions().await.unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].fields.fingerprint.digest, "b");
    }

    #[tokio::test]
    async fn test_fully_blocked_group_creates_nothing() {
        let (store, writer) = writer();
        block(&store, "a").await;
        let grouping = group(vec![scanned("/lib/a.mp3", "Title", "Smith", 100, "a")], 0.05);
        let write = writer.write_group(&grouping.groups[0], false).await;
        assert_eq!(write.outcome, GroupOutcome::Blocked);
        assert_eq!(write.blocked, 1);
        let stats = store.stats().await.unwrap();
        assert_eq!((stats.authors, stats.works, stats.active_versions), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_failure_rolls_back_only_that_group() {
        let (store, writer) = writer();
        store.fail_upsert("/lib/b.mp3");
        let grouping = group(
            vec![
                scanned("/lib/a.mp3", "Broken", "Jones", 100, "a"),
                scanned("/lib/b.mp3", "Broken", "Jones", 100, "b"),
                scanned("/lib/c.mp3", "Fine", "Smith", 100, "c"),
            ],
            0.05,
        );
        let writes = writer.write_all(&grouping.groups, false).await;
        assert_eq!(writes.len(), 2);
        let broken = writes.iter().find(|w| w.key.title == "broken").unwrap();
        assert!(
            matches!(&broken.outcome, GroupOutcome::Failed { reason } if reason.contains("/lib/b.mp3")),
            "{:?}",
            broken.outcome
        );
        let fine = writes.iter().find(|w| w.key.title == "fine").unwrap();
        assert!(matches!(fine.outcome, GroupOutcome::Created(_)));
        // Neither the author nor the first version of the failed group survived.
        let stats = store.stats().await.unwrap();
        assert_eq!((stats.authors, stats.works, stats.active_versions), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_dry_run_leaves_catalog_untouched() {
        let (store, writer) = writer();
        let grouping = group(vec![scanned("/lib/a.mp3", "Title", "Smith", 100, "a")], 0.05);
        let write = writer.write_group(&grouping.groups[0], true).await;
        assert_eq!(write.outcome.written().unwrap().inserted, 1);
        assert_eq!(store.stats().await.unwrap(), Default::default());
    }

    #[tokio::test]
    async fn test_series_comes_from_any_member() {
        let (store, writer) = writer();
        let mut with_series = scanned("/lib/b.mp3", "Title", "Smith", 100, "b");
        with_series.metadata.series = Some("Foo".to_string());
        let grouping = group(vec![scanned("/lib/a.mp3", "Title", "Smith", 100, "a"), with_series], 0.05);
        writer.write_group(&grouping.groups[0], false).await;
        let works = store.list_works().await.unwrap();
        assert!(works[0].series_id.is_some());
        assert_eq!(store.stats().await.unwrap().series, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_share_work_locks() {
        let (store, writer) = writer();
        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..8 {
            let writer = writer.clone();
            tasks.spawn(async move {
                let file = scanned(&format!("/lib/{i}.mp3"), "Title", "Smith", 100, &i.to_string());
                let grouping = group(vec![file], 0.05);
                writer.write_group(&grouping.groups[0], false).await
            });
        }
        let writes = tasks.join_all().await;
        let created = writes.iter().filter(|w| matches!(w.outcome, GroupOutcome::Created(_))).count();
        assert_eq!(created, 1);
        let versions = store.list_versions().await.unwrap();
        assert_eq!(versions.len(), 8);
        assert!(versions.iter().all(|v| v.fields.version_group_id == versions[0].fields.version_group_id));
    }
}
