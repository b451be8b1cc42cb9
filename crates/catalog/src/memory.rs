//! An in-memory [`Store`] for tests.
//!
//! Transactions are serialized: [`Store::begin`] holds the whole catalog
//! until the transaction commits or is dropped. Writes go to a private copy
//! that only replaces the catalog on commit, so rollback is just dropping it.
//!
//! Failures can be injected to exercise the writer's per-group rollback.

use crate::error::{ErrorKind, Result};
use crate::models::{
    AudiobookVersion, AuthorId, BlockedFingerprint, CatalogStats, SeriesId, Upsert, VersionFields, VersionGroupId,
    VersionId, VersionState, Work, WorkId,
};
use crate::store::{Store, Transaction};
use async_trait::async_trait;
use shelf_extract::models::SeriesPosition;
use shelf_extract::normalize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as SyncMutex, PoisonError};
use time::UtcDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone)]
struct NamedRow<Id> {
    id: Id,
    key: String,
}

#[derive(Debug, Clone)]
struct WorkRow {
    work: Work,
    title_key: String,
}

#[derive(Debug, Clone, Default)]
struct Catalog {
    authors: Vec<NamedRow<AuthorId>>,
    series: Vec<NamedRow<SeriesId>>,
    works: Vec<WorkRow>,
    versions: BTreeMap<VersionId, AudiobookVersion>,
    blocked: BTreeMap<String, BlockedFingerprint>,
    last_id: i64,
}
impl Catalog {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

#[derive(Debug, Default)]
struct Failures {
    work_titles: HashSet<String>,
    upsert_paths: HashSet<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    catalog: Arc<Mutex<Catalog>>,
    failures: Arc<SyncMutex<Failures>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `get_or_create_work` fail for this (normalized) title.
    pub fn fail_work(&self, title: &str) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .work_titles
            .insert(normalize(title));
    }

    /// Make `upsert_audiobook_version` fail for a version at this path.
    pub fn fail_upsert(&self, path: impl Into<PathBuf>) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .upsert_paths
            .insert(path.into());
    }

    /// Stop injecting failures.
    pub fn heal(&self) {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        failures.work_titles.clear();
        failures.upsert_paths.clear();
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let guard = Arc::clone(&self.catalog).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            failures: Arc::clone(&self.failures),
        }))
    }

    async fn find_version(&self, id: VersionId) -> Result<Option<AudiobookVersion>> {
        Ok(self.catalog.lock().await.versions.get(&id).cloned())
    }

    async fn list_versions(&self) -> Result<Vec<AudiobookVersion>> {
        let catalog = self.catalog.lock().await;
        let mut versions: Vec<_> = catalog.versions.values().cloned().collect();
        versions.sort_by_key(|v| (v.fields.work_id, v.id));
        Ok(versions)
    }

    async fn list_works(&self) -> Result<Vec<Work>> {
        Ok(self.catalog.lock().await.works.iter().map(|row| row.work.clone()).collect())
    }

    async fn blocked_fingerprints(&self) -> Result<Vec<BlockedFingerprint>> {
        let catalog = self.catalog.lock().await;
        let mut blocked: Vec<_> = catalog.blocked.values().cloned().collect();
        blocked.sort_by(|a, b| (a.blocked_at, &a.fingerprint).cmp(&(b.blocked_at, &b.fingerprint)));
        Ok(blocked)
    }

    async fn stats(&self) -> Result<CatalogStats> {
        let catalog = self.catalog.lock().await;
        let count = |n: usize| n as u64;
        let active = catalog.versions.values().filter(|v| v.state.is_active()).count();
        Ok(CatalogStats {
            authors: count(catalog.authors.len()),
            series: count(catalog.series.len()),
            works: count(catalog.works.len()),
            active_versions: count(active),
            soft_deleted_versions: count(catalog.versions.len() - active),
            blocked_fingerprints: count(catalog.blocked.len()),
        })
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<Catalog>,
    working: Catalog,
    failures: Arc<SyncMutex<Failures>>,
}

impl MemoryTransaction {
    fn failures(&self) -> std::sync::MutexGuard<'_, Failures> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fails_upsert(&self, path: &Path) -> bool {
        self.failures().upsert_paths.contains(path)
    }

    fn transition(&mut self, id: VersionId, to: impl FnOnce(VersionState) -> Option<VersionState>) -> bool {
        let Some(version) = self.working.versions.get_mut(&id) else {
            return false;
        };
        match to(version.state) {
            Some(state) => {
                version.state = state;
                version.updated_at = UtcDateTime::now();
                true
            },
            None => false,
        }
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn get_or_create_author(&mut self, name: &str) -> Result<AuthorId> {
        let key = normalize(name);
        if let Some(row) = self.working.authors.iter().find(|row| row.key == key) {
            return Ok(row.id);
        }
        let id = AuthorId(self.working.next_id());
        self.working.authors.push(NamedRow { id, key });
        Ok(id)
    }

    async fn get_or_create_series(&mut self, name: &str) -> Result<SeriesId> {
        let key = normalize(name);
        if let Some(row) = self.working.series.iter().find(|row| row.key == key) {
            return Ok(row.id);
        }
        let id = SeriesId(self.working.next_id());
        self.working.series.push(NamedRow { id, key });
        Ok(id)
    }

    async fn get_or_create_work(
        &mut self,
        author: AuthorId,
        title: &str,
        series: Option<SeriesId>,
        position: Option<SeriesPosition>,
    ) -> Result<WorkId> {
        let title_key = normalize(title);
        if self.failures().work_titles.contains(&title_key) {
            exn::bail!(ErrorKind::Database);
        }
        let existing = self.working.works.iter_mut().find(|row| {
            row.work.author_id == author && row.title_key == title_key && row.work.series_position == position
        });
        if let Some(row) = existing {
            row.work.series_id = row.work.series_id.or(series);
            return Ok(row.work.id);
        }
        let id = WorkId(self.working.next_id());
        self.working.works.push(WorkRow {
            work: Work {
                id,
                author_id: author,
                title: title.trim().to_string(),
                series_id: series,
                series_position: position,
            },
            title_key,
        });
        Ok(id)
    }

    async fn version_group_for_work(&mut self, work: WorkId) -> Result<Option<VersionGroupId>> {
        Ok(self
            .working
            .versions
            .values()
            .find(|v| v.fields.work_id == work && v.state.is_active())
            .map(|v| v.fields.version_group_id.clone()))
    }

    async fn find_active_version(&mut self, work: WorkId, fingerprint: &str) -> Result<Option<VersionId>> {
        Ok(self
            .working
            .versions
            .values()
            .find(|v| v.fields.work_id == work && v.fields.fingerprint.digest == fingerprint && v.state.is_active())
            .map(|v| v.id))
    }

    async fn upsert_audiobook_version(&mut self, version: &VersionFields) -> Result<Upsert> {
        if self.fails_upsert(&version.file_path) {
            exn::bail!(ErrorKind::Database);
        }
        if !self.working.works.iter().any(|row| row.work.id == version.work_id) {
            // Mirrors the foreign key on the real schema.
            exn::bail!(ErrorKind::Database);
        }
        let now = UtcDateTime::now();
        if let Some(id) = self.find_active_version(version.work_id, &version.fingerprint.digest).await? {
            if let Some(existing) = self.working.versions.get_mut(&id) {
                let group = existing.fields.version_group_id.clone();
                existing.fields = VersionFields {
                    version_group_id: group,
                    ..version.clone()
                };
                existing.updated_at = now;
            }
            return Ok(Upsert::Updated(id));
        }
        let id = VersionId(self.working.next_id());
        self.working.versions.insert(
            id,
            AudiobookVersion {
                id,
                fields: version.clone(),
                state: VersionState::Active,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(Upsert::Inserted(id))
    }

    async fn is_fingerprint_blocked(&mut self, fingerprint: &str) -> Result<bool> {
        Ok(self.working.blocked.contains_key(fingerprint))
    }

    async fn find_version(&mut self, id: VersionId) -> Result<Option<AudiobookVersion>> {
        Ok(self.working.versions.get(&id).cloned())
    }

    async fn soft_delete_version(&mut self, id: VersionId) -> Result<bool> {
        let at = UtcDateTime::now();
        Ok(self.transition(id, |state| state.soft_delete(at)))
    }

    async fn restore_version(&mut self, id: VersionId) -> Result<bool> {
        Ok(self.transition(id, VersionState::restore))
    }

    async fn block_fingerprint(&mut self, fingerprint: &str, reason: Option<&str>) -> Result<bool> {
        if self.working.blocked.contains_key(fingerprint) {
            return Ok(false);
        }
        self.working.blocked.insert(
            fingerprint.to_string(),
            BlockedFingerprint {
                fingerprint: fingerprint.to_string(),
                reason: reason.map(str::to_string),
                blocked_at: UtcDateTime::now(),
            },
        );
        Ok(true)
    }

    async fn unblock_fingerprint(&mut self, fingerprint: &str) -> Result<bool> {
        Ok(self.working.blocked.remove(fingerprint).is_some())
    }

    async fn purge_soft_deleted(&mut self, before: UtcDateTime) -> Result<u64> {
        let count = self.working.versions.len();
        self.working
            .versions
            .retain(|_, v| v.state.deleted_at().is_none_or(|at| at >= before));
        Ok((count - self.working.versions.len()) as u64)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Self { mut guard, working, .. } = *self;
        *guard = working;
        Ok(())
    }
}
