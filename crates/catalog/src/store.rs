//! The narrow capability the engine needs from persistent storage.

use crate::error::Result;
use crate::models::{
    AudiobookVersion, AuthorId, BlockedFingerprint, CatalogStats, SeriesId, Upsert, VersionFields, VersionGroupId,
    VersionId, Work, WorkId,
};
use async_trait::async_trait;
use shelf_extract::models::SeriesPosition;
use time::UtcDateTime;

/// A catalog backend.
///
/// All mutation happens through a [`Transaction`]: the writer opens one per
/// version group so that entity creation and version upserts for a group
/// land together or not at all.
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn Transaction>>;

    async fn find_version(&self, id: VersionId) -> Result<Option<AudiobookVersion>>;
    /// Every version, soft-deleted included, ordered by work then id.
    async fn list_versions(&self) -> Result<Vec<AudiobookVersion>>;
    async fn list_works(&self) -> Result<Vec<Work>>;
    async fn blocked_fingerprints(&self) -> Result<Vec<BlockedFingerprint>>;
    async fn stats(&self) -> Result<CatalogStats>;
}

/// One atomic unit of catalog writes.
///
/// Dropping a transaction without calling [`commit`](Transaction::commit)
/// discards everything it did.
#[async_trait]
pub trait Transaction: Send {
    /// Authors match case-insensitively (and ignoring runs of whitespace);
    /// the first spelling seen is kept.
    async fn get_or_create_author(&mut self, name: &str) -> Result<AuthorId>;

    async fn get_or_create_series(&mut self, name: &str) -> Result<SeriesId>;

    /// Works are keyed by (author, normalized title, position). A series
    /// given for an existing work without one is attached to it.
    async fn get_or_create_work(
        &mut self,
        author: AuthorId,
        title: &str,
        series: Option<SeriesId>,
        position: Option<SeriesPosition>,
    ) -> Result<WorkId>;

    /// The group identity carried by the work's active versions, if any.
    async fn version_group_for_work(&mut self, work: WorkId) -> Result<Option<VersionGroupId>>;

    /// The active version of `work` with this fingerprint digest.
    async fn find_active_version(&mut self, work: WorkId, fingerprint: &str) -> Result<Option<VersionId>>;

    /// Update the active version of the work with the same fingerprint in
    /// place, or insert a new one.
    async fn upsert_audiobook_version(&mut self, version: &VersionFields) -> Result<Upsert>;

    async fn is_fingerprint_blocked(&mut self, fingerprint: &str) -> Result<bool>;

    async fn find_version(&mut self, id: VersionId) -> Result<Option<AudiobookVersion>>;

    /// Returns `false` if there was no active version to delete.
    async fn soft_delete_version(&mut self, id: VersionId) -> Result<bool>;

    /// Returns `false` if there was no soft-deleted version to restore.
    async fn restore_version(&mut self, id: VersionId) -> Result<bool>;

    /// Returns `false` if the fingerprint was already blocked.
    async fn block_fingerprint(&mut self, fingerprint: &str, reason: Option<&str>) -> Result<bool>;

    /// Returns `false` if the fingerprint wasn't blocked.
    async fn unblock_fingerprint(&mut self, fingerprint: &str) -> Result<bool>;

    /// Permanently remove versions soft-deleted before `before`.
    async fn purge_soft_deleted(&mut self, before: UtcDateTime) -> Result<u64>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
