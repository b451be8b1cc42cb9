//! Operator-driven catalog maintenance: soft deletes, restores, the
//! blocklist, purging and statistics.
//!
//! Each operation runs in its own transaction; a rejected operation changes
//! nothing.

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use shelf_catalog::Store;
use shelf_catalog::models::{AudiobookVersion, BlockedFingerprint, CatalogStats, VersionId};
use time::{Duration, UtcDateTime};
use tracing::instrument;

const DIGEST_LENGTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deleted {
    pub version: VersionId,
    pub fingerprint: String,
    /// The fingerprint was newly added to the blocklist.
    pub blocked: bool,
}

/// Soft-delete an active version, optionally blocking its content from ever
/// being catalogued again.
#[instrument(skip(store))]
pub async fn delete_version(store: &dyn Store, id: VersionId, block: bool, reason: Option<&str>) -> Result<Deleted> {
    let mut tx = store.begin().await.or_raise(|| ErrorKind::Catalog)?;
    let version = tx
        .find_version(id)
        .await
        .or_raise(|| ErrorKind::Catalog)?
        .ok_or_raise(|| ErrorKind::VersionNotFound(id))?;
    if !tx.soft_delete_version(id).await.or_raise(|| ErrorKind::Catalog)? {
        exn::bail!(ErrorKind::AlreadyDeleted(id));
    }
    let fingerprint = version.fields.fingerprint.digest;
    let blocked = if block {
        tx.block_fingerprint(&fingerprint, reason).await.or_raise(|| ErrorKind::Catalog)?
    } else {
        false
    };
    tx.commit().await.or_raise(|| ErrorKind::Catalog)?;
    tracing::info!(version = %id, blocked, "Soft-deleted version");
    Ok(Deleted {
        version: id,
        fingerprint,
        blocked,
    })
}

/// Bring a soft-deleted version back, unless its work already has an active
/// version with the same content.
#[instrument(skip(store))]
pub async fn restore_version(store: &dyn Store, id: VersionId) -> Result<AudiobookVersion> {
    let mut tx = store.begin().await.or_raise(|| ErrorKind::Catalog)?;
    let version = tx
        .find_version(id)
        .await
        .or_raise(|| ErrorKind::Catalog)?
        .ok_or_raise(|| ErrorKind::VersionNotFound(id))?;
    if version.state.is_active() {
        exn::bail!(ErrorKind::NotDeleted(id));
    }
    let fields = &version.fields;
    let active = tx
        .find_active_version(fields.work_id, &fields.fingerprint.digest)
        .await
        .or_raise(|| ErrorKind::Catalog)?;
    if let Some(active) = active {
        exn::bail!(ErrorKind::DuplicateActive { restoring: id, active });
    }
    if tx.is_fingerprint_blocked(&fields.fingerprint.digest).await.or_raise(|| ErrorKind::Catalog)? {
        tracing::warn!(version = %id, fingerprint = fields.fingerprint.short(), "Restoring a version whose fingerprint is blocked");
    }
    if !tx.restore_version(id).await.or_raise(|| ErrorKind::Catalog)? {
        exn::bail!(ErrorKind::NotDeleted(id));
    }
    let restored = tx
        .find_version(id)
        .await
        .or_raise(|| ErrorKind::Catalog)?
        .ok_or_raise(|| ErrorKind::VersionNotFound(id))?;
    tx.commit().await.or_raise(|| ErrorKind::Catalog)?;
    tracing::info!(version = %id, "Restored version");
    Ok(restored)
}

/// Digests are accepted in any case but stored lowercase.
fn digest(fingerprint: &str) -> Result<String> {
    let digest = fingerprint.trim().to_ascii_lowercase();
    if digest.len() != DIGEST_LENGTH || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
        exn::bail!(ErrorKind::InvalidFingerprint(fingerprint.to_string()));
    }
    Ok(digest)
}

#[instrument(skip(store))]
pub async fn block_fingerprint(store: &dyn Store, fingerprint: &str, reason: Option<&str>) -> Result<()> {
    let digest = digest(fingerprint)?;
    let mut tx = store.begin().await.or_raise(|| ErrorKind::Catalog)?;
    if !tx.block_fingerprint(&digest, reason).await.or_raise(|| ErrorKind::Catalog)? {
        exn::bail!(ErrorKind::AlreadyBlocked(digest));
    }
    tx.commit().await.or_raise(|| ErrorKind::Catalog)
}

#[instrument(skip(store))]
pub async fn unblock_fingerprint(store: &dyn Store, fingerprint: &str) -> Result<()> {
    let digest = digest(fingerprint)?;
    let mut tx = store.begin().await.or_raise(|| ErrorKind::Catalog)?;
    if !tx.unblock_fingerprint(&digest).await.or_raise(|| ErrorKind::Catalog)? {
        exn::bail!(ErrorKind::NotBlocked(digest));
    }
    tx.commit().await.or_raise(|| ErrorKind::Catalog)
}

pub async fn blocked_fingerprints(store: &dyn Store) -> Result<Vec<BlockedFingerprint>> {
    store.blocked_fingerprints().await.or_raise(|| ErrorKind::Catalog)
}

/// Permanently remove versions that have been soft-deleted for longer than
/// `older_than`. Returns how many were removed.
#[instrument(skip(store))]
pub async fn purge(store: &dyn Store, older_than: Duration) -> Result<u64> {
    let before = UtcDateTime::now() - older_than;
    let mut tx = store.begin().await.or_raise(|| ErrorKind::Catalog)?;
    let purged = tx.purge_soft_deleted(before).await.or_raise(|| ErrorKind::Catalog)?;
    tx.commit().await.or_raise(|| ErrorKind::Catalog)?;
    tracing::info!(purged, "Purged soft-deleted versions");
    Ok(purged)
}

pub async fn stats(store: &dyn Store) -> Result<CatalogStats> {
    store.stats().await.or_raise(|| ErrorKind::Catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::group;
    use crate::group::tests::scanned;
    use crate::write::CatalogWriter;
    use shelf_catalog::MemoryStore;
    use std::sync::Arc;

    fn hex(c: char) -> String {
        std::iter::repeat_n(c, DIGEST_LENGTH).collect()
    }

    /// A catalog with one work and the given versions, by fingerprint.
    async fn catalog(digests: &[String]) -> (MemoryStore, Vec<VersionId>) {
        let store = MemoryStore::new();
        let writer = CatalogWriter::new(Arc::new(store.clone()));
        let files = digests
            .iter()
            .enumerate()
            .map(|(i, digest)| scanned(&format!("/lib/{i}.mp3"), "Title", "Smith", 100, digest))
            .collect();
        let grouping = group(files, 0.05);
        writer.write_group(&grouping.groups[0], false).await;
        let ids = store.list_versions().await.unwrap().iter().map(|v| v.id).collect();
        (store, ids)
    }

    #[tokio::test]
    async fn test_delete_and_restore() {
        let (store, ids) = catalog(&[hex('a')]).await;
        let deleted = delete_version(&store, ids[0], false, None).await.unwrap();
        assert!(!deleted.blocked);
        assert_eq!(stats(&store).await.unwrap().soft_deleted_versions, 1);

        let err = delete_version(&store, ids[0], false, None).await.unwrap_err();
        assert_eq!(*err, ErrorKind::AlreadyDeleted(ids[0]));

        let restored = restore_version(&store, ids[0]).await.unwrap();
        assert!(restored.state.is_active());
        let err = restore_version(&store, ids[0]).await.unwrap_err();
        assert_eq!(*err, ErrorKind::NotDeleted(ids[0]));
    }

    #[tokio::test]
    async fn test_missing_version() {
        let store = MemoryStore::new();
        let err = delete_version(&store, VersionId(42), true, None).await.unwrap_err();
        assert_eq!(*err, ErrorKind::VersionNotFound(VersionId(42)));
        let err = restore_version(&store, VersionId(42)).await.unwrap_err();
        assert_eq!(*err, ErrorKind::VersionNotFound(VersionId(42)));
    }

    #[tokio::test]
    async fn test_delete_with_block() {
        let (store, ids) = catalog(&[hex('a')]).await;
        let deleted = delete_version(&store, ids[0], true, Some("wrong book")).await.unwrap();
        assert!(deleted.blocked);
        let blocked = blocked_fingerprints(&store).await.unwrap();
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].fingerprint, hex('a'));
        assert_eq!(blocked[0].reason.as_deref(), Some("wrong book"));
    }

    #[tokio::test]
    async fn test_restore_refuses_active_duplicate() {
        let (store, ids) = catalog(&[hex('a')]).await;
        delete_version(&store, ids[0], false, None).await.unwrap();
        // The same content shows up again and is catalogued afresh.
        let writer = CatalogWriter::new(Arc::new(store.clone()));
        let grouping = group(vec![scanned("/lib/again.mp3", "Title", "Smith", 100, &hex('a'))], 0.05);
        writer.write_group(&grouping.groups[0], false).await;
        let active = store.list_versions().await.unwrap().into_iter().find(|v| v.state.is_active()).unwrap();

        let err = restore_version(&store, ids[0]).await.unwrap_err();
        assert_eq!(
            *err,
            ErrorKind::DuplicateActive {
                restoring: ids[0],
                active: active.id,
            }
        );
    }

    #[tokio::test]
    async fn test_blocklist_round_trip() {
        let store = MemoryStore::new();
        let upper = hex('A');
        block_fingerprint(&store, &upper, Some("sample")).await.unwrap();
        let err = block_fingerprint(&store, &hex('a'), None).await.unwrap_err();
        assert_eq!(*err, ErrorKind::AlreadyBlocked(hex('a')));
        assert_eq!(blocked_fingerprints(&store).await.unwrap()[0].fingerprint, hex('a'));

        unblock_fingerprint(&store, &hex('a')).await.unwrap();
        let err = unblock_fingerprint(&store, &hex('a')).await.unwrap_err();
        assert_eq!(*err, ErrorKind::NotBlocked(hex('a')));
        assert!(blocked_fingerprints(&store).await.unwrap().is_empty());
    }

    #[rstest::rstest]
    #[case("")]
    #[case("abc")]
    #[case("zz")]
    #[tokio::test]
    async fn test_invalid_fingerprints(#[case] fingerprint: &str) {
        let store = MemoryStore::new();
        let err = block_fingerprint(&store, fingerprint, None).await.unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidFingerprint(fingerprint.to_string()));
    }

    #[tokio::test]
    async fn test_purge_respects_age() {
        let (store, ids) = catalog(&[hex('a'), hex('b')]).await;
        delete_version(&store, ids[0], false, None).await.unwrap();
        assert_eq!(purge(&store, Duration::days(1)).await.unwrap(), 0);
        assert_eq!(purge(&store, Duration::ZERO).await.unwrap(), 1);
        let stats = stats(&store).await.unwrap();
        assert_eq!((stats.active_versions, stats.soft_deleted_versions), (1, 0));
    }
}
