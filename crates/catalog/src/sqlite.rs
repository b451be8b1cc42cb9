//! The SQLite-backed [`Store`].

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{
    AudiobookVersion, AuthorId, BlockedFingerprint, CatalogStats, SeriesId, Upsert, VersionFields, VersionGroupId,
    VersionId, VersionState, Work, WorkId,
};
use crate::rows::{BlockedRow, VersionColumns, VersionRow, WorkRow, timestamp};
use crate::store::{Store, Transaction};
use async_trait::async_trait;
use exn::ResultExt;
use shelf_extract::models::SeriesPosition;
use shelf_extract::normalize;
use sqlx::{Sqlite, SqlitePool};
use time::UtcDateTime;

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}
impl From<&Database> for SqliteStore {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        Ok(Box::new(SqliteTransaction { tx }))
    }

    async fn find_version(&self, id: VersionId) -> Result<Option<AudiobookVersion>> {
        let row: Option<VersionRow> = sqlx::query_as(include_str!("../queries/get_version.sql"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(AudiobookVersion::try_from).transpose()
    }

    async fn list_versions(&self) -> Result<Vec<AudiobookVersion>> {
        let rows: Vec<VersionRow> = sqlx::query_as(include_str!("../queries/list_versions.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(AudiobookVersion::try_from).collect()
    }

    async fn list_works(&self) -> Result<Vec<Work>> {
        let rows: Vec<WorkRow> = sqlx::query_as(include_str!("../queries/list_works.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Work::try_from).collect()
    }

    async fn blocked_fingerprints(&self) -> Result<Vec<BlockedFingerprint>> {
        let rows: Vec<BlockedRow> = sqlx::query_as(include_str!("../queries/list_blocked_fingerprints.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(BlockedFingerprint::try_from).collect()
    }

    async fn stats(&self) -> Result<CatalogStats> {
        let (authors, series, works, active, deleted, blocked): (i64, i64, i64, i64, i64, i64) =
            sqlx::query_as(include_str!("../queries/stats.sql"))
                .fetch_one(&self.pool)
                .await
                .or_raise(|| ErrorKind::Database)?;
        Ok(CatalogStats {
            authors: count(authors),
            series: count(series),
            works: count(works),
            active_versions: count(active),
            soft_deleted_versions: count(deleted),
            blocked_fingerprints: count(blocked),
        })
    }
}

pub struct SqliteTransaction {
    tx: sqlx::Transaction<'static, Sqlite>,
}

impl SqliteTransaction {
    async fn set_state(&mut self, id: VersionId, from: VersionState, to: VersionState) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/set_version_state.sql"))
            .bind(to.as_db_str())
            .bind(to.deleted_at().map(timestamp))
            .bind(timestamp(UtcDateTime::now()))
            .bind(id.0)
            .bind(from.as_db_str())
            .execute(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn get_or_create_author(&mut self, name: &str) -> Result<AuthorId> {
        let id: i64 = sqlx::query_scalar(include_str!("../queries/get_or_create_author.sql"))
            .bind(name.trim())
            .bind(normalize(name))
            .bind(timestamp(UtcDateTime::now()))
            .fetch_one(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(AuthorId(id))
    }

    async fn get_or_create_series(&mut self, name: &str) -> Result<SeriesId> {
        let id: i64 = sqlx::query_scalar(include_str!("../queries/get_or_create_series.sql"))
            .bind(name.trim())
            .bind(normalize(name))
            .bind(timestamp(UtcDateTime::now()))
            .fetch_one(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(SeriesId(id))
    }

    async fn get_or_create_work(
        &mut self,
        author: AuthorId,
        title: &str,
        series: Option<SeriesId>,
        position: Option<SeriesPosition>,
    ) -> Result<WorkId> {
        let id: i64 = sqlx::query_scalar(include_str!("../queries/get_or_create_work.sql"))
            .bind(author.0)
            .bind(title.trim())
            .bind(normalize(title))
            .bind(series.map(|s| s.0))
            .bind(position.map(|p| p.value()))
            .bind(position.map(|p| p.to_string()).unwrap_or_default())
            .bind(timestamp(UtcDateTime::now()))
            .fetch_one(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(WorkId(id))
    }

    async fn version_group_for_work(&mut self, work: WorkId) -> Result<Option<VersionGroupId>> {
        let id: Option<String> = sqlx::query_scalar(include_str!("../queries/version_group_for_work.sql"))
            .bind(work.0)
            .fetch_optional(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(id.map(VersionGroupId::from))
    }

    async fn find_active_version(&mut self, work: WorkId, fingerprint: &str) -> Result<Option<VersionId>> {
        let id: Option<i64> = sqlx::query_scalar(include_str!("../queries/find_active_version.sql"))
            .bind(work.0)
            .bind(fingerprint)
            .fetch_optional(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(id.map(VersionId))
    }

    async fn upsert_audiobook_version(&mut self, version: &VersionFields) -> Result<Upsert> {
        let columns = VersionColumns::try_from(version)?;
        let now = timestamp(UtcDateTime::now());
        if let Some(id) = self.find_active_version(version.work_id, &version.fingerprint.digest).await? {
            sqlx::query(include_str!("../queries/update_version.sql"))
                .bind(columns.file_path)
                .bind(columns.file_size)
                .bind(columns.crc32)
                .bind(&version.title)
                .bind(&version.narrator)
                .bind(&version.format)
                .bind(columns.duration_ms)
                .bind(columns.overall_bitrate)
                .bind(columns.audio_bitrate)
                .bind(columns.sample_rate)
                .bind(columns.channels)
                .bind(columns.bit_depth)
                .bind(columns.provenance)
                .bind(now)
                .bind(id.0)
                .execute(&mut *self.tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
            return Ok(Upsert::Updated(id));
        }
        let id: i64 = sqlx::query_scalar(include_str!("../queries/insert_version.sql"))
            .bind(version.work_id.0)
            .bind(version.version_group_id.as_str())
            .bind(columns.file_path)
            .bind(&version.fingerprint.digest)
            .bind(columns.file_size)
            .bind(columns.crc32)
            .bind(&version.title)
            .bind(&version.narrator)
            .bind(&version.format)
            .bind(columns.duration_ms)
            .bind(columns.overall_bitrate)
            .bind(columns.audio_bitrate)
            .bind(columns.sample_rate)
            .bind(columns.channels)
            .bind(columns.bit_depth)
            .bind(columns.provenance)
            .bind(now)
            .bind(now)
            .fetch_one(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(Upsert::Inserted(VersionId(id)))
    }

    async fn is_fingerprint_blocked(&mut self, fingerprint: &str) -> Result<bool> {
        sqlx::query_scalar(include_str!("../queries/is_fingerprint_blocked.sql"))
            .bind(fingerprint)
            .fetch_one(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    async fn find_version(&mut self, id: VersionId) -> Result<Option<AudiobookVersion>> {
        let row: Option<VersionRow> = sqlx::query_as(include_str!("../queries/get_version.sql"))
            .bind(id.0)
            .fetch_optional(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(AudiobookVersion::try_from).transpose()
    }

    async fn soft_delete_version(&mut self, id: VersionId) -> Result<bool> {
        let deleted = VersionState::SoftDeleted { at: UtcDateTime::now() };
        self.set_state(id, VersionState::Active, deleted).await
    }

    async fn restore_version(&mut self, id: VersionId) -> Result<bool> {
        // Only the state string of `from` is compared.
        let from = VersionState::SoftDeleted { at: UtcDateTime::UNIX_EPOCH };
        self.set_state(id, from, VersionState::Active).await
    }

    async fn block_fingerprint(&mut self, fingerprint: &str, reason: Option<&str>) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/block_fingerprint.sql"))
            .bind(fingerprint)
            .bind(reason)
            .bind(timestamp(UtcDateTime::now()))
            .execute(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn unblock_fingerprint(&mut self, fingerprint: &str) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/unblock_fingerprint.sql"))
            .bind(fingerprint)
            .execute(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_soft_deleted(&mut self, before: UtcDateTime) -> Result<u64> {
        let result = sqlx::query(include_str!("../queries/purge_soft_deleted.sql"))
            .bind(timestamp(before))
            .execute(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.or_raise(|| ErrorKind::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use shelf_extract::models::{Field, Source, StreamInfo};
    use shelf_storage::Fingerprint;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::time::Duration;

    async fn store() -> (Database, SqliteStore) {
        let db = Database::connect_in_memory().await.unwrap();
        let store = SqliteStore::from(&db);
        (db, store)
    }

    fn fields(work_id: WorkId, digest: &str, path: &str) -> VersionFields {
        VersionFields {
            work_id,
            version_group_id: VersionGroupId::derive("title|smith|"),
            file_path: PathBuf::from(path),
            fingerprint: Fingerprint::new(digest, 2048, 7),
            title: "Title".to_string(),
            narrator: None,
            format: Some("mp3".to_string()),
            duration: Some(Duration::from_secs(60)),
            stream: StreamInfo::default(),
            provenance: BTreeMap::from([(Field::Title, Source::Tag)]),
        }
    }

    #[rstest]
    #[case("Brandon Sanderson")]
    #[case("  brandon   SANDERSON ")]
    #[case("BRANDON SANDERSON")]
    #[case("brandon\tsanderson")]
    #[tokio::test]
    async fn test_author_matches_case_insensitively(#[case] spelling: &str) {
        let (db, store) = store().await;
        let mut tx = store.begin().await.unwrap();
        let a = tx.get_or_create_author("Brandon Sanderson").await.unwrap();
        let b = tx.get_or_create_author(spelling).await.unwrap();
        let c = tx.get_or_create_author("Robert Jordan").await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(store.stats().await.unwrap().authors, 2);
        db.close().await;
    }

    #[tokio::test]
    async fn test_work_key_includes_position() {
        let (db, store) = store().await;
        let mut tx = store.begin().await.unwrap();
        let author = tx.get_or_create_author("Smith").await.unwrap();
        let series = tx.get_or_create_series("Foo").await.unwrap();
        let first = tx.get_or_create_work(author, "Title", Some(series), SeriesPosition::new(1.0)).await.unwrap();
        let again = tx.get_or_create_work(author, "TITLE", Some(series), SeriesPosition::new(1.0)).await.unwrap();
        let second = tx.get_or_create_work(author, "Title", Some(series), SeriesPosition::new(2.0)).await.unwrap();
        let unnumbered = tx.get_or_create_work(author, "Title", None, None).await.unwrap();
        let unnumbered_again = tx.get_or_create_work(author, "Title", None, None).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(first, again);
        assert_ne!(first, second);
        assert_ne!(first, unnumbered);
        assert_eq!(unnumbered, unnumbered_again);
        let works = store.list_works().await.unwrap();
        assert_eq!(works.len(), 3);
        assert_eq!(works[0].series_position, SeriesPosition::new(1.0));
        db.close().await;
    }

    #[tokio::test]
    async fn test_existing_work_gains_series() {
        let (db, store) = store().await;
        let mut tx = store.begin().await.unwrap();
        let author = tx.get_or_create_author("Smith").await.unwrap();
        let work = tx.get_or_create_work(author, "Title", None, None).await.unwrap();
        let series = tx.get_or_create_series("Foo").await.unwrap();
        assert_eq!(tx.get_or_create_work(author, "Title", Some(series), None).await.unwrap(), work);
        tx.commit().await.unwrap();
        assert_eq!(store.list_works().await.unwrap()[0].series_id, Some(series));
        db.close().await;
    }

    #[tokio::test]
    async fn test_upsert_updates_active_version_in_place() {
        let (db, store) = store().await;
        let mut tx = store.begin().await.unwrap();
        let author = tx.get_or_create_author("Smith").await.unwrap();
        let work = tx.get_or_create_work(author, "Title", None, None).await.unwrap();
        let inserted = tx.upsert_audiobook_version(&fields(work, "aaaa", "a.mp3")).await.unwrap();
        let updated = tx.upsert_audiobook_version(&fields(work, "aaaa", "moved/a.mp3")).await.unwrap();
        let other = tx.upsert_audiobook_version(&fields(work, "bbbb", "b.mp3")).await.unwrap();
        tx.commit().await.unwrap();
        assert!(matches!(inserted, Upsert::Inserted(_)));
        assert_eq!(updated, Upsert::Updated(inserted.id()));
        assert!(matches!(other, Upsert::Inserted(id) if id != inserted.id()));
        let version = store.find_version(inserted.id()).await.unwrap().unwrap();
        assert_eq!(version.fields.file_path, PathBuf::from("moved/a.mp3"));
        assert_eq!(version.fields.provenance.get(&Field::Title), Some(&Source::Tag));
        assert_eq!(store.list_versions().await.unwrap().len(), 2);
        db.close().await;
    }

    #[tokio::test]
    async fn test_soft_deleted_version_is_not_updated() {
        let (db, store) = store().await;
        let mut tx = store.begin().await.unwrap();
        let author = tx.get_or_create_author("Smith").await.unwrap();
        let work = tx.get_or_create_work(author, "Title", None, None).await.unwrap();
        let first = tx.upsert_audiobook_version(&fields(work, "aaaa", "a.mp3")).await.unwrap().id();
        assert!(tx.soft_delete_version(first).await.unwrap());
        assert!(!tx.soft_delete_version(first).await.unwrap());
        assert_eq!(tx.version_group_for_work(work).await.unwrap(), None);
        let second = tx.upsert_audiobook_version(&fields(work, "aaaa", "a.mp3")).await.unwrap();
        tx.commit().await.unwrap();
        assert!(matches!(second, Upsert::Inserted(id) if id != first));
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.active_versions, 1);
        assert_eq!(stats.soft_deleted_versions, 1);
        db.close().await;
    }

    #[tokio::test]
    async fn test_restore() {
        let (db, store) = store().await;
        let mut tx = store.begin().await.unwrap();
        let author = tx.get_or_create_author("Smith").await.unwrap();
        let work = tx.get_or_create_work(author, "Title", None, None).await.unwrap();
        let id = tx.upsert_audiobook_version(&fields(work, "aaaa", "a.mp3")).await.unwrap().id();
        assert!(!tx.restore_version(id).await.unwrap());
        tx.soft_delete_version(id).await.unwrap();
        assert!(tx.restore_version(id).await.unwrap());
        tx.commit().await.unwrap();
        let version = store.find_version(id).await.unwrap().unwrap();
        assert_eq!(version.state, VersionState::Active);
        db.close().await;
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let (db, store) = store().await;
        {
            let mut tx = store.begin().await.unwrap();
            let author = tx.get_or_create_author("Smith").await.unwrap();
            let work = tx.get_or_create_work(author, "Title", None, None).await.unwrap();
            tx.upsert_audiobook_version(&fields(work, "aaaa", "a.mp3")).await.unwrap();
        }
        assert_eq!(store.stats().await.unwrap(), CatalogStats::default());
        db.close().await;
    }

    #[tokio::test]
    async fn test_blocklist() {
        let (db, store) = store().await;
        let mut tx = store.begin().await.unwrap();
        assert!(!tx.is_fingerprint_blocked("aaaa").await.unwrap());
        assert!(tx.block_fingerprint("aaaa", Some("bad rip")).await.unwrap());
        assert!(!tx.block_fingerprint("aaaa", None).await.unwrap());
        assert!(tx.is_fingerprint_blocked("aaaa").await.unwrap());
        tx.commit().await.unwrap();
        let blocked = store.blocked_fingerprints().await.unwrap();
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].reason.as_deref(), Some("bad rip"));

        let mut tx = store.begin().await.unwrap();
        assert!(tx.unblock_fingerprint("aaaa").await.unwrap());
        assert!(!tx.unblock_fingerprint("aaaa").await.unwrap());
        tx.commit().await.unwrap();
        assert!(store.blocked_fingerprints().await.unwrap().is_empty());
        db.close().await;
    }

    #[tokio::test]
    async fn test_purge_soft_deleted() {
        let (db, store) = store().await;
        let mut tx = store.begin().await.unwrap();
        let author = tx.get_or_create_author("Smith").await.unwrap();
        let work = tx.get_or_create_work(author, "Title", None, None).await.unwrap();
        let deleted = tx.upsert_audiobook_version(&fields(work, "aaaa", "a.mp3")).await.unwrap().id();
        tx.upsert_audiobook_version(&fields(work, "bbbb", "b.mp3")).await.unwrap();
        tx.soft_delete_version(deleted).await.unwrap();
        assert_eq!(tx.purge_soft_deleted(UtcDateTime::UNIX_EPOCH).await.unwrap(), 0);
        let tomorrow = UtcDateTime::now() + time::Duration::days(1);
        assert_eq!(tx.purge_soft_deleted(tomorrow).await.unwrap(), 1);
        tx.commit().await.unwrap();
        assert_eq!(store.find_version(deleted).await.unwrap(), None);
        assert_eq!(store.stats().await.unwrap().active_versions, 1);
        db.close().await;
    }

    #[tokio::test]
    async fn test_version_group_is_inherited_from_active_versions() {
        let (db, store) = store().await;
        let mut tx = store.begin().await.unwrap();
        let author = tx.get_or_create_author("Smith").await.unwrap();
        let work = tx.get_or_create_work(author, "Title", None, None).await.unwrap();
        assert_eq!(tx.version_group_for_work(work).await.unwrap(), None);
        tx.upsert_audiobook_version(&fields(work, "aaaa", "a.mp3")).await.unwrap();
        assert_eq!(
            tx.version_group_for_work(work).await.unwrap(),
            Some(VersionGroupId::derive("title|smith|"))
        );
        tx.commit().await.unwrap();
        db.close().await;
    }
}
