//! Conversions between catalog models and SQLite rows.

use crate::error::{Error, ErrorKind};
use crate::models::{
    AudiobookVersion, AuthorId, BlockedFingerprint, SeriesId, VersionFields, VersionId, VersionState, Work, WorkId,
};
use exn::{OptionExt, ResultExt};
use shelf_extract::models::{SeriesPosition, StreamInfo};
use shelf_storage::Fingerprint;
use std::path::PathBuf;
use std::time::Duration;
use time::UtcDateTime;

pub(crate) fn timestamp(at: UtcDateTime) -> i64 {
    at.unix_timestamp()
}

fn datetime(timestamp: i64, field: &'static str) -> Result<UtcDateTime, Error> {
    UtcDateTime::from_unix_timestamp(timestamp).or_raise(|| ErrorKind::InvalidData(field))
}

fn narrow<T: TryFrom<i64>>(value: Option<i64>, field: &'static str) -> Result<Option<T>, Error> {
    value
        .map(|v| T::try_from(v).ok().ok_or_raise(|| ErrorKind::InvalidData(field)))
        .transpose()
}

fn widen<T>(value: Option<T>) -> Option<i64>
where
    i64: From<T>,
{
    value.map(i64::from)
}

/// Column values for writing a version, in the order the statements bind
/// them.
pub(crate) struct VersionColumns {
    pub(crate) file_path: String,
    pub(crate) file_size: i64,
    pub(crate) crc32: i64,
    pub(crate) duration_ms: Option<i64>,
    pub(crate) overall_bitrate: Option<i64>,
    pub(crate) audio_bitrate: Option<i64>,
    pub(crate) sample_rate: Option<i64>,
    pub(crate) channels: Option<i64>,
    pub(crate) bit_depth: Option<i64>,
    pub(crate) provenance: String,
}
impl TryFrom<&VersionFields> for VersionColumns {
    type Error = Error;
    fn try_from(fields: &VersionFields) -> Result<Self, Self::Error> {
        let duration_ms = fields
            .duration
            .map(|d| i64::try_from(d.as_millis()).or_raise(|| ErrorKind::InvalidData("duration")))
            .transpose()?;
        Ok(Self {
            file_path: fields.file_path.to_str().ok_or_raise(|| ErrorKind::InvalidData("file path"))?.to_string(),
            file_size: i64::try_from(fields.fingerprint.length).or_raise(|| ErrorKind::InvalidData("file size"))?,
            crc32: i64::from(fields.fingerprint.crc32),
            duration_ms,
            overall_bitrate: widen(fields.stream.overall_bitrate),
            audio_bitrate: widen(fields.stream.audio_bitrate),
            sample_rate: widen(fields.stream.sample_rate),
            channels: widen(fields.stream.channels),
            bit_depth: widen(fields.stream.bit_depth),
            provenance: serde_json::to_string(&fields.provenance).or_raise(|| ErrorKind::InvalidData("provenance"))?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct VersionRow {
    pub(crate) id: i64,
    pub(crate) work_id: i64,
    pub(crate) version_group_id: String,
    pub(crate) file_path: String,
    pub(crate) fingerprint: String,
    pub(crate) file_size: i64,
    pub(crate) crc32: i64,
    pub(crate) title: String,
    pub(crate) narrator: Option<String>,
    pub(crate) format: Option<String>,
    pub(crate) duration_ms: Option<i64>,
    pub(crate) overall_bitrate: Option<i64>,
    pub(crate) audio_bitrate: Option<i64>,
    pub(crate) sample_rate: Option<i64>,
    pub(crate) channels: Option<i64>,
    pub(crate) bit_depth: Option<i64>,
    pub(crate) provenance: String,
    pub(crate) state: String,
    pub(crate) deleted_at: Option<i64>,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
}
impl TryFrom<VersionRow> for AudiobookVersion {
    type Error = Error;
    fn try_from(row: VersionRow) -> Result<Self, Self::Error> {
        let state = match (row.state.as_str(), row.deleted_at) {
            (VersionState::ACTIVE, None) => VersionState::Active,
            (VersionState::SOFT_DELETED, Some(at)) => VersionState::SoftDeleted {
                at: datetime(at, "deleted at")?,
            },
            _ => exn::bail!(ErrorKind::InvalidData("state")),
        };
        let duration = narrow::<u64>(row.duration_ms, "duration")?.map(Duration::from_millis);
        Ok(Self {
            id: VersionId(row.id),
            fields: VersionFields {
                work_id: WorkId(row.work_id),
                version_group_id: row.version_group_id.into(),
                file_path: PathBuf::from(row.file_path),
                fingerprint: Fingerprint::new(
                    row.fingerprint,
                    u64::try_from(row.file_size).or_raise(|| ErrorKind::InvalidData("file size"))?,
                    u32::try_from(row.crc32).or_raise(|| ErrorKind::InvalidData("crc32"))?,
                ),
                title: row.title,
                narrator: row.narrator,
                format: row.format.clone(),
                duration,
                stream: StreamInfo {
                    format: row.format,
                    duration,
                    overall_bitrate: narrow(row.overall_bitrate, "overall bitrate")?,
                    audio_bitrate: narrow(row.audio_bitrate, "audio bitrate")?,
                    sample_rate: narrow(row.sample_rate, "sample rate")?,
                    channels: narrow(row.channels, "channels")?,
                    bit_depth: narrow(row.bit_depth, "bit depth")?,
                },
                provenance: serde_json::from_str(&row.provenance).or_raise(|| ErrorKind::InvalidData("provenance"))?,
            },
            state,
            created_at: datetime(row.created_at, "created at")?,
            updated_at: datetime(row.updated_at, "updated at")?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct WorkRow {
    pub(crate) id: i64,
    pub(crate) author_id: i64,
    pub(crate) title: String,
    pub(crate) series_id: Option<i64>,
    pub(crate) series_position: Option<f64>,
}
impl TryFrom<WorkRow> for Work {
    type Error = Error;
    fn try_from(row: WorkRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: WorkId(row.id),
            author_id: AuthorId(row.author_id),
            title: row.title,
            series_id: row.series_id.map(SeriesId),
            series_position: row
                .series_position
                .map(|p| SeriesPosition::new(p).ok_or_raise(|| ErrorKind::InvalidData("series position")))
                .transpose()?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct BlockedRow {
    pub(crate) fingerprint: String,
    pub(crate) reason: Option<String>,
    pub(crate) blocked_at: i64,
}
impl TryFrom<BlockedRow> for BlockedFingerprint {
    type Error = Error;
    fn try_from(row: BlockedRow) -> Result<Self, Self::Error> {
        Ok(Self {
            fingerprint: row.fingerprint,
            reason: row.reason,
            blocked_at: datetime(row.blocked_at, "blocked at")?,
        })
    }
}
