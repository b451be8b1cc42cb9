//! Persisted catalog entities.

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use shelf_extract::models::{Field, SeriesPosition, Source, StreamInfo};
use shelf_storage::Fingerprint;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use time::UtcDateTime;

macro_rules! id {
    ($name:ident) => {
        #[derive(Debug, Display, From, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);
    };
}
id!(AuthorId);
id!(SeriesId);
id!(WorkId);
id!(VersionId);

/// Identity shared by every persisted version the engine considers the same
/// work, across scans.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionGroupId(String);
impl VersionGroupId {
    const PREFIX: &str = "vg-";

    /// A fresh identifier derived from a group key: the same key always
    /// yields the same identifier.
    pub fn derive(group_key: &str) -> Self {
        let digest = blake3::hash(group_key.as_bytes()).to_hex();
        Self(format!("{}{}", Self::PREFIX, &digest[..16]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<String> for VersionGroupId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Work {
    pub id: WorkId,
    pub author_id: AuthorId,
    pub title: String,
    pub series_id: Option<SeriesId>,
    pub series_position: Option<SeriesPosition>,
}

/// Lifecycle of a persisted version. Rows are never removed by the engine,
/// only moved between states (purging is an explicit admin operation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionState {
    Active,
    SoftDeleted { at: UtcDateTime },
}
impl VersionState {
    pub(crate) const ACTIVE: &str = "active";
    pub(crate) const SOFT_DELETED: &str = "soft_deleted";

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// The state after a soft delete, or `None` if there's nothing to delete.
    pub fn soft_delete(self, at: UtcDateTime) -> Option<Self> {
        match self {
            Self::Active => Some(Self::SoftDeleted { at }),
            Self::SoftDeleted { .. } => None,
        }
    }

    /// The state after a restore, or `None` if the version is already active.
    pub fn restore(self) -> Option<Self> {
        match self {
            Self::Active => None,
            Self::SoftDeleted { .. } => Some(Self::Active),
        }
    }

    pub(crate) fn as_db_str(&self) -> &'static str {
        match self {
            Self::Active => Self::ACTIVE,
            Self::SoftDeleted { .. } => Self::SOFT_DELETED,
        }
    }

    pub(crate) fn deleted_at(&self) -> Option<UtcDateTime> {
        match self {
            Self::Active => None,
            Self::SoftDeleted { at } => Some(*at),
        }
    }
}

/// Everything the writer supplies for one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionFields {
    pub work_id: WorkId,
    /// Ignored when updating: an existing version keeps its group.
    pub version_group_id: VersionGroupId,
    pub file_path: PathBuf,
    pub fingerprint: Fingerprint,
    pub title: String,
    pub narrator: Option<String>,
    pub format: Option<String>,
    pub duration: Option<Duration>,
    pub stream: StreamInfo,
    pub provenance: BTreeMap<Field, Source>,
}

/// One physical file representing one edition of a work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudiobookVersion {
    pub id: VersionId,
    pub fields: VersionFields,
    pub state: VersionState,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
}

/// Outcome of an upsert, keyed by (work, fingerprint) among active versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted(VersionId),
    Updated(VersionId),
}
impl Upsert {
    pub fn id(&self) -> VersionId {
        match self {
            Self::Inserted(id) | Self::Updated(id) => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedFingerprint {
    pub fingerprint: String,
    pub reason: Option<String>,
    pub blocked_at: UtcDateTime,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub authors: u64,
    pub series: u64,
    pub works: u64,
    pub active_versions: u64,
    pub soft_deleted_versions: u64,
    pub blocked_fingerprints: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_group_id_is_stable() {
        let a = VersionGroupId::derive("title|smith|1");
        let b = VersionGroupId::derive("title|smith|1");
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("vg-"));
        assert_eq!(a.as_str().len(), 3 + 16);
        assert_ne!(a, VersionGroupId::derive("title|smith|2"));
    }

    #[test]
    fn test_state_transitions() {
        let at = UtcDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let deleted = VersionState::Active.soft_delete(at).unwrap();
        assert_eq!(deleted, VersionState::SoftDeleted { at });
        assert_eq!(deleted.soft_delete(at), None);
        assert_eq!(deleted.restore(), Some(VersionState::Active));
        assert_eq!(VersionState::Active.restore(), None);
        assert_eq!(deleted.deleted_at(), Some(at));
        assert_eq!(deleted.as_db_str(), "soft_deleted");
    }
}
