//! The metadata resolution and version-grouping engine.
//!
//! A [`scan`] walks an [`ImportSource`](shelf_storage::ImportSource), reads,
//! resolves and fingerprints every file, [`group`]s the batch into version
//! groups, and hands those to the [`CatalogWriter`], the only component
//! that mutates the catalog.

pub mod admin;
pub mod error;
mod group;
mod inspect;
mod models;
mod scan;
mod write;

pub use crate::group::{DedupClass, GroupMember, Grouping, MismatchAdvisory, VersionGroup, group};
pub use crate::inspect::{Inspection, inspect};
pub use crate::models::{GroupKey, ScannedFile};
pub use crate::scan::{Completion, ScanCounts, ScanOptions, ScanReport, import_source, scan};
pub use crate::write::{CatalogWriter, GroupOutcome, GroupWrite, Written};
