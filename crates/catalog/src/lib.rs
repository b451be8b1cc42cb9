//! The persistent audiobook catalog.
//!
//! Authors, series and works are created on first encounter and reused
//! afterwards; each audiobook version (one physical file of a work) carries a
//! version group identity, its fingerprint and a lifecycle state. Versions are
//! soft-deleted rather than removed so history survives and deletions can be
//! undone.
//!
//! The engine talks to the catalog only through the [`Store`] and
//! [`Transaction`] traits. [`SqliteStore`] is the real implementation;
//! `MemoryStore` (behind the `mock` feature) is a fake for tests.

mod db;
pub mod error;
#[cfg(any(test, feature = "mock"))]
mod memory;
pub mod models;
mod rows;
mod sqlite;
mod store;

pub use crate::db::Database;
#[cfg(any(test, feature = "mock"))]
pub use crate::memory::{MemoryStore, MemoryTransaction};
pub use crate::sqlite::{SqliteStore, SqliteTransaction};
pub use crate::store::{Store, Transaction};
