//! Filesystem access for the scanner: discovering candidate files under the
//! configured import roots, and fingerprinting their contents.

pub mod error;
mod filter;
pub mod fingerprint;
mod models;
mod path;
mod source;

pub use crate::filter::FileFilter;
pub use crate::fingerprint::{Fingerprint, fingerprint};
pub use crate::models::DiscoveredFile;
pub use crate::path::relative_to;
pub use crate::source::{DiscoveryStream, ImportSource, LocalSource};
