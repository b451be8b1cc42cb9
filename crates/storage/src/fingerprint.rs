//! Content fingerprints.
//!
//! A fingerprint identifies a file by its bytes alone: two files with the same
//! content always produce the same fingerprint, wherever they live and
//! whatever they're called. It's the exact-duplicate signal for the grouper
//! and the key the blocklist is checked against.

use crate::error::{ErrorKind, Result};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::fs::File;
use std::io::{ErrorKind as IoErrorKind, Read};
use std::path::Path;
use tracing::instrument;

/// Size of the read buffer. Memory use while hashing never exceeds this,
/// regardless of how large the audio file is.
pub const BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    /// BLAKE3 digest of the file contents (lowercase hex)
    pub digest: String,
    /// Content length in bytes (for quick/cheap inequality checks)
    pub length: u64,
    /// CRC32 of the file contents
    pub crc32: u32,
}
impl Fingerprint {
    pub fn new(digest: impl Into<String>, length: u64, crc32: u32) -> Self {
        Self { digest: digest.into(), length, crc32 }
    }

    /// Fingerprint everything a reader yields, [`BUFFER_SIZE`] bytes at a time.
    pub fn from_reader(mut reader: impl Read) -> std::io::Result<Self> {
        let mut hasher = blake3::Hasher::new();
        let mut crc = crc32fast::Hasher::new();
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut length = 0u64;
        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buffer[..read]);
            crc.update(&buffer[..read]);
            length += read as u64;
        }
        Ok(Self {
            digest: hasher.finalize().to_hex().to_string(),
            length,
            crc32: crc.finalize(),
        })
    }

    /// Short form for log lines and terminal output.
    pub fn short(&self) -> &str {
        &self.digest[..self.digest.len().min(12)]
    }
}
impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.digest)
    }
}

/// Fingerprint the file at `path`.
///
/// This is blocking I/O: call it from a blocking task, never directly on an
/// async worker thread.
#[instrument(level = "debug", fields(path = %path.display()))]
pub fn fingerprint(path: &Path) -> Result<Fingerprint> {
    let file = File::open(path).map_err(|e| ErrorKind::from_io(e, path))?;
    Ok(Fingerprint::from_reader(file).map_err(|e| ErrorKind::from_io(e, path))?)
}
