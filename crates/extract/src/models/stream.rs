use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw technical stream properties, as read from the container.
///
/// Bitrates are in kbps. Fields a container doesn't report are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Detected container format (`mp3`, `mp4`, `flac`, ...), never the
    /// file extension.
    pub format: Option<String>,
    pub duration: Option<Duration>,
    pub overall_bitrate: Option<u32>,
    pub audio_bitrate: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
    pub bit_depth: Option<u8>,
}

/// Whether a readable container carried any tags at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagStatus {
    Tagged,
    /// A valid file without tags. Not an error: the tag-sourced metadata is
    /// simply all absent.
    NoEmbeddedMetadata,
}

/// Everything the tag reader learned from one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagReading {
    pub metadata: super::RawMetadata,
    pub stream: StreamInfo,
    pub status: TagStatus,
}
