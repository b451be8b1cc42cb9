use serde::{Serialize, Serializer};
use shelf_extract::models::{ResolvedMetadata, SeriesPosition, StreamInfo};
use shelf_extract::normalize;
use shelf_storage::Fingerprint;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;

/// One file that made it through tag reading, filename parsing, resolution
/// and fingerprinting. Everything the grouper and writer need is here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Absolute path; also the stable scan order.
    pub path: PathBuf,
    pub metadata: ResolvedMetadata,
    pub stream: StreamInfo,
    pub fingerprint: Fingerprint,
}

/// Identity of a work within a scan batch: normalized title and author, plus
/// the series position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub title: String,
    pub author: String,
    pub position: Option<SeriesPosition>,
}
impl GroupKey {
    /// `None` for records that can't identify a work (no title or no author).
    pub fn new(metadata: &ResolvedMetadata) -> Option<Self> {
        Some(Self {
            title: normalize(metadata.title.as_deref()?),
            author: normalize(metadata.author.as_deref()?),
            position: metadata.series_position,
        })
    }

    /// Flat form used to derive group identifiers and name work locks.
    pub fn seed(&self) -> String {
        let position = self.position.map(|p| p.to_string()).unwrap_or_default();
        format!("{}\u{1f}{}\u{1f}{}", self.title, self.author, position)
    }
}
impl Display for GroupKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} / {}", self.title, self.author)?;
        if let Some(position) = self.position {
            write!(f, " #{position}")?;
        }
        Ok(())
    }
}
impl Serialize for GroupKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(title: Option<&str>, author: Option<&str>, position: Option<f64>) -> ResolvedMetadata {
        ResolvedMetadata {
            title: title.map(str::to_string),
            author: author.map(str::to_string),
            series_position: position.and_then(SeriesPosition::new),
            ..Default::default()
        }
    }

    #[test]
    fn test_key_is_normalized() {
        let a = GroupKey::new(&metadata(Some("The  Way of Kings"), Some("Brandon Sanderson"), Some(1.0))).unwrap();
        let b = GroupKey::new(&metadata(Some("the way of kings "), Some("BRANDON sanderson"), Some(1.0))).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.seed(), b.seed());
        assert_eq!(a.to_string(), "the way of kings / brandon sanderson #1");
    }

    #[test]
    fn test_position_is_part_of_the_key() {
        let one = GroupKey::new(&metadata(Some("Title"), Some("Smith"), Some(1.0))).unwrap();
        let two = GroupKey::new(&metadata(Some("Title"), Some("Smith"), Some(2.0))).unwrap();
        let none = GroupKey::new(&metadata(Some("Title"), Some("Smith"), None)).unwrap();
        assert_ne!(one, two);
        assert_ne!(one.seed(), none.seed());
        assert_eq!(none.to_string(), "title / smith");
    }

    #[test]
    fn test_incomplete_records_have_no_key() {
        assert_eq!(GroupKey::new(&metadata(Some("Title"), None, None)), None);
        assert_eq!(GroupKey::new(&metadata(None, Some("Smith"), None)), None);
    }
}
