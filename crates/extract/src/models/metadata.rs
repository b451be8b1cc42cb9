use super::SeriesPosition;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Where a metadata value came from.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Embedded container metadata (tags and stream properties).
    #[display("tag")]
    Tag,
    /// Pattern-matched from the file and directory names.
    #[display("filename")]
    Filename,
}

/// The logical fields every source can contribute to.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    #[display("title")]
    Title,
    #[display("author")]
    Author,
    #[display("narrator")]
    Narrator,
    #[display("series")]
    Series,
    #[display("series_position")]
    SeriesPosition,
    #[display("duration")]
    Duration,
    #[display("format")]
    Format,
}
impl Field {
    pub const ALL: [Field; 7] = [
        Field::Title,
        Field::Author,
        Field::Narrator,
        Field::Series,
        Field::SeriesPosition,
        Field::Duration,
        Field::Format,
    ];
}

/// Metadata as reported by one source, before any reconciliation.
///
/// `None` means the source had nothing to say; it is distinct from
/// `Some(String::new())`, which some taggers write. The resolver treats
/// empty and whitespace-only values as not present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawMetadata {
    pub source: Source,
    pub title: Option<String>,
    pub author: Option<String>,
    pub narrator: Option<String>,
    pub series: Option<String>,
    /// Kept as text: whether it's numeric is the resolver's decision.
    pub series_position: Option<String>,
    pub duration: Option<Duration>,
    pub format: Option<String>,
}
impl RawMetadata {
    /// A record from `source` with every field absent.
    pub fn absent(source: Source) -> Self {
        Self {
            source,
            title: None,
            author: None,
            narrator: None,
            series: None,
            series_position: None,
            duration: None,
            format: None,
        }
    }

    pub fn is_absent(&self) -> bool {
        *self == Self::absent(self.source)
    }
}

/// The reconciled metadata for one file.
///
/// Every present field has a matching [`provenance`](Self::provenance) entry
/// and every absent field has none. Construct through
/// [`resolve`](crate::resolve) to keep it that way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub narrator: Option<String>,
    pub series: Option<String>,
    pub series_position: Option<SeriesPosition>,
    pub duration: Option<Duration>,
    pub format: Option<String>,
    pub provenance: BTreeMap<Field, Source>,
}
impl ResolvedMetadata {
    /// Which source supplied `field`, if it's present.
    pub fn source_of(&self, field: Field) -> Option<Source> {
        self.provenance.get(&field).copied()
    }

    pub fn is_present(&self, field: Field) -> bool {
        match field {
            Field::Title => self.title.is_some(),
            Field::Author => self.author.is_some(),
            Field::Narrator => self.narrator.is_some(),
            Field::Series => self.series.is_some(),
            Field::SeriesPosition => self.series_position.is_some(),
            Field::Duration => self.duration.is_some(),
            Field::Format => self.format.is_some(),
        }
    }

    /// Number of present fields; richer metadata wins primary selection.
    pub fn populated_fields(&self) -> usize {
        Field::ALL.iter().filter(|f| self.is_present(**f)).count()
    }

    /// Enough to identify a Work: a title and an author.
    pub fn is_identifiable(&self) -> bool {
        self.title.is_some() && self.author.is_some()
    }

    /// Record the winning source for a field that has just been filled in.
    pub(crate) fn set_source(&mut self, field: Field, source: Option<Source>) {
        match source {
            Some(source) => self.provenance.insert(field, source),
            None => self.provenance.remove(&field),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent() {
        let raw = RawMetadata::absent(Source::Filename);
        assert!(raw.is_absent());
        let raw = RawMetadata { title: Some(String::new()), ..raw };
        // Empty string isn't absence.
        assert!(!raw.is_absent());
    }

    #[test]
    fn test_populated_fields() {
        let mut resolved = ResolvedMetadata::default();
        assert_eq!(resolved.populated_fields(), 0);
        assert!(!resolved.is_identifiable());
        resolved.title = Some("Title".to_string());
        resolved.author = Some("Smith".to_string());
        resolved.duration = Some(Duration::from_secs(60));
        assert_eq!(resolved.populated_fields(), 3);
        assert!(resolved.is_identifiable());
    }

    #[test]
    fn test_provenance_serializes_as_names() {
        let mut resolved = ResolvedMetadata::default();
        resolved.title = Some("Title".to_string());
        resolved.set_source(Field::Title, Some(Source::Tag));
        resolved.series_position = SeriesPosition::parse("2");
        resolved.set_source(Field::SeriesPosition, Some(Source::Filename));
        let json = serde_json::to_string(&resolved.provenance).unwrap();
        assert_eq!(json, r#"{"title":"tag","series_position":"filename"}"#);
    }
}
