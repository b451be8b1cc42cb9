mod metadata;
mod position;
mod stream;

pub use self::metadata::{Field, RawMetadata, ResolvedMetadata, Source};
pub use self::position::SeriesPosition;
pub use self::stream::{StreamInfo, TagReading, TagStatus};

use crate::consts::WHITESPACE;

/// Normalize a value for use in a comparison key: trimmed, lower-cased, and
/// with every run of whitespace collapsed to a single space.
pub fn normalize(s: impl AsRef<str>) -> String {
    WHITESPACE.replace_all(s.as_ref().trim(), " ").to_lowercase()
}

/// Trim a raw value, treating empty and whitespace-only values as absent.
pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("The Way of Kings", "the way of kings")]
    #[case("  The   Way\tof\nKings ", "the way of kings")]
    #[case("ÉLAN", "élan")]
    #[case("", "")]
    fn test_normalize(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize(input), expected);
    }

    #[rstest]
    #[case(None, None)]
    #[case(Some(""), None)]
    #[case(Some("   "), None)]
    #[case(Some(" Smith "), Some("Smith"))]
    fn test_non_empty(#[case] input: Option<&str>, #[case] expected: Option<&str>) {
        assert_eq!(non_empty(input).as_deref(), expected);
    }
}
