use regex::Regex;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

const NUMBER: &str = r"(\d+(?:\.\d+)?)";

// Filename stem rules, tried in order (see `filename::RULES`).
regex!(SERIES_PAREN, format!(r"^\(([^)]+?)\s+#?{NUMBER}\)\s*(.+)$").as_str());
regex!(SERIES_DASH_NUMBER, format!(r"^(.+?)\s+-\s+#?{NUMBER}\s*[:-]\s*(.+)$").as_str());
regex!(SERIES_BOOK, format!(r"(?i)^(.+?)\s+(?:book|bk\.?|#)\s*{NUMBER}\s*[:-]\s*(.+)$").as_str());
regex!(SERIES_NUMBER_DASH, format!(r"^(.*[^\d\s])\s+{NUMBER}\s+-\s+(.+)$").as_str());
regex!(LEADING_TRACK, r"^\d{1,3}(?:\.|\s*-)?\s+(.+)$");
regex!(AUTHOR_TITLE_NARRATOR, r"^(.+?)\s+-\s+(.+?)\s*\(([^()]+)\)$");
regex!(DASH_PAIR, r"^(.+?)\s+-\s+(.+)$");
regex!(BARE_STEM, r"^(.*\w.*)$");

// Fragments picked out of file stems and tag values.
regex!(
    NARRATOR_SUFFIX,
    r"(?i)\s*(?:[-–,]\s*)?[(\[]?\s*(?:read\s+by|narrated\s+by|narrator:?)\s+([^)\]]+?)\s*[)\]]?\s*$"
);
regex!(
    NARRATOR_COMMENT,
    r"(?im)^\s*(?:narrator|narrated\s+by|read\s+by|reader)\b\s*:?\s*(.+?)\s*$"
);
regex!(VOLUME_MARKER, format!(r"(?i)\b(?:vol\.?|volume|book|bk\.?)\s*{NUMBER}\b").as_str());
regex!(SERIES_WITH_POSITION, format!(r"(?i)^(.+?)\s*(?:#|,\s*(?:book|bk\.?|vol\.?|volume)\s*){NUMBER}\s*$").as_str());
regex!(
    GENERIC_PART,
    r"(?i)^(?:(?:part|pt|chapter|chap|ch|track|disc|disk|cd)[\s._-]*\d+|\d+|\d+\s+part\s+\d+\s+of\s+\d+)$"
);
regex!(NOT_A_NARRATOR, r"(?i)^(?:un)?abridged$|^dramati[sz]ed$|^full[\s-]cast$|^retail$|^\d{4}$|^\d+\s*kbps$");
regex!(TRAILING_PAREN, r"\s*[(\[]([^()\[\]]+)[)\]]\s*$");
regex!(WHITESPACE, r"\s+");

/// Directory names that organise a library rather than describe a book.
/// Never treated as an author or a title.
pub(crate) const NOISE_SEGMENTS: [&str; 12] = [
    "audiobooks",
    "audiobook",
    "audio books",
    "books",
    "library",
    "media",
    "audio",
    "imports",
    "import",
    "downloads",
    "incoming",
    "unsorted",
];
