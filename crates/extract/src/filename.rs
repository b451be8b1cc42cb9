//! Metadata from file and directory names.

use crate::consts::*;
use crate::models::{RawMetadata, Source, non_empty, normalize};
use regex::{Captures, Regex};
use std::ffi::OsStr;
use std::path::{Component, Path};
use std::sync::LazyLock;

#[derive(Debug, Default)]
struct StemFields {
    author: Option<String>,
    title: Option<String>,
    narrator: Option<String>,
    series: Option<String>,
    position: Option<String>,
}

struct Rule {
    name: &'static str,
    pattern: &'static LazyLock<Regex>,
    /// Returning `None` declines the match and moves on to the next rule.
    apply: fn(&Captures<'_>) -> Option<StemFields>,
}

/// Stem rules in priority order; the first one that matches (and doesn't
/// decline) wins.
static RULES: [Rule; 8] = [
    Rule {
        name: "(series N) title",
        pattern: &SERIES_PAREN,
        apply: series_title,
    },
    Rule {
        name: "series - N: title",
        pattern: &SERIES_DASH_NUMBER,
        apply: series_title,
    },
    Rule {
        name: "series book N: title",
        pattern: &SERIES_BOOK,
        apply: series_title,
    },
    Rule {
        name: "series N - title",
        pattern: &SERIES_NUMBER_DASH,
        apply: series_title,
    },
    Rule {
        name: "author - title (narrator)",
        pattern: &AUTHOR_TITLE_NARRATOR,
        apply: author_title_narrator,
    },
    Rule {
        name: "NN - title",
        pattern: &LEADING_TRACK,
        apply: title_only,
    },
    Rule {
        name: "author - title",
        pattern: &DASH_PAIR,
        apply: dash_pair,
    },
    Rule {
        name: "title",
        pattern: &BARE_STEM,
        apply: title_only,
    },
];

fn series_title(caps: &Captures<'_>) -> Option<StemFields> {
    Some(StemFields {
        series: Some(caps[1].to_string()),
        position: Some(caps[2].to_string()),
        title: Some(caps[3].to_string()),
        ..Default::default()
    })
}

fn author_title_narrator(caps: &Captures<'_>) -> Option<StemFields> {
    // "01 - Title (Someone)" is a track number, not an author.
    if !caps[1].chars().any(char::is_alphabetic) {
        return None;
    }
    Some(StemFields {
        author: Some(caps[1].to_string()),
        title: Some(caps[2].to_string()),
        narrator: Some(caps[3].to_string()),
        ..Default::default()
    })
}

fn title_only(caps: &Captures<'_>) -> Option<StemFields> {
    Some(StemFields {
        title: Some(caps[1].to_string()),
        ..Default::default()
    })
}

/// `Author - Title` or `Title - Author`, whichever side reads as a name.
fn dash_pair(caps: &Captures<'_>) -> Option<StemFields> {
    let (left, right) = (&caps[1], &caps[2]);
    let (author, title) = if looks_like_person_name(first_author(left)) {
        (Some(left), right)
    } else if looks_like_person_name(first_author(right)) {
        (Some(right), left)
    } else {
        (None, &caps[0])
    };
    Some(StemFields {
        author: author.map(str::to_string),
        title: Some(title.to_string()),
        ..Default::default()
    })
}

/// Two to four capitalised words (or initials) and no digits.
pub(crate) fn looks_like_person_name(candidate: &str) -> bool {
    let words: Vec<&str> = candidate.split_whitespace().collect();
    (2..=4).contains(&words.len())
        && !candidate.chars().any(|c| c.is_ascii_digit())
        && !is_noise(candidate)
        && words
            .iter()
            .all(|word| word.chars().next().is_some_and(char::is_uppercase))
}

fn is_noise(segment: &str) -> bool {
    NOISE_SEGMENTS.contains(&normalize(segment).as_str())
}

/// Only the first of several credited authors identifies the work.
fn first_author(authors: &str) -> &str {
    authors.split(['&', ';']).next().unwrap_or(authors).trim()
}

/// Underscores stand in for spaces when a name has none, and release tags
/// such as `(Unabridged)` or `[2019]` carry no metadata.
fn clean_stem(stem: &str) -> String {
    let mut stem = if stem.contains(' ') { stem.to_string() } else { stem.replace('_', " ") };
    while let Some(start) = TRAILING_PAREN
        .captures(&stem)
        .filter(|caps| NOT_A_NARRATOR.is_match(caps[1].trim()))
        .and_then(|caps| caps.get(0))
        .map(|m| m.start())
    {
        stem.truncate(start);
    }
    stem.trim().to_string()
}

/// Derive metadata from a path (typically relative to its import root).
///
/// Pure: the filesystem is never touched. When no rule matches the file stem,
/// the result is entirely absent, format included.
pub fn parse_filename(path: &Path) -> RawMetadata {
    explain_filename(path).0
}

/// Like [`parse_filename`], also naming the stem rule that matched.
pub fn explain_filename(path: &Path) -> (RawMetadata, Option<&'static str>) {
    let absent = || (RawMetadata::absent(Source::Filename), None);
    let Some(stem) = path.file_stem().and_then(OsStr::to_str) else {
        return absent();
    };
    // Nearest directory first.
    let dirs: Vec<&str> = path
        .parent()
        .map(|parent| {
            parent
                .components()
                .rev()
                .filter_map(|component| match component {
                    Component::Normal(segment) => segment.to_str(),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    let mut stem = clean_stem(stem);
    let mut suffix_narrator = None;
    let suffix = NARRATOR_SUFFIX
        .captures(&stem)
        .and_then(|caps| Some((caps.get(0)?.start(), non_empty(Some(&caps[1])))));
    if let Some((start, narrator)) = suffix {
        suffix_narrator = narrator;
        stem.truncate(start);
        stem = stem.trim().to_string();
    }

    let matched = RULES.iter().find_map(|rule| {
        let caps = rule.pattern.captures(&stem)?;
        (rule.apply)(&caps).map(|fields| (rule.name, fields))
    });
    let Some((rule, mut fields)) = matched else {
        return absent();
    };
    fields.narrator = non_empty(fields.narrator.as_deref()).or(suffix_narrator);

    // A generic chapter or part name says nothing about the book; the
    // directory holding it usually does.
    let mut title_dir = None;
    if fields.title.as_deref().is_some_and(|title| GENERIC_PART.is_match(title.trim())) {
        title_dir = dirs
            .iter()
            .position(|dir| !is_noise(dir) && !GENERIC_PART.is_match(dir.trim()));
        fields.title = title_dir.map(|index| clean_stem(dirs[index]));
    }
    if fields.author.is_none() {
        fields.author = dirs
            .iter()
            .enumerate()
            .filter(|(index, _)| Some(*index) != title_dir)
            .map(|(_, dir)| clean_stem(dir))
            .find(|dir| looks_like_person_name(first_author(dir)));
    }
    if fields.position.is_none() {
        fields.position = VOLUME_MARKER.captures(&stem).map(|caps| caps[1].to_string());
    }

    let metadata = RawMetadata {
        source: Source::Filename,
        title: non_empty(fields.title.as_deref()),
        author: non_empty(fields.author.as_deref().map(first_author)),
        narrator: fields.narrator,
        series: non_empty(fields.series.as_deref()),
        series_position: non_empty(fields.position.as_deref()),
        duration: None,
        format: non_empty(path.extension().and_then(OsStr::to_str)).map(|ext| ext.to_ascii_lowercase()),
    };
    (metadata, Some(rule))
}
