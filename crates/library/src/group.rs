//! Version grouping.
//!
//! Grouping needs the whole batch at once (two editions of the same work are
//! usually hashed by different workers), so it runs after every per-file task
//! has finished, single-threaded, and without touching the catalog.

use crate::models::{GroupKey, ScannedFile};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;

/// How a member relates to the rest of its group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "class")]
pub enum DedupClass {
    /// The first member seen with this content.
    Unique,
    /// Byte-identical to an earlier member; never written to the catalog.
    ExactDuplicate { of: PathBuf },
}
impl DedupClass {
    pub fn is_unique(&self) -> bool {
        matches!(self, Self::Unique)
    }
}
impl Display for DedupClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Unique => f.write_str("unique"),
            Self::ExactDuplicate { .. } => f.write_str("exact-duplicate-of-primary"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    pub file: ScannedFile,
    pub class: DedupClass,
}

/// Every file in one scan batch believed to be the same work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionGroup {
    pub key: GroupKey,
    /// In stable scan order.
    pub members: Vec<GroupMember>,
    primary: usize,
}
impl VersionGroup {
    /// `files` must be non-empty and in scan order.
    ///
    /// The first member with a complete key is the original of its content;
    /// every other member with the same fingerprint duplicates it.
    fn new(key: GroupKey, files: Vec<ScannedFile>) -> Self {
        let mut originals: HashMap<&str, &PathBuf> = HashMap::new();
        for file in &files {
            if GroupKey::new(&file.metadata).is_some() {
                originals.entry(file.fingerprint.digest.as_str()).or_insert(&file.path);
            }
        }
        for file in &files {
            originals.entry(file.fingerprint.digest.as_str()).or_insert(&file.path);
        }
        let originals: HashMap<String, PathBuf> =
            originals.into_iter().map(|(digest, path)| (digest.to_string(), path.clone())).collect();
        let members: Vec<GroupMember> = files
            .into_iter()
            .map(|file| {
                let class = match originals.get(&file.fingerprint.digest) {
                    Some(of) if *of != file.path => DedupClass::ExactDuplicate { of: of.clone() },
                    _ => DedupClass::Unique,
                };
                GroupMember { file, class }
            })
            .collect();
        let primary = members
            .iter()
            .enumerate()
            .filter(|(_, member)| member.class.is_unique())
            .min_by(|(_, a), (_, b)| precedence(&a.file, &b.file))
            .map_or(0, |(index, _)| index);
        Self { key, members, primary }
    }

    pub fn primary(&self) -> &GroupMember {
        &self.members[self.primary]
    }

    /// Distinct editions: one member per fingerprint.
    pub fn unique_members(&self) -> impl Iterator<Item = &GroupMember> {
        self.members.iter().filter(|m| m.class.is_unique())
    }

    pub fn duplicates(&self) -> usize {
        self.members.len() - self.unique_members().count()
    }

    /// Distinct editions whose durations disagree by more than `tolerance`
    /// (relative to the longest) probably aren't the same work after all.
    fn mismatch(&self, tolerance: f64) -> Option<MismatchAdvisory> {
        let editions: Vec<&GroupMember> = self.unique_members().collect();
        let durations: Vec<f64> = editions
            .iter()
            .filter_map(|m| m.file.metadata.duration)
            .map(|d| d.as_secs_f64())
            .collect();
        if durations.len() < 2 {
            return None;
        }
        let longest = durations.iter().copied().fold(f64::MIN, f64::max);
        let shortest = durations.iter().copied().fold(f64::MAX, f64::min);
        if longest <= 0.0 {
            return None;
        }
        let spread = (longest - shortest) / longest;
        (spread > tolerance).then(|| MismatchAdvisory {
            key: self.key.clone(),
            paths: editions.iter().map(|m| m.file.path.clone()).collect(),
            spread,
            reason: format!(
                "durations of {} distinct editions differ by {:.1}% (tolerance {:.1}%)",
                editions.len(),
                spread * 100.0,
                tolerance * 100.0
            ),
        })
    }
}

/// Richest metadata first, then longest, then lowest path.
fn precedence(a: &ScannedFile, b: &ScannedFile) -> Ordering {
    b.metadata
        .populated_fields()
        .cmp(&a.metadata.populated_fields())
        .then_with(|| b.metadata.duration.cmp(&a.metadata.duration))
        .then_with(|| a.path.cmp(&b.path))
}

/// A group whose editions might not really be the same work. Surfaced in the
/// scan report; the group is still written as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MismatchAdvisory {
    pub key: GroupKey,
    pub paths: Vec<PathBuf>,
    /// Relative difference between the longest and shortest edition.
    pub spread: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grouping {
    /// Ordered by key.
    pub groups: Vec<VersionGroup>,
    pub advisories: Vec<MismatchAdvisory>,
    /// Records without a title or author, in scan order.
    pub incomplete: Vec<PathBuf>,
}

/// Partition a scan batch into version groups.
///
/// The batch is put into path order first, so the outcome depends only on the
/// set of files and never on the order workers finished in.
pub fn group(mut files: Vec<ScannedFile>, mismatch_tolerance: f64) -> Grouping {
    files.sort_by(|a, b| a.path.cmp(&b.path));
    // Identical content is one edition whatever each copy's name says, so
    // every copy joins the group of the first complete copy.
    let mut content_keys: HashMap<String, GroupKey> = HashMap::new();
    for file in &files {
        if let Some(key) = GroupKey::new(&file.metadata) {
            content_keys.entry(file.fingerprint.digest.clone()).or_insert(key);
        }
    }
    let mut incomplete = Vec::new();
    let mut keyed: BTreeMap<GroupKey, Vec<ScannedFile>> = BTreeMap::new();
    for file in files {
        match content_keys.get(&file.fingerprint.digest) {
            Some(key) => keyed.entry(key.clone()).or_default().push(file),
            None => incomplete.push(file.path),
        }
    }
    let groups: Vec<VersionGroup> = keyed.into_iter().map(|(key, files)| VersionGroup::new(key, files)).collect();
    let advisories = groups.iter().filter_map(|g| g.mismatch(mismatch_tolerance)).collect();
    Grouping { groups, advisories, incomplete }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use shelf_extract::models::{Field, ResolvedMetadata, SeriesPosition, Source, StreamInfo};
    use shelf_storage::Fingerprint;
    use std::time::Duration;

    pub(crate) fn scanned(path: &str, title: &str, author: &str, seconds: u64, digest: &str) -> ScannedFile {
        let mut metadata = ResolvedMetadata {
            title: Some(title.to_string()),
            author: Some(author.to_string()),
            duration: Some(Duration::from_secs(seconds)),
            ..Default::default()
        };
        metadata.provenance.insert(Field::Title, Source::Tag);
        metadata.provenance.insert(Field::Author, Source::Tag);
        metadata.provenance.insert(Field::Duration, Source::Tag);
        ScannedFile {
            path: PathBuf::from(path),
            metadata,
            stream: StreamInfo::default(),
            fingerprint: Fingerprint::new(digest, 1024, 0),
        }
    }

    #[test]
    fn test_files_with_the_same_key_form_one_group() {
        let grouping = group(
            vec![
                scanned("/lib/b.mp3", "The Hobbit", "J. R. R. Tolkien", 100, "b"),
                scanned("/lib/a.m4b", "the hobbit", "j. r. r.  tolkien", 100, "a"),
                scanned("/lib/c.mp3", "Other", "Tolkien", 100, "c"),
            ],
            0.05,
        );
        assert_eq!(grouping.groups.len(), 2);
        let hobbit = grouping.groups.iter().find(|g| g.key.title == "the hobbit").unwrap();
        let paths: Vec<_> = hobbit.members.iter().map(|m| m.file.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("/lib/a.m4b"), PathBuf::from("/lib/b.mp3")]);
        assert!(hobbit.members.iter().all(|m| m.class.is_unique()));
        assert!(grouping.advisories.is_empty());
    }

    #[test]
    fn test_identical_content_is_an_exact_duplicate() {
        let grouping = group(
            vec![
                scanned("/lib/Foo 1 - Title.mp3", "Title", "Smith", 100, "same"),
                scanned("/lib/01 - Title.mp3", "Title", "Smith", 100, "same"),
            ],
            0.05,
        );
        let group = &grouping.groups[0];
        assert_eq!(group.members[0].class, DedupClass::Unique);
        assert_eq!(
            group.members[1].class,
            DedupClass::ExactDuplicate {
                of: PathBuf::from("/lib/01 - Title.mp3")
            }
        );
        assert_eq!(group.members[1].class.to_string(), "exact-duplicate-of-primary");
        assert_eq!(group.primary().file.path, PathBuf::from("/lib/01 - Title.mp3"));
        assert_eq!(group.duplicates(), 1);
    }

    #[test]
    fn test_identical_content_with_different_keys_is_one_edition() {
        let mut numbered = scanned("/lib/Smith/Foo 1 - Title.mp3", "Title", "Smith", 100, "same");
        numbered.metadata.series_position = SeriesPosition::new(1.0);
        let grouping = group(
            vec![scanned("/lib/Smith/Title.mp3", "Title", "Smith", 100, "same"), numbered],
            0.05,
        );
        assert_eq!(grouping.groups.len(), 1);
        let group = &grouping.groups[0];
        assert_eq!(group.key.position, SeriesPosition::new(1.0));
        let classes: Vec<_> = group.members.iter().map(|m| m.class.to_string()).collect();
        assert_eq!(classes, ["unique", "exact-duplicate-of-primary"]);
        assert_eq!(
            group.members[1].class,
            DedupClass::ExactDuplicate {
                of: PathBuf::from("/lib/Smith/Foo 1 - Title.mp3")
            }
        );
        assert_eq!(group.unique_members().count(), 1);
    }

    #[test]
    fn test_incomplete_copy_of_complete_content_is_a_duplicate() {
        let mut untitled = scanned("/lib/a/untitled.mp3", "", "Smith", 100, "same");
        untitled.metadata.title = None;
        let grouping = group(vec![untitled, scanned("/lib/b/Title.mp3", "Title", "Smith", 100, "same")], 0.05);
        assert!(grouping.incomplete.is_empty());
        let group = &grouping.groups[0];
        assert_eq!(group.members.len(), 2);
        assert_eq!(group.primary().file.path, PathBuf::from("/lib/b/Title.mp3"));
        assert_eq!(
            group.members[0].class,
            DedupClass::ExactDuplicate {
                of: PathBuf::from("/lib/b/Title.mp3")
            }
        );
    }

    #[test]
    fn test_primary_prefers_richer_metadata_then_duration_then_path() {
        let mut rich = scanned("/lib/z.mp3", "Title", "Smith", 100, "z");
        rich.metadata.narrator = Some("Kate Reading".to_string());
        rich.metadata.provenance.insert(Field::Narrator, Source::Tag);
        let grouping = group(
            vec![
                scanned("/lib/a.mp3", "Title", "Smith", 101, "a"),
                rich,
                scanned("/lib/m.mp3", "Title", "Smith", 102, "m"),
            ],
            0.05,
        );
        assert_eq!(grouping.groups[0].primary().file.path, PathBuf::from("/lib/z.mp3"));

        let grouping = group(
            vec![
                scanned("/lib/a.mp3", "Title", "Smith", 101, "a"),
                scanned("/lib/m.mp3", "Title", "Smith", 102, "m"),
            ],
            0.05,
        );
        assert_eq!(grouping.groups[0].primary().file.path, PathBuf::from("/lib/m.mp3"));

        let grouping = group(
            vec![
                scanned("/lib/m.mp3", "Title", "Smith", 100, "m"),
                scanned("/lib/a.mp3", "Title", "Smith", 100, "a"),
            ],
            0.05,
        );
        assert_eq!(grouping.groups[0].primary().file.path, PathBuf::from("/lib/a.mp3"));
    }

    #[test]
    fn test_grouping_ignores_input_order() {
        let files = vec![
            scanned("/lib/c.mp3", "Title", "Smith", 100, "c"),
            scanned("/lib/a.mp3", "Title", "Smith", 100, "a"),
            scanned("/lib/b.mp3", "Title", "Smith", 100, "a"),
            scanned("/lib/d.mp3", "Other", "Jones", 100, "d"),
        ];
        let mut reversed = files.clone();
        reversed.reverse();
        assert_eq!(group(files, 0.05), group(reversed, 0.05));
    }

    #[test]
    fn test_divergent_durations_raise_an_advisory() {
        let grouping = group(
            vec![
                scanned("/lib/a.mp3", "Title", "Smith", 1000, "a"),
                scanned("/lib/b.mp3", "Title", "Smith", 800, "b"),
            ],
            0.05,
        );
        assert_eq!(grouping.groups.len(), 1);
        let group = &grouping.groups[0];
        assert_eq!(group.members.len(), 2);
        assert!(group.members.iter().all(|m| m.class == DedupClass::Unique));
        assert_eq!(grouping.advisories.len(), 1);
        let advisory = &grouping.advisories[0];
        assert_eq!(advisory.key, group.key);
        assert_eq!(advisory.paths, vec![PathBuf::from("/lib/a.mp3"), PathBuf::from("/lib/b.mp3")]);
        assert!((advisory.spread - 0.2).abs() < 1e-9);
    }

    #[rstest::rstest]
    #[case(1000, 960, 0.05, false)]
    #[case(1000, 940, 0.05, true)]
    #[case(1000, 800, 0.25, false)]
    #[case(1000, 1000, 0.0, false)]
    fn test_advisory_tolerance(#[case] a: u64, #[case] b: u64, #[case] tolerance: f64, #[case] flagged: bool) {
        let grouping = group(
            vec![
                scanned("/lib/a.mp3", "Title", "Smith", a, "a"),
                scanned("/lib/b.mp3", "Title", "Smith", b, "b"),
            ],
            tolerance,
        );
        assert_eq!(!grouping.advisories.is_empty(), flagged);
    }

    #[test]
    fn test_exact_duplicates_never_raise_an_advisory() {
        let grouping = group(
            vec![
                scanned("/lib/a.mp3", "Title", "Smith", 1000, "same"),
                scanned("/lib/b.mp3", "Title", "Smith", 500, "same"),
            ],
            0.05,
        );
        assert!(grouping.advisories.is_empty());
    }

    #[test]
    fn test_unknown_durations_are_not_compared() {
        let mut unknown = scanned("/lib/b.mp3", "Title", "Smith", 0, "b");
        unknown.metadata.duration = None;
        let grouping = group(vec![scanned("/lib/a.mp3", "Title", "Smith", 1000, "a"), unknown], 0.05);
        assert!(grouping.advisories.is_empty());
    }

    #[test]
    fn test_series_position_splits_groups() {
        let mut one = scanned("/lib/1.mp3", "Title", "Smith", 100, "1");
        one.metadata.series_position = SeriesPosition::new(1.0);
        let mut two = scanned("/lib/2.mp3", "Title", "Smith", 100, "2");
        two.metadata.series_position = SeriesPosition::new(2.0);
        assert_eq!(group(vec![one, two], 0.05).groups.len(), 2);
    }

    #[test]
    fn test_incomplete_records_are_set_aside() {
        let mut untitled = scanned("/lib/x.mp3", "", "Smith", 100, "x");
        untitled.metadata.title = None;
        let grouping = group(vec![untitled, scanned("/lib/a.mp3", "Title", "Smith", 100, "a")], 0.05);
        assert_eq!(grouping.groups.len(), 1);
        assert_eq!(grouping.incomplete, vec![PathBuf::from("/lib/x.mp3")]);
    }
}
