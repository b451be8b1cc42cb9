use crate::models::{Field, RawMetadata, ResolvedMetadata, SeriesPosition, Source, non_empty};
use std::time::Duration;

/// First present value in precedence order, with the source that supplied it.
fn pick<T>(candidates: [(Option<T>, Source); 2]) -> (Option<T>, Option<Source>) {
    candidates
        .into_iter()
        .find_map(|(value, source)| value.map(|value| (Some(value), Some(source))))
        .unwrap_or((None, None))
}

fn text(raw: &RawMetadata, field: fn(&RawMetadata) -> &Option<String>) -> (Option<String>, Source) {
    (non_empty(field(raw).as_deref()), raw.source)
}

/// Merge the tag and filename readings of one file.
///
/// Each field takes the tag value when it is present and non-blank, then the
/// filename value, then stays absent. The series position is the first value
/// that parses as a number, so a tag position like `Bonus` gives way to a
/// numeric filename position. A zero duration counts as absent.
///
/// The provenance map names the winning source for every present field,
/// including when both sources agree.
pub fn resolve(tag: &RawMetadata, filename: &RawMetadata) -> ResolvedMetadata {
    let sources = [tag, filename];
    let mut resolved = ResolvedMetadata::default();

    let (title, source) = pick(sources.map(|raw| text(raw, |r| &r.title)));
    resolved.title = title;
    resolved.set_source(Field::Title, source);

    let (author, source) = pick(sources.map(|raw| text(raw, |r| &r.author)));
    resolved.author = author;
    resolved.set_source(Field::Author, source);

    let (narrator, source) = pick(sources.map(|raw| text(raw, |r| &r.narrator)));
    resolved.narrator = narrator;
    resolved.set_source(Field::Narrator, source);

    let (series, source) = pick(sources.map(|raw| text(raw, |r| &r.series)));
    resolved.series = series;
    resolved.set_source(Field::Series, source);

    let (position, source) = pick(sources.map(|raw| {
        let position = raw.series_position.as_deref().and_then(SeriesPosition::parse);
        (position, raw.source)
    }));
    resolved.series_position = position;
    resolved.set_source(Field::SeriesPosition, source);

    let (duration, source) = pick(sources.map(|raw| (raw.duration.filter(|d| *d != Duration::ZERO), raw.source)));
    resolved.duration = duration;
    resolved.set_source(Field::Duration, source);

    let (format, source) = pick(sources.map(|raw| text(raw, |r| &r.format)));
    resolved.format = format.map(|f| f.to_ascii_lowercase());
    resolved.set_source(Field::Format, source);

    resolved
}
