//! Embedded tag reading.

use crate::consts::{NARRATOR_COMMENT, SERIES_WITH_POSITION};
use crate::error::{ErrorKind, Result};
use crate::models::{RawMetadata, Source, StreamInfo, TagReading, TagStatus, non_empty};
use exn::ResultExt;
use lofty::file::{AudioFile, FileType, TaggedFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

/// Custom item keys audiobook taggers use for the narrator. Compared
/// case-insensitively, and also against the last `:`-separated segment so
/// MP4 freeform atoms (`----:com.apple.iTunes:NARRATOR`) match.
const NARRATOR_KEYS: [&str; 3] = ["NARRATOR", "©nrt", "NARRATEDBY"];
const SERIES_KEYS: [&str; 3] = ["SERIES", "MVNM", "©mvn"];
const SERIES_POSITION_KEYS: [&str; 5] = ["SERIES-PART", "SERIES_PART", "SERIESPART", "MVIN", "©mvi"];

/// Read the embedded metadata and stream properties of one audio file.
///
/// The container type is detected from the file's content, falling back to
/// its extension, so a mislabeled file is still read correctly.
///
/// A readable file without tags is not an error: the reading has
/// [`TagStatus::NoEmbeddedMetadata`] and all-absent tag fields, while
/// duration and format still come from the stream properties.
///
/// # Errors
///
/// [`ErrorKind::UnreadableContainer`] if the file can't be opened or parsed.
#[instrument(level = "debug", fields(path = %path.display()))]
pub fn read_tags(path: &Path) -> Result<TagReading> {
    let unreadable = || ErrorKind::UnreadableContainer(path.to_path_buf());
    let tagged = Probe::open(path)
        .or_raise(unreadable)?
        .guess_file_type()
        .or_raise(unreadable)?
        .read()
        .or_raise(unreadable)?;
    let stream = stream_info(&tagged);
    let tag = tagged.primary_tag().or_else(|| tagged.first_tag()).filter(|tag| tag.items().next().is_some());
    let (mut metadata, status) = match tag {
        Some(tag) => (metadata_from_tag(tag), TagStatus::Tagged),
        None => (RawMetadata::absent(Source::Tag), TagStatus::NoEmbeddedMetadata),
    };
    metadata.duration = stream.duration;
    metadata.format = stream.format.clone();
    if status == TagStatus::NoEmbeddedMetadata {
        tracing::debug!(path = %path.display(), "No embedded metadata");
    }
    Ok(TagReading { metadata, stream, status })
}

fn format_name(file_type: &FileType) -> String {
    match file_type {
        FileType::Aac => "aac".to_string(),
        FileType::Aiff => "aiff".to_string(),
        FileType::Ape => "ape".to_string(),
        FileType::Flac => "flac".to_string(),
        FileType::Mpeg => "mp3".to_string(),
        FileType::Mp4 => "mp4".to_string(),
        FileType::Mpc => "mpc".to_string(),
        FileType::Opus => "opus".to_string(),
        FileType::Vorbis => "ogg".to_string(),
        FileType::Speex => "speex".to_string(),
        FileType::Wav => "wav".to_string(),
        FileType::WavPack => "wavpack".to_string(),
        other => format!("{other:?}").to_ascii_lowercase(),
    }
}

fn stream_info(tagged: &TaggedFile) -> StreamInfo {
    let properties = tagged.properties();
    StreamInfo {
        format: Some(format_name(&tagged.file_type())),
        // Some containers report zero rather than nothing.
        duration: Some(properties.duration()).filter(|d| !d.is_zero()),
        overall_bitrate: properties.overall_bitrate(),
        audio_bitrate: properties.audio_bitrate(),
        sample_rate: properties.sample_rate(),
        channels: properties.channels(),
        bit_depth: properties.bit_depth(),
    }
}

/// Look up a custom (non-standard) item by any of several key spellings.
fn custom_item<'a>(tag: &'a Tag, keys: &[&str]) -> Option<&'a str> {
    tag.items().find_map(|item| {
        let ItemKey::Unknown(key) = item.key() else {
            return None;
        };
        let short = key.rsplit(':').next().unwrap_or(key);
        keys.iter()
            .any(|k| k.eq_ignore_ascii_case(key) || k.eq_ignore_ascii_case(short))
            .then(|| item.value().text())
            .flatten()
    })
}

/// Split a series value like `Foo #1` or `Foo, Book 2` into name and position.
fn split_series(series: &str) -> (String, Option<String>) {
    match SERIES_WITH_POSITION.captures(series) {
        Some(caps) => (caps[1].trim().to_string(), Some(caps[2].to_string())),
        None => (series.trim().to_string(), None),
    }
}

/// Map one generic lofty tag onto the audiobook fields.
pub(crate) fn metadata_from_tag(tag: &Tag) -> RawMetadata {
    let title = non_empty(tag.title().as_deref());
    let author = non_empty(tag.artist().as_deref()).or_else(|| non_empty(tag.get_string(&ItemKey::AlbumArtist)));
    let comment = tag.comment();
    let narrator = non_empty(custom_item(tag, &NARRATOR_KEYS))
        .or_else(|| non_empty(tag.get_string(&ItemKey::Composer)))
        .or_else(|| {
            let comment = comment.as_deref()?;
            non_empty(NARRATOR_COMMENT.captures(comment).and_then(|caps| caps.get(1)).map(|m| m.as_str()))
        });
    let series_raw =
        non_empty(custom_item(tag, &SERIES_KEYS)).or_else(|| non_empty(tag.get_string(&ItemKey::ContentGroup)));
    let (series, embedded_position) = match series_raw {
        Some(raw) => {
            let (name, position) = split_series(&raw);
            (non_empty(Some(&name)), position)
        },
        None => (None, None),
    };
    let series_position = non_empty(custom_item(tag, &SERIES_POSITION_KEYS)).or(embedded_position);
    RawMetadata {
        source: Source::Tag,
        title,
        author,
        narrator,
        series,
        series_position,
        duration: None::<Duration>,
        format: None,
    }
}
