//! Generated audio files for tests.
//!
//! Files are short mono PCM WAVs, optionally carrying an ID3v2 tag. The
//! sample pattern depends on a seed, so two fixtures with different seeds
//! never share content while the same seed reproduces identical bytes.

use lofty::config::WriteOptions;
use lofty::id3::v2::Id3v2Tag;
use lofty::tag::{Accessor, ItemKey, Tag, TagExt, TagType};
use std::io::{Error as IoError, Result as IoResult};
use std::path::Path;

pub const SAMPLE_RATE: u32 = 8_000;

/// Tag values to embed; `None` fields are left out of the tag entirely.
#[derive(Debug, Clone, Default)]
pub struct FixtureTags<'a> {
    pub title: Option<&'a str>,
    pub artist: Option<&'a str>,
    pub album_artist: Option<&'a str>,
    pub composer: Option<&'a str>,
    pub grouping: Option<&'a str>,
    pub comment: Option<&'a str>,
    /// User-defined text frames (`TXXX`), as `(description, value)`.
    pub custom: &'a [(&'a str, &'a str)],
}

#[derive(Debug, Clone)]
pub struct AudioFixture<'a> {
    seconds: u32,
    seed: u16,
    tags: Option<FixtureTags<'a>>,
}

impl<'a> AudioFixture<'a> {
    pub fn seconds(seconds: u32) -> Self {
        Self {
            seconds,
            seed: 0,
            tags: None,
        }
    }

    pub fn seed(mut self, seed: u16) -> Self {
        self.seed = seed;
        self
    }

    pub fn tags(mut self, tags: FixtureTags<'a>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn write(&self, path: &Path) -> IoResult<()> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).map_err(IoError::other)?;
        let step = u32::from(self.seed) + 1;
        for i in 0..SAMPLE_RATE * self.seconds {
            let sample = (i.wrapping_mul(step).wrapping_mul(31) % 2_000) as i16 - 1_000;
            writer.write_sample(sample).map_err(IoError::other)?;
        }
        writer.finalize().map_err(IoError::other)?;
        match &self.tags {
            Some(tags) => write_tags(path, tags),
            None => Ok(()),
        }
    }
}

fn write_tags(path: &Path, tags: &FixtureTags<'_>) -> IoResult<()> {
    let mut tag = Tag::new(TagType::Id3v2);
    if let Some(title) = tags.title {
        tag.set_title(title.to_string());
    }
    if let Some(artist) = tags.artist {
        tag.set_artist(artist.to_string());
    }
    if let Some(comment) = tags.comment {
        tag.set_comment(comment.to_string());
    }
    for (key, value) in [
        (ItemKey::AlbumArtist, tags.album_artist),
        (ItemKey::Composer, tags.composer),
        (ItemKey::ContentGroup, tags.grouping),
    ] {
        if let Some(value) = value {
            tag.insert_text(key, value.to_string());
        }
    }
    let mut id3 = Id3v2Tag::from(tag);
    for (description, value) in tags.custom {
        id3.insert_user_text(description.to_string(), value.to_string());
    }
    id3.save_to_path(path, WriteOptions::default()).map_err(IoError::other)
}
