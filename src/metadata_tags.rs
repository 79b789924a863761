//! Tag extraction backed by `lofty`.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use lofty::config::{ParseOptions, ParsingMode, WriteOptions};
use lofty::file::{AudioFile, TaggedFile, TaggedFileExt};
use lofty::prelude::Accessor;
use lofty::probe::Probe;
use lofty::read_from_path;
use lofty::tag::{ItemKey, Tag};
use log::debug;

use crate::record::MetaRecord;

fn metadata_parse_options(parsing_mode: ParsingMode, max_junk_bytes: usize) -> ParseOptions {
    ParseOptions::new()
        .read_properties(true)
        .read_cover_art(false)
        .parsing_mode(parsing_mode)
        .max_junk_bytes(max_junk_bytes)
}

fn read_tagged_file(path: &Path) -> Option<TaggedFile> {
    let primary_options = metadata_parse_options(ParsingMode::BestAttempt, 1024);
    let relaxed_options = metadata_parse_options(ParsingMode::Relaxed, 64 * 1024);

    match Probe::open(path) {
        Ok(probe) => match probe.options(primary_options).read() {
            Ok(tagged_file) => return Some(tagged_file),
            Err(primary_error) => {
                debug!(
                    "tag read primary parse failed for {}: {}",
                    path.display(),
                    primary_error
                );
            }
        },
        Err(open_error) => {
            debug!("tag read could not open {}: {}", path.display(), open_error);
            return None;
        }
    }

    match Probe::open(path) {
        Ok(probe) => match probe.options(relaxed_options).read() {
            Ok(tagged_file) => Some(tagged_file),
            Err(relaxed_error) => {
                debug!(
                    "tag read relaxed parse failed for {}: {}",
                    path.display(),
                    relaxed_error
                );
                None
            }
        },
        Err(_) => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn tag_year(tag: &Tag) -> Option<String> {
    if let Some(year) = tag.year() {
        return Some(year.to_string());
    }
    // Fall back to the leading four digits of a recording date.
    let date = tag.get_string(&ItemKey::RecordingDate)?;
    let year: String = date.chars().take_while(|ch| ch.is_ascii_digit()).collect();
    if year.len() == 4 {
        Some(year)
    } else {
        None
    }
}

/// `M:SS` rendering used for the length column.
pub fn format_length(total_seconds: u32) -> String {
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Extracts a metadata record from an audio file.
///
/// Returns `None` when the file carries no usable tags at all; that is an
/// expected negative, not an error. Extracted text is sanitized before the
/// record is handed back.
pub fn extract_record(path: &Path) -> Option<MetaRecord> {
    let mut record = extract_record_raw(path)?;
    record.sanitize();
    Some(record)
}

/// Extraction without the sanitize pass; the `check` driver uses this to
/// show raw against sanitized metadata.
pub fn extract_record_raw(path: &Path) -> Option<MetaRecord> {
    let tagged_file = read_tagged_file(path)?;
    let tag = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())?;

    let mut record = MetaRecord::new(path.to_string_lossy().into_owned());
    record.artist = non_empty(tag.artist().map(|v| v.into_owned()));
    record.album = non_empty(tag.album().map(|v| v.into_owned()));
    record.title = non_empty(tag.title().map(|v| v.into_owned()));
    record.track = tag.track().map(|track| track.to_string());
    record.year = tag_year(tag);
    record.genre = non_empty(tag.genre().map(|v| v.into_owned()));
    record.comment = non_empty(tag.comment().map(|v| v.into_owned()));

    if record.artist.is_none()
        && record.album.is_none()
        && record.title.is_none()
        && record.track.is_none()
        && record.year.is_none()
        && record.genre.is_none()
        && record.comment.is_none()
    {
        debug!("no usable tags in {}", path.display());
        return None;
    }

    let seconds = tagged_file.properties().duration().as_secs();
    record.length_seconds = u32::try_from(seconds).unwrap_or(u32::MAX);
    record.length_text = Some(format_length(record.length_seconds));
    record.last_updated = unix_now();
    Some(record)
}

/// Tag values to write back to a file; `None` leaves that tag untouched.
#[derive(Debug, Default, Clone)]
pub struct TagUpdates {
    pub artist: Option<String>,
    pub album: Option<String>,
    pub title: Option<String>,
    pub track: Option<u32>,
    pub year: Option<u32>,
    pub genre: Option<String>,
    pub comment: Option<String>,
}

impl TagUpdates {
    pub fn is_empty(&self) -> bool {
        self.artist.is_none()
            && self.album.is_none()
            && self.title.is_none()
            && self.track.is_none()
            && self.year.is_none()
            && self.genre.is_none()
            && self.comment.is_none()
    }
}

/// Writes the given tag values into the file's primary tag, creating one if
/// the file has none.
pub fn write_tags(path: &Path, updates: &TagUpdates) -> Result<(), String> {
    let mut tagged_file =
        read_from_path(path).map_err(|error| format!("failed to read tags: {error}"))?;
    let tag_type = tagged_file.primary_tag_type();
    if tagged_file.tag(tag_type).is_none() {
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    let tag = tagged_file
        .tag_mut(tag_type)
        .ok_or_else(|| format!("no writable tag available for {tag_type:?}"))?;

    if let Some(artist) = &updates.artist {
        tag.set_artist(artist.clone());
    }
    if let Some(album) = &updates.album {
        tag.set_album(album.clone());
    }
    if let Some(title) = &updates.title {
        tag.set_title(title.clone());
    }
    if let Some(track) = updates.track {
        tag.set_track(track);
    }
    if let Some(year) = updates.year {
        tag.set_year(year);
    }
    if let Some(genre) = &updates.genre {
        tag.set_genre(genre.clone());
    }
    if let Some(comment) = &updates.comment {
        tag.set_comment(comment.clone());
    }

    tagged_file
        .save_to_path(path, WriteOptions::default())
        .map_err(|error| format!("failed to write tags: {error}"))
}

pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}
