//! Metadata record model shared by the store, playlists and descriptors.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared handle to a record. The store (the Library view's backing vector)
/// owns the canonical clones; playlists and history changesets hold further
/// clones, so a record stays alive as long as anything still references it.
pub type RecordRef = Rc<RefCell<MetaRecord>>;

/// Wraps a record for sharing between the store and playlists.
pub fn share(record: MetaRecord) -> RecordRef {
    Rc::new(RefCell::new(record))
}

/// Field names understood by the query, sort and display descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaField {
    Artist,
    Album,
    Title,
    Track,
    Year,
    Genre,
    Length,
    Comment,
    Filename,
}

impl MetaField {
    /// The eight tag-derived text fields, in their on-disk order.
    pub const TEXT_FIELDS: [MetaField; 8] = [
        MetaField::Artist,
        MetaField::Album,
        MetaField::Title,
        MetaField::Track,
        MetaField::Year,
        MetaField::Genre,
        MetaField::Length,
        MetaField::Comment,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MetaField::Artist => "artist",
            MetaField::Album => "album",
            MetaField::Title => "title",
            MetaField::Track => "track",
            MetaField::Year => "year",
            MetaField::Genre => "genre",
            MetaField::Length => "length",
            MetaField::Comment => "comment",
            MetaField::Filename => "filename",
        }
    }

    pub fn from_name(name: &str) -> Option<MetaField> {
        match name {
            "artist" => Some(MetaField::Artist),
            "album" => Some(MetaField::Album),
            "title" => Some(MetaField::Title),
            "track" => Some(MetaField::Track),
            "year" => Some(MetaField::Year),
            "genre" => Some(MetaField::Genre),
            "length" => Some(MetaField::Length),
            "comment" => Some(MetaField::Comment),
            "filename" => Some(MetaField::Filename),
            _ => None,
        }
    }
}

impl fmt::Display for MetaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One catalogued audio file or URL.
///
/// `filename` is the unique key within the store (absolute path or URL) and
/// is never empty once constructed. The eight text attributes are absent
/// (`None`) when the source had no such tag; empty strings are normalized to
/// absent before persisting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaRecord {
    pub filename: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub title: Option<String>,
    pub track: Option<String>,
    pub year: Option<String>,
    pub genre: Option<String>,
    pub length_text: Option<String>,
    pub comment: Option<String>,
    pub length_seconds: u32,
    pub last_updated: i64,
    pub is_url: bool,
}

impl MetaRecord {
    /// Stub record: filename only, every attribute absent.
    pub fn new(filename: impl Into<String>) -> MetaRecord {
        MetaRecord {
            filename: filename.into(),
            ..MetaRecord::default()
        }
    }

    /// Read access to a text field by descriptor name.
    pub fn field(&self, field: MetaField) -> Option<&str> {
        match field {
            MetaField::Artist => self.artist.as_deref(),
            MetaField::Album => self.album.as_deref(),
            MetaField::Title => self.title.as_deref(),
            MetaField::Track => self.track.as_deref(),
            MetaField::Year => self.year.as_deref(),
            MetaField::Genre => self.genre.as_deref(),
            MetaField::Length => self.length_text.as_deref(),
            MetaField::Comment => self.comment.as_deref(),
            MetaField::Filename => Some(&self.filename),
        }
    }

    fn field_mut(&mut self, field: MetaField) -> Option<&mut Option<String>> {
        match field {
            MetaField::Artist => Some(&mut self.artist),
            MetaField::Album => Some(&mut self.album),
            MetaField::Title => Some(&mut self.title),
            MetaField::Track => Some(&mut self.track),
            MetaField::Year => Some(&mut self.year),
            MetaField::Genre => Some(&mut self.genre),
            MetaField::Length => Some(&mut self.length_text),
            MetaField::Comment => Some(&mut self.comment),
            MetaField::Filename => None,
        }
    }

    /// Replaces every character that is not alphanumeric, punctuation or a
    /// space with `?` across all text fields. Tag data can carry terminal
    /// control sequences; this must run before records are persisted or
    /// displayed.
    pub fn sanitize(&mut self) {
        for field in MetaField::TEXT_FIELDS {
            if let Some(slot) = self.field_mut(field) {
                if let Some(value) = slot.as_mut() {
                    *value = sanitize_text(value);
                }
            }
        }
    }
}

fn sanitize_text(value: &str) -> String {
    value
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || ch.is_ascii_punctuation() || ch == ' ' {
                ch
            } else {
                '?'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_has_only_a_filename() {
        let record = MetaRecord::new("/music/a.mp3");
        assert_eq!(record.filename, "/music/a.mp3");
        for field in MetaField::TEXT_FIELDS {
            assert_eq!(record.field(field), None);
        }
        assert_eq!(record.length_seconds, 0);
        assert!(!record.is_url);
    }

    #[test]
    fn field_names_round_trip() {
        for field in MetaField::TEXT_FIELDS {
            assert_eq!(MetaField::from_name(field.name()), Some(field));
        }
        assert_eq!(MetaField::from_name("filename"), Some(MetaField::Filename));
        assert_eq!(MetaField::from_name("bitrate"), None);
    }

    #[test]
    fn sanitize_replaces_control_characters() {
        let mut record = MetaRecord::new("/music/a.mp3");
        record.title = Some("Good \x1b[31mTitle\x07".to_string());
        record.comment = Some("plain, text!".to_string());
        record.sanitize();
        assert_eq!(record.title.as_deref(), Some("Good ?[31mTitle?"));
        assert_eq!(record.comment.as_deref(), Some("plain, text!"));
    }

    #[test]
    fn sanitize_keeps_unicode_letters() {
        let mut record = MetaRecord::new("/music/b.mp3");
        record.artist = Some("Björk".to_string());
        record.sanitize();
        assert_eq!(record.artist.as_deref(), Some("Björk"));
    }
}
