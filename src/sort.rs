//! Multi-field sort descriptor and record comparator.

use std::cmp::Ordering;

use thiserror::Error;

use crate::record::{MetaField, MetaRecord};

pub const MAX_SORT_FIELDS: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SortParseError {
    #[error("unknown sort field '{0}'")]
    UnknownField(String),
    #[error("too many sort fields (maximum is {MAX_SORT_FIELDS})")]
    TooManyFields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SortKey {
    field: MetaField,
    descending: bool,
}

/// Ordered list of sort fields, each ascending or descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    keys: Vec<SortKey>,
}

impl Default for SortOrder {
    /// artist, album, track, title, all ascending.
    fn default() -> SortOrder {
        let keys = [
            MetaField::Artist,
            MetaField::Album,
            MetaField::Track,
            MetaField::Title,
        ]
        .into_iter()
        .map(|field| SortKey {
            field,
            descending: false,
        })
        .collect();
        SortOrder { keys }
    }
}

impl SortOrder {
    /// Parses a comma-separated field list; a `-` prefix flips that field to
    /// descending.
    pub fn parse(raw: &str) -> Result<SortOrder, SortParseError> {
        let mut keys = Vec::new();
        for part in raw.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (name, descending) = match part.strip_prefix('-') {
                Some(rest) => (rest, true),
                None => (part, false),
            };
            let field = MetaField::from_name(name)
                .ok_or_else(|| SortParseError::UnknownField(name.to_string()))?;
            if keys.len() == MAX_SORT_FIELDS {
                return Err(SortParseError::TooManyFields);
            }
            keys.push(SortKey { field, descending });
        }
        Ok(SortOrder { keys })
    }

    /// Compares two records field by field. A record missing a field value
    /// sorts after one that has it (ascending); both-missing is a tie and the
    /// comparison moves on to the next field.
    pub fn compare(&self, a: &MetaRecord, b: &MetaRecord) -> Ordering {
        for key in &self.keys {
            let ordering = match (a.field(key.field), b.field(key.field)) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(left), Some(right)) => left
                    .to_lowercase()
                    .cmp(&right.to_lowercase()),
            };
            if ordering != Ordering::Equal {
                return if key.descending {
                    ordering.reverse()
                } else {
                    ordering
                };
            }
        }
        Ordering::Equal
    }
}
