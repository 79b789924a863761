//! Column-layout descriptor used to render records as fixed-width rows.

use std::fmt::Write as _;

use thiserror::Error;

use crate::record::{MetaField, MetaRecord};

pub const MAX_DISPLAY_FIELDS: usize = 8;

/// The original layout shown before any `display` command runs.
const DEFAULT_LAYOUT: &str = "artist.20,album.20,title.30,track.4,year.4,genre.10,length.8";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DisplayParseError {
    #[error("unknown display field '{0}'")]
    UnknownField(String),
    #[error("display field '{0}' is missing a '.WIDTH' suffix")]
    MissingWidth(String),
    #[error("display field '{0}' has an invalid width (must be a positive integer)")]
    InvalidWidth(String),
    #[error("too many display fields (maximum is {MAX_DISPLAY_FIELDS})")]
    TooManyFields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Column {
    field: MetaField,
    width: usize,
    right_aligned: bool,
}

/// Ordered `(field, width, alignment)` triples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLayout {
    columns: Vec<Column>,
    raw: String,
}

impl Default for DisplayLayout {
    fn default() -> DisplayLayout {
        DisplayLayout::parse(DEFAULT_LAYOUT).expect("default layout parses")
    }
}

impl DisplayLayout {
    /// Parses comma-separated `[-]FIELD.WIDTH` tokens; `-` means
    /// right-aligned.
    pub fn parse(raw: &str) -> Result<DisplayLayout, DisplayParseError> {
        let mut columns = Vec::new();
        for part in raw.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (body, right_aligned) = match part.strip_prefix('-') {
                Some(rest) => (rest, true),
                None => (part, false),
            };
            let (name, width_text) = body
                .split_once('.')
                .ok_or_else(|| DisplayParseError::MissingWidth(body.to_string()))?;
            let field = MetaField::from_name(name)
                .ok_or_else(|| DisplayParseError::UnknownField(name.to_string()))?;
            let width: usize = width_text
                .parse()
                .ok()
                .filter(|&width| width > 0)
                .ok_or_else(|| DisplayParseError::InvalidWidth(name.to_string()))?;
            if columns.len() == MAX_DISPLAY_FIELDS {
                return Err(DisplayParseError::TooManyFields);
            }
            columns.push(Column {
                field,
                width,
                right_aligned,
            });
        }
        Ok(DisplayLayout {
            columns,
            raw: raw.to_string(),
        })
    }

    /// The literal description string, as typed.
    pub fn describe(&self) -> &str {
        &self.raw
    }

    /// Total row width: each column plus one separating space.
    pub fn total_width(&self) -> usize {
        self.columns.iter().map(|column| column.width + 1).sum()
    }

    /// Renders one record as a space-separated row, padding or truncating
    /// each cell to its column width.
    pub fn render(&self, record: &MetaRecord) -> String {
        let mut row = String::with_capacity(self.total_width());
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                row.push(' ');
            }
            let value = record.field(column.field).unwrap_or("");
            let cell: String = value.chars().take(column.width).collect();
            let pad = column.width - cell.chars().count();
            if column.right_aligned {
                let _ = write!(row, "{:pad$}{}", "", cell, pad = pad);
            } else {
                let _ = write!(row, "{}{:pad$}", cell, "", pad = pad);
            }
        }
        row
    }
}
