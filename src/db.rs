//! Binary database codec for the metadata store.
//!
//! Layout: a 7-byte ASCII magic, a three-integer version triple, then record
//! blocks back to back until EOF. Each block starts with nine little-endian
//! u16 lengths (filename plus the eight text fields, zero meaning absent),
//! followed by the raw UTF-8 bytes of each present string in order, a u32
//! length-in-seconds, an i64 unix timestamp and a one-byte URL flag. The
//! format is strictly positional; a version mismatch is a hard failure with
//! no migration path.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use log::{debug, info};
use thiserror::Error;

use crate::record::{MetaField, MetaRecord};

pub const DB_MAGIC: &[u8; 7] = b"tunedck";
pub const DB_VERSION: [u32; 3] = [1, 0, 0];

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("not a tunedeck database (bad magic)")]
    BadMagic,
    #[error("unsupported database version {found:?}, expected {expected:?}")]
    VersionMismatch { found: [u32; 3], expected: [u32; 3] },
    #[error("record field is not valid UTF-8")]
    InvalidUtf8,
    #[error("record field exceeds the 65535-byte field limit")]
    FieldTooLong,
    #[error("truncated record block")]
    Truncated,
}

/// Reads the whole database at `path`, verifying magic and version first.
pub fn read_database(path: &Path) -> Result<Vec<MetaRecord>, DatabaseError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    read_header(&mut reader)?;

    let mut records = Vec::new();
    while let Some(record) = read_record(&mut reader)? {
        records.push(record);
    }
    info!("loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Rewrites the database at `path` from `records`.
pub fn write_database(path: &Path, records: &[MetaRecord]) -> Result<(), DatabaseError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_header(&mut writer)?;
    for record in records {
        write_record(&mut writer, record)?;
    }
    writer.flush()?;
    debug!("wrote {} records to {}", records.len(), path.display());
    Ok(())
}

pub fn write_header(writer: &mut impl Write) -> Result<(), DatabaseError> {
    writer.write_all(DB_MAGIC)?;
    for part in DB_VERSION {
        writer.write_all(&part.to_le_bytes())?;
    }
    Ok(())
}

pub fn read_header(reader: &mut impl Read) -> Result<(), DatabaseError> {
    let mut magic = [0u8; 7];
    reader
        .read_exact(&mut magic)
        .map_err(|_| DatabaseError::BadMagic)?;
    if &magic != DB_MAGIC {
        return Err(DatabaseError::BadMagic);
    }

    let mut found = [0u32; 3];
    for part in found.iter_mut() {
        *part = read_u32(reader).map_err(|_| DatabaseError::Truncated)?;
    }
    if found != DB_VERSION {
        return Err(DatabaseError::VersionMismatch {
            found,
            expected: DB_VERSION,
        });
    }
    Ok(())
}

/// Serializes one record block.
pub fn write_record(writer: &mut impl Write, record: &MetaRecord) -> Result<(), DatabaseError> {
    write_length(writer, record.filename.len())?;
    for field in MetaField::TEXT_FIELDS {
        let len = record.field(field).map_or(0, str::len);
        write_length(writer, len)?;
    }

    writer.write_all(record.filename.as_bytes())?;
    for field in MetaField::TEXT_FIELDS {
        if let Some(value) = record.field(field) {
            writer.write_all(value.as_bytes())?;
        }
    }

    writer.write_all(&record.length_seconds.to_le_bytes())?;
    writer.write_all(&record.last_updated.to_le_bytes())?;
    writer.write_all(&[u8::from(record.is_url)])?;
    Ok(())
}

/// Deserializes one record block, or `None` at a clean EOF.
pub fn read_record(reader: &mut impl Read) -> Result<Option<MetaRecord>, DatabaseError> {
    let filename_len = match try_read_u16(reader)? {
        Some(len) => len as usize,
        None => return Ok(None),
    };

    let mut field_lens = [0usize; 8];
    for len in field_lens.iter_mut() {
        *len = read_u16(reader)? as usize;
    }

    let filename = read_string(reader, filename_len)?;
    let mut record = MetaRecord::new(filename);

    for (field, len) in MetaField::TEXT_FIELDS.iter().zip(field_lens) {
        if len == 0 {
            continue;
        }
        let value = Some(read_string(reader, len)?);
        match field {
            MetaField::Artist => record.artist = value,
            MetaField::Album => record.album = value,
            MetaField::Title => record.title = value,
            MetaField::Track => record.track = value,
            MetaField::Year => record.year = value,
            MetaField::Genre => record.genre = value,
            MetaField::Length => record.length_text = value,
            MetaField::Comment => record.comment = value,
            MetaField::Filename => unreachable!("filename is not a text field"),
        }
    }

    record.length_seconds = read_u32(reader)?;
    record.last_updated = read_i64(reader)?;
    record.is_url = read_u8(reader)? != 0;
    Ok(Some(record))
}

fn write_length(writer: &mut impl Write, len: usize) -> Result<(), DatabaseError> {
    let len = u16::try_from(len).map_err(|_| DatabaseError::FieldTooLong)?;
    writer.write_all(&len.to_le_bytes())?;
    Ok(())
}

fn read_string(reader: &mut impl Read, len: usize) -> Result<String, DatabaseError> {
    let mut bytes = vec![0u8; len];
    reader
        .read_exact(&mut bytes)
        .map_err(|_| DatabaseError::Truncated)?;
    String::from_utf8(bytes).map_err(|_| DatabaseError::InvalidUtf8)
}

/// Distinguishes "no more records" from a torn block: EOF on the first two
/// bytes of a block is a clean end of file.
fn try_read_u16(reader: &mut impl Read) -> Result<Option<u16>, DatabaseError> {
    let mut bytes = [0u8; 2];
    match reader.read_exact(&mut bytes) {
        Ok(()) => Ok(Some(u16::from_le_bytes(bytes))),
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => Ok(None),
        Err(err) => Err(DatabaseError::Io(err)),
    }
}

fn read_u16(reader: &mut impl Read) -> Result<u16, DatabaseError> {
    let mut bytes = [0u8; 2];
    reader
        .read_exact(&mut bytes)
        .map_err(|_| DatabaseError::Truncated)?;
    Ok(u16::from_le_bytes(bytes))
}

fn read_u32(reader: &mut impl Read) -> Result<u32, DatabaseError> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_i64(reader: &mut impl Read) -> Result<i64, DatabaseError> {
    let mut bytes = [0u8; 8];
    reader
        .read_exact(&mut bytes)
        .map_err(|_| DatabaseError::Truncated)?;
    Ok(i64::from_le_bytes(bytes))
}

fn read_u8(reader: &mut impl Read) -> Result<u8, DatabaseError> {
    let mut byte = [0u8; 1];
    reader
        .read_exact(&mut byte)
        .map_err(|_| DatabaseError::Truncated)?;
    Ok(byte[0])
}
