//! Video creation time from QuickTime / ISO-BMFF atoms
//!
//! Two sources are understood:
//! - the movie header box (`moov/mvhd`), seconds since 1904-01-01 UTC,
//!   read with the `mp4` crate
//! - the QuickTime metadata item `com.apple.quicktime.creationdate`
//!   (`moov/meta/keys` + `moov/meta/ilst`), an ISO-8601 string with offset.
//!   `mp4` has no model of `mdta` keys, so these atoms are walked here.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::trace;

/// Key naming the capture date in QuickTime metadata
const CREATION_DATE_KEY: &[u8] = b"com.apple.quicktime.creationdate";

/// Seconds between 1904-01-01 and 1970-01-01
const QT_TO_UNIX_OFFSET: i64 = 2_082_844_800;

/// Box payloads are never this large for the atoms read here
const MAX_PAYLOAD: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy)]
struct Atom {
    kind: [u8; 4],
    data_start: u64,
    data_end: u64,
}

/// Extract creation time from the MP4 movie header box
pub fn extract_mvhd_time(path: &Path) -> Result<Option<DateTime<Utc>>> {
    let (reader, len) = open(path)?;

    let mp4_file = match mp4::Mp4Reader::read_header(reader, len) {
        Ok(mp4_file) => mp4_file,
        // No ftyp or moov: not an ISO-BMFF movie, or one without a header
        Err(mp4::Error::BoxNotFound(kind)) => {
            trace!(?path, ?kind, "No movie header");
            return Ok(None);
        }
        Err(e) => return Err(malformed(path, &e.to_string())),
    };

    let seconds = mp4_file.moov.mvhd.creation_time;
    trace!(?path, version = mp4_file.moov.mvhd.version, seconds, "Read mvhd creation time");
    Ok(qt_epoch_to_utc(seconds))
}

/// Extract creation time from the QuickTime `com.apple.quicktime.creationdate` item
pub fn extract_quicktime_time(path: &Path) -> Result<Option<DateTime<Utc>>> {
    let (mut reader, len) = open(path)?;

    let Some(moov) = find_atom(&mut reader, path, 0, len, *b"moov")? else {
        return Ok(None);
    };
    let Some(meta) = find_atom(&mut reader, path, moov.data_start, moov.data_end, *b"meta")? else {
        return Ok(None);
    };

    // QuickTime writes `meta` as a plain container; ISO files make it a full
    // box with four bytes of version and flags before the children.
    reader.seek(SeekFrom::Start(meta.data_start))?;
    let peek: [u8; 8] = read_array(&mut reader, path)?;
    let children_start = if &peek[4..8] == b"hdlr" || &peek[4..8] == b"keys" {
        meta.data_start
    } else {
        meta.data_start + 4
    };

    let children = read_atoms(&mut reader, path, children_start, meta.data_end)?;
    let Some(keys) = children.iter().find(|a| &a.kind == b"keys") else {
        return Ok(None);
    };
    let Some(ilst) = children.iter().find(|a| &a.kind == b"ilst") else {
        return Ok(None);
    };

    let Some(index) = find_key_index(&mut reader, path, keys, CREATION_DATE_KEY)? else {
        return Ok(None);
    };

    for item in read_atoms(&mut reader, path, ilst.data_start, ilst.data_end)? {
        if u32::from_be_bytes(item.kind) != index {
            continue;
        }
        let Some(data) = find_atom(&mut reader, path, item.data_start, item.data_end, *b"data")? else {
            continue;
        };
        // type indicator (4) + locale (4), then the value
        let value_start = data.data_start + 8;
        if value_start > data.data_end {
            return Err(malformed(path, "truncated data atom"));
        }
        let value = read_bytes(&mut reader, path, value_start, data.data_end - value_start)?;
        let text = String::from_utf8_lossy(&value);
        trace!(?path, value = %text, "Read QuickTime creation date");

        return parse_video_datetime(&text)
            .map(Some)
            .ok_or_else(|| Error::TimestampParse {
                source_info: path.display().to_string(),
                message: format!("unrecognised creation date {text:?}"),
            });
    }

    Ok(None)
}

/// Parse a video metadata datetime; values without an offset are UTC
pub fn parse_video_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim().trim_matches(char::from(0));

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    // Apple writes offsets without a colon: 2023-04-15T11:54:13-0500
    for format in ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let s = s.trim_end_matches('Z');
    for format in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.and_utc());
        }
    }

    None
}

fn open(path: &Path) -> Result<(BufReader<File>, u64)> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    Ok((BufReader::new(file), len))
}

fn qt_epoch_to_utc(seconds: u64) -> Option<DateTime<Utc>> {
    // Zero is what muxers write when they do not know the time
    if seconds == 0 {
        return None;
    }
    let unix = i64::try_from(seconds).ok()?.checked_sub(QT_TO_UNIX_OFFSET)?;
    DateTime::from_timestamp(unix, 0)
}

/// 1-based index of `name` in a `keys` atom
fn find_key_index<R: Read + Seek>(
    reader: &mut R,
    path: &Path,
    keys: &Atom,
    name: &[u8],
) -> Result<Option<u32>> {
    // version + flags
    let mut offset = keys.data_start + 4;
    reader.seek(SeekFrom::Start(offset))?;
    let count = u32::from_be_bytes(read_array(reader, path)?);
    offset += 4;

    for index in 1..=count {
        if offset + 8 > keys.data_end {
            return Err(malformed(path, "keys atom shorter than its entry count"));
        }
        reader.seek(SeekFrom::Start(offset))?;
        let size = u64::from(u32::from_be_bytes(read_array(reader, path)?));
        if size < 8 || offset + size > keys.data_end {
            return Err(malformed(path, "bad key entry size"));
        }
        // Skip the 4-byte namespace, usually `mdta`
        let key = read_bytes(reader, path, offset + 8, size - 8)?;
        if key == name {
            return Ok(Some(index));
        }
        offset += size;
    }

    Ok(None)
}

fn find_atom<R: Read + Seek>(
    reader: &mut R,
    path: &Path,
    start: u64,
    end: u64,
    kind: [u8; 4],
) -> Result<Option<Atom>> {
    Ok(read_atoms(reader, path, start, end)?
        .into_iter()
        .find(|atom| atom.kind == kind))
}

/// Headers of the sibling atoms in `start..end`
fn read_atoms<R: Read + Seek>(reader: &mut R, path: &Path, start: u64, end: u64) -> Result<Vec<Atom>> {
    let mut atoms = Vec::new();
    let mut offset = start;

    while offset + 8 <= end {
        reader.seek(SeekFrom::Start(offset))?;
        let header: [u8; 8] = read_array(reader, path)?;
        let mut size = u64::from(u32::from_be_bytes([header[0], header[1], header[2], header[3]]));
        let kind = [header[4], header[5], header[6], header[7]];
        let mut header_size = 8u64;

        if size == 1 {
            size = u64::from_be_bytes(read_array(reader, path)?);
            header_size = 16;
        } else if size == 0 {
            // Extends to the end of the enclosing atom
            size = end - offset;
        }

        if size < header_size {
            return Err(malformed(path, "atom smaller than its header"));
        }
        let atom_end = offset.saturating_add(size).min(end);

        atoms.push(Atom {
            kind,
            data_start: offset + header_size,
            data_end: atom_end,
        });
        offset = atom_end;
    }

    Ok(atoms)
}

fn read_array<R: Read, const N: usize>(reader: &mut R, path: &Path) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader
        .read_exact(&mut buf)
        .map_err(|e| malformed(path, &format!("unexpected end of atom data: {e}")))?;
    Ok(buf)
}

fn read_bytes<R: Read + Seek>(reader: &mut R, path: &Path, offset: u64, len: u64) -> Result<Vec<u8>> {
    if len > MAX_PAYLOAD {
        return Err(malformed(path, "metadata payload too large"));
    }
    reader.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len as usize];
    reader
        .read_exact(&mut buf)
        .map_err(|e| malformed(path, &format!("unexpected end of atom data: {e}")))?;
    Ok(buf)
}

fn malformed(path: &Path, message: &str) -> Error {
    Error::VideoMetadata {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}
