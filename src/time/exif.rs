//! EXIF time extraction for images

use crate::error::{Error, Result};
use crate::time::ReferenceZone;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use exif::{Exif, In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::trace;

/// Capture date tags with their sub-second and offset companions, in priority order
const DATE_TAGS: &[(Tag, Tag, Tag)] = &[
    // When the original image was taken
    (Tag::DateTimeOriginal, Tag::SubSecTimeOriginal, Tag::OffsetTimeOriginal),
    // When the image was digitized
    (Tag::DateTimeDigitized, Tag::SubSecTimeDigitized, Tag::OffsetTimeDigitized),
];

/// Extract the original capture time from EXIF metadata.
///
/// Returns `Ok(None)` when the file has no EXIF block or no capture date.
/// Times without an `OffsetTime*` tag are read as wall-clock time in `zone`.
pub fn extract_exif_time(path: &Path, zone: &ReferenceZone) -> Result<Option<DateTime<Utc>>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let exif = match Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(_)) => return Ok(None),
        Err(e) => {
            return Err(Error::ExifRead {
                path: path.to_path_buf(),
                message: e.to_string(),
            });
        }
    };

    for (date_tag, subsec_tag, offset_tag) in DATE_TAGS {
        let Some(raw) = ascii_field(&exif, *date_tag) else {
            continue;
        };
        let Some(mut naive) = parse_exif_datetime(&raw) else {
            trace!(?path, tag = ?date_tag, value = %raw, "Unparseable EXIF date");
            continue;
        };

        if let Some(nanos) = ascii_field(&exif, *subsec_tag).and_then(|s| parse_subsec_nanos(&s)) {
            naive += chrono::Duration::nanoseconds(i64::from(nanos));
        }

        let instant = match ascii_field(&exif, *offset_tag).and_then(|s| parse_offset(&s)) {
            Some(offset) => offset
                .from_local_datetime(&naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc)),
            None => zone.from_civil(naive),
        };

        if let Some(instant) = instant {
            trace!(?path, tag = ?date_tag, %instant, "Found EXIF date");
            return Ok(Some(instant));
        }
    }

    Ok(None)
}

/// First ASCII string of a field, read from the raw bytes so that
/// `display_value` quoting never reaches the parser
fn ascii_field(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(values) => values
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).trim_matches(char::from(0)).trim().to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

/// Parse EXIF datetime string format: "YYYY:MM:DD HH:MM:SS"
fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim().trim_matches('"');

    // Cameras that never had their clock set write all zeros or blanks
    if s.starts_with("0000") {
        return None;
    }

    let formats = [
        "%Y:%m:%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
    ];

    formats
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
}

/// `SubSecTime*` holds the decimal digits of the fraction, "391" meaning .391s
fn parse_subsec_nanos(s: &str) -> Option<u32> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).take(9).collect();
    if digits.is_empty() {
        return None;
    }
    let scale = 10u32.pow(9 - digits.len() as u32);
    digits.parse::<u32>().ok().map(|v| v * scale)
}

/// `OffsetTime*` is "+HH:MM" or "-HH:MM"
fn parse_offset(s: &str) -> Option<FixedOffset> {
    let s = s.trim();
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
