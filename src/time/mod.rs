//! Time extraction and resolution
//!
//! This module provides functionality to determine the instant a media file
//! was captured:
//! - EXIF metadata in images
//! - QuickTime `keys`/`ilst` creation date and MP4 `mvhd` creation time in videos
//! - File system modification time as the fallback

pub mod exif;
pub mod video;
pub mod zone;

pub use zone::ReferenceZone;

use crate::error::Result;
use crate::media::{Category, MediaFile};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, warn};

/// Source of the resolved timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    /// EXIF `DateTimeOriginal` (or `DateTimeDigitized`)
    Exif,
    /// QuickTime metadata item `com.apple.quicktime.creationdate`
    QuickTime,
    /// MP4 movie header box creation time
    Mp4,
    /// File system modification time
    FileSystem,
}

/// The instant a file is filed under, and where it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedInstant {
    pub instant: DateTime<Utc>,
    pub source: TimeSource,
}

impl ResolvedInstant {
    pub fn new(instant: DateTime<Utc>, source: TimeSource) -> Self {
        Self {
            instant: truncate_to_millis(instant),
            source,
        }
    }

    /// Wrap a file system modification time
    pub fn from_file_system(modified: SystemTime) -> Self {
        Self::new(modified.into(), TimeSource::FileSystem)
    }

    pub fn to_system_time(&self) -> SystemTime {
        self.instant.into()
    }
}

/// Pick the authoritative instant: embedded metadata when present,
/// otherwise the file system modification time. Never fails.
pub fn resolve(extracted: Option<ResolvedInstant>, modified: SystemTime) -> ResolvedInstant {
    extracted.unwrap_or_else(|| ResolvedInstant::from_file_system(modified))
}

fn truncate_to_millis(instant: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(instant.timestamp_millis()).unwrap_or(instant)
}

/// Source of the current time, used for backup folder names
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// One way of reading an embedded creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Exif,
    QuickTimeCreationDate,
    Mp4MovieHeader,
}

impl Strategy {
    /// Strategies to try for a file, in order
    pub fn for_file(extension: &str, category: Category) -> &'static [Strategy] {
        match extension {
            "jpg" | "jpeg" | "png" | "tif" | "tiff" | "heic" | "heif" | "webp" => &[Strategy::Exif],
            "mov" | "qt" => &[Strategy::QuickTimeCreationDate, Strategy::Mp4MovieHeader],
            "mp4" | "m4v" | "3gp" => &[Strategy::Mp4MovieHeader, Strategy::QuickTimeCreationDate],
            // MPEG program streams and Matroska carry no atom metadata
            "mpg" | "mpeg" | "mkv" => &[],
            _ => match category {
                Category::Picture => &[Strategy::Exif],
                Category::Video | Category::Unsupported => &[],
            },
        }
    }

    pub fn source(&self) -> TimeSource {
        match self {
            Strategy::Exif => TimeSource::Exif,
            Strategy::QuickTimeCreationDate => TimeSource::QuickTime,
            Strategy::Mp4MovieHeader => TimeSource::Mp4,
        }
    }

    fn read(&self, path: &Path, zone: &ReferenceZone) -> Result<Option<DateTime<Utc>>> {
        match self {
            Strategy::Exif => exif::extract_exif_time(path, zone),
            Strategy::QuickTimeCreationDate => video::extract_quicktime_time(path),
            Strategy::Mp4MovieHeader => video::extract_mvhd_time(path),
        }
    }
}

/// Reads embedded creation times from media files
pub trait TimestampSource {
    /// Embedded creation time, or `None` when the file has none or it cannot be read
    fn extract(&self, file: &MediaFile, category: Category) -> Option<ResolvedInstant>;
}

/// [`TimestampSource`] backed by the file's own EXIF or atom metadata
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedMetadata {
    zone: ReferenceZone,
}

impl EmbeddedMetadata {
    /// `zone` interprets EXIF times that carry no UTC offset
    pub fn new(zone: ReferenceZone) -> Self {
        Self { zone }
    }
}

impl TimestampSource for EmbeddedMetadata {
    fn extract(&self, file: &MediaFile, category: Category) -> Option<ResolvedInstant> {
        let path = file.path();
        for strategy in Strategy::for_file(file.extension(), category) {
            match strategy.read(path, &self.zone) {
                Ok(Some(instant)) => {
                    debug!(?path, ?strategy, %instant, "Extracted embedded creation time");
                    return Some(ResolvedInstant::new(instant, strategy.source()));
                }
                Ok(None) => {
                    debug!(?path, ?strategy, "No embedded creation time");
                }
                Err(e) => {
                    warn!(?path, ?strategy, error = %e, "Problem reading embedded metadata");
                }
            }
        }
        None
    }
}
