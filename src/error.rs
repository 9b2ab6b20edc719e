//! Error types for here-to-there

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for here-to-there operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for here-to-there
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read EXIF data from {path}: {message}")]
    ExifRead { path: PathBuf, message: String },

    #[error("Failed to extract video metadata from {path}: {message}")]
    VideoMetadata { path: PathBuf, message: String },

    #[error("Failed to parse timestamp from {source_info}: {message}")]
    TimestampParse { source_info: String, message: String },

    #[error("Unknown time zone: {0}")]
    InvalidTimeZone(String),

    #[error("Path has no usable file name: {0}")]
    InvalidPath(PathBuf),

    #[error("{inner} must not be inside the source directory {source_root}")]
    NestedRoots { inner: PathBuf, source_root: PathBuf },

    #[error("Directory traversal error: {0}")]
    WalkDir(#[from] walkdir::Error),
}
