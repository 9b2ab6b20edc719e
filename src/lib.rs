//! here-to-there - file photos and videos into dated archives
//!
//! This library walks a source tree and, for every picture and video:
//! - Resolves its capture time from EXIF, QuickTime or MP4 metadata,
//!   falling back to the file system modification time
//! - Copies it to `{archive}/{year}/{MM-Month}/{name}` without overwriting
//! - Stamps the copy's modification time with the capture time
//! - Moves the original into `{backup}/{date}/{time}/...`

pub mod cli;
pub mod config;
pub mod console;
pub mod error;
pub mod fs;
pub mod layout;
pub mod media;
pub mod process;
pub mod time;

pub use cli::Cli;
pub use config::Config;
pub use console::{ConsoleSink, Event, StyledConsole};
pub use error::{Error, Result};
pub use fs::{FileSystem, OsFileSystem};
pub use media::{Category, CategoryTable, MediaFile};
pub use process::{FileReport, Organizer, ProcessingStatus, RunStats, TransferOutcome};
pub use time::{Clock, ReferenceZone, ResolvedInstant, TimeSource, TimestampSource};
