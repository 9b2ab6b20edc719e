//! CLI argument parsing with clap

use crate::config::Config;
use crate::error::Result;
use crate::media::{CategoryTable, DEFAULT_PICTURE_EXTENSIONS, DEFAULT_VIDEO_EXTENSIONS};
use crate::time::ReferenceZone;
use clap::Parser;
use std::path::PathBuf;

/// here-to-there - file photos and videos into dated archives
///
/// Copies every picture and video under SOURCE into a year/month folder
/// of its archive, named by the capture time read from EXIF or video
/// metadata (falling back to the file's modification time), then moves
/// the original into a timestamped folder under BACKUP.
#[derive(Parser, Debug)]
#[command(name = "here-to-there")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory to organize
    pub source: PathBuf,

    /// Archive root for pictures
    pub pictures: PathBuf,

    /// Archive root for videos
    pub videos: PathBuf,

    /// Root for backed up originals
    pub backup: PathBuf,

    /// IANA time zone for folder names, e.g. America/Chicago
    ///
    /// Defaults to the system zone. Set it when the archive is shared
    /// between machines, or folder names follow whichever zone each
    /// machine is in.
    #[arg(short = 'z', long)]
    pub time_zone: Option<String>,

    /// Picture extensions, replacing the built-in list
    #[arg(long, value_delimiter = ',')]
    pub picture_ext: Option<Vec<String>>,

    /// Video extensions, replacing the built-in list
    #[arg(long, value_delimiter = ',')]
    pub video_ext: Option<Vec<String>>,

    /// Dry run mode - show what would be done without doing it
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Also write the log to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Output log file format as JSON
    #[arg(long, requires = "log_file")]
    pub json_log: bool,
}

impl Cli {
    /// Convert CLI arguments to Config
    pub fn to_config(&self) -> Result<Config> {
        let mut config = Config::new(&self.source, &self.pictures, &self.videos, &self.backup);

        if let Some(ref name) = self.time_zone {
            config.time_zone = ReferenceZone::parse(name)?;
        }

        if self.picture_ext.is_some() || self.video_ext.is_some() {
            let pictures = self
                .picture_ext
                .clone()
                .unwrap_or_else(|| DEFAULT_PICTURE_EXTENSIONS.iter().map(|e| e.to_string()).collect());
            let videos = self
                .video_ext
                .clone()
                .unwrap_or_else(|| DEFAULT_VIDEO_EXTENSIONS.iter().map(|e| e.to_string()).collect());
            config.categories = CategoryTable::new(pictures, videos);
        }

        config.dry_run = self.dry_run;
        config.verbose = self.verbose;

        Ok(config)
    }
}
