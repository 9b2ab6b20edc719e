//! Organizer: the per-file pipeline
//!
//! Handles the core logic of:
//! - Walking the source tree
//! - Classifying files and resolving their capture time
//! - Copying them into the picture or video archive
//! - Moving the originals into the timestamped backup tree

use crate::config::Config;
use crate::console::{ConsoleSink, Event};
use crate::error::Result;
use crate::fs::{FileSystem, OsFileSystem};
use crate::layout::{self, OrganizedDir};
use crate::media::{Category, MediaFile};
use crate::time::{
    self, Clock, EmbeddedMetadata, ReferenceZone, ResolvedInstant, SystemClock, TimestampSource,
};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{Level, debug, error, info, span, warn};
use walkdir::WalkDir;

/// Locale used when the system does not report one
const FALLBACK_LOCALE: &str = "C";

/// Result of the copy step for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Archive copy written and stamped
    Copied(PathBuf),
    /// A file with the destination name already existed
    SkippedExisting(PathBuf),
    /// Copy failed; the source is untouched
    Failed(String),
    /// Dry run - would have copied here
    Planned(PathBuf),
}

/// Status of file processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStatus {
    /// Copied to the archive and original moved to the backup
    Organized,
    /// Copied to the archive but the original could not be moved
    BackupFailed,
    /// Destination already existed
    Skipped,
    /// Unsupported extension
    Ignored,
    /// Processing failed
    Failed,
    /// Dry run - would have processed
    DryRun,
}

/// Result of processing a single file
#[derive(Debug, Clone)]
pub struct FileReport {
    /// Source file path
    pub source: PathBuf,
    /// Archive destination, when one was computed
    pub destination: Option<PathBuf>,
    /// Backup location, when one was computed
    pub backup: Option<PathBuf>,
    /// Resolved capture time
    pub time: Option<ResolvedInstant>,
    /// Processing status
    pub status: ProcessingStatus,
    /// Error message (if failed)
    pub error: Option<String>,
}

impl FileReport {
    fn new(source: &Path, status: ProcessingStatus) -> Self {
        Self {
            source: source.to_path_buf(),
            destination: None,
            backup: None,
            time: None,
            status,
            error: None,
        }
    }
}

/// Processing statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub total_files: usize,
    pub organized: usize,
    pub backup_failed: usize,
    pub skipped: usize,
    pub ignored: usize,
    pub failed: usize,
    pub planned: usize,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, status: ProcessingStatus) {
        match status {
            ProcessingStatus::Organized => self.organized += 1,
            ProcessingStatus::BackupFailed => self.backup_failed += 1,
            ProcessingStatus::Skipped => self.skipped += 1,
            ProcessingStatus::Ignored => self.ignored += 1,
            ProcessingStatus::Failed => self.failed += 1,
            ProcessingStatus::DryRun => self.planned += 1,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Total: {}, Organized: {}, Skipped: {}, Ignored: {}, Failed: {}, Backup failed: {}, Planned: {}",
            self.total_files,
            self.organized,
            self.skipped,
            self.ignored,
            self.failed,
            self.backup_failed,
            self.planned
        )
    }
}

/// Every non-directory entry below `root`, in walk order.
///
/// Any traversal error, including an unreadable root, is returned and ends
/// the run.
pub fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Main organizer for media files
pub struct Organizer {
    config: Config,
    fs: Box<dyn FileSystem>,
    timestamps: Box<dyn TimestampSource>,
    clock: Box<dyn Clock>,
    locale: String,
    stats: RunStats,
}

impl Organizer {
    /// Create an organizer working on the real file system
    pub fn new(config: Config) -> Self {
        let timestamps = EmbeddedMetadata::new(config.time_zone);
        let locale = sys_locale::get_locale().unwrap_or_else(|| FALLBACK_LOCALE.to_string());
        Self {
            config,
            fs: Box::new(OsFileSystem),
            timestamps: Box::new(timestamps),
            clock: Box::new(SystemClock),
            locale,
            stats: RunStats::new(),
        }
    }

    pub fn with_file_system(mut self, fs: impl FileSystem + 'static) -> Self {
        self.fs = Box::new(fs);
        self
    }

    pub fn with_timestamp_source(mut self, timestamps: impl TimestampSource + 'static) -> Self {
        self.timestamps = Box::new(timestamps);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Locale deciding the backup folder's time format, e.g. `en-US`
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get processing statistics reference
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Walk the source tree and process every file
    pub fn run(&mut self, sink: &mut dyn ConsoleSink) -> Result<Vec<FileReport>> {
        let _span = span!(Level::INFO, "organize_run", source = %self.config.source_dir.display()).entered();

        if self.config.verbose {
            info!(config = ?self.config, "Configuration loaded");
        }
        info!(
            time_zone = %self.config.time_zone,
            pictures = ?self.config.categories.picture_extensions(),
            videos = ?self.config.categories.video_extensions(),
            "Organizing"
        );
        if self.config.time_zone == ReferenceZone::Local {
            debug!("No time zone given, folder names follow the system zone");
        }

        info!("Scanning source directory...");
        // Collected up front so files moved during the run are never revisited
        let files = collect_files(&self.config.source_dir)?;
        info!(count = files.len(), "Found files");

        let reports = self.process_paths(files, sink);
        info!("{}", self.stats.summary());
        Ok(reports)
    }

    /// Process a sequence of paths; no failure of one file stops the rest
    pub fn process_paths<I>(&mut self, paths: I, sink: &mut dyn ConsoleSink) -> Vec<FileReport>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        paths
            .into_iter()
            .map(|path| self.process_file(&MediaFile::new(path), sink))
            .collect()
    }

    /// Process a single file through classify, resolve, copy and back up
    pub fn process_file(&mut self, file: &MediaFile, sink: &mut dyn ConsoleSink) -> FileReport {
        let path = file.path();
        let _file_span = span!(Level::DEBUG, "process_file", ?path).entered();

        self.stats.total_files += 1;
        let report = self.organize(file, sink);
        self.stats.record(report.status);
        report
    }

    fn organize(&mut self, file: &MediaFile, sink: &mut dyn ConsoleSink) -> FileReport {
        let path = file.path();

        let category = self.config.categories.classify(file.extension());
        let Some(root) = self.config.root_for(category).map(Path::to_path_buf) else {
            info!(?path, extension = file.extension(), "Ignoring unsupported file");
            sink.emit(&Event::Ignored {
                path: path.to_path_buf(),
                extension: file.extension().to_string(),
            });
            return FileReport::new(path, ProcessingStatus::Ignored);
        };

        let Some(file_name) = file.file_name() else {
            return self.fail(path, "path has no file name".to_string(), sink);
        };

        let modified = match self.fs.modified(path) {
            Ok(modified) => modified,
            Err(e) => {
                error!(?path, error = %e, "Failed to read modification time");
                return self.fail(path, e.to_string(), sink);
            }
        };

        let resolved = time::resolve(self.timestamps.extract(file, category), modified);
        let organized: OrganizedDir = layout::organized_dir(resolved.instant, &self.config.time_zone);
        let dest = layout::destination(&root, &organized, file_name);
        debug!(
            ?path,
            category = category.label(),
            time_source = ?resolved.source,
            timestamp = %resolved.instant,
            %organized,
            "Resolved destination"
        );

        let mut report = FileReport::new(path, ProcessingStatus::Failed);
        report.destination = Some(dest.clone());
        report.time = Some(resolved);

        match self.copy_to_archive(path, &dest, &resolved) {
            TransferOutcome::Copied(dest) => {
                info!(source = ?path, destination = ?dest, "Copied file");
                sink.emit(&Event::Copied {
                    source: path.to_path_buf(),
                    destination: dest,
                });
                self.back_up(file, &mut report, sink);
            }
            TransferOutcome::SkippedExisting(dest) => {
                info!(source = ?path, destination = ?dest, "Destination exists, leaving source for review");
                sink.emit(&Event::SkippedExisting {
                    source: path.to_path_buf(),
                    destination: dest,
                });
                report.status = ProcessingStatus::Skipped;
            }
            TransferOutcome::Failed(reason) => {
                error!(source = ?path, destination = ?dest, error = %reason, "Failed to copy file");
                sink.emit(&Event::CopyFailed {
                    source: path.to_path_buf(),
                    destination: Some(dest),
                    reason: reason.clone(),
                });
                report.error = Some(reason);
            }
            TransferOutcome::Planned(dest) => {
                let backup = self.backup_destination(file);
                info!(source = ?path, destination = ?dest, backup = ?backup, "Would organize file");
                sink.emit(&Event::Planned {
                    source: path.to_path_buf(),
                    destination: dest,
                    backup: backup.clone(),
                });
                report.backup = Some(backup);
                report.status = ProcessingStatus::DryRun;
            }
        }

        report
    }

    /// Copy `source` to `dest` and stamp it with the resolved instant.
    /// An existing destination is never overwritten or restamped.
    pub fn copy_to_archive(&self, source: &Path, dest: &Path, resolved: &ResolvedInstant) -> TransferOutcome {
        if self.fs.exists(dest) {
            return TransferOutcome::SkippedExisting(dest.to_path_buf());
        }

        if self.config.dry_run {
            return TransferOutcome::Planned(dest.to_path_buf());
        }

        if let Some(parent) = dest.parent()
            && let Err(e) = self.fs.create_dir_all(parent)
        {
            return TransferOutcome::Failed(format!("could not create {}: {}", parent.display(), e));
        }

        match self.fs.copy_new(source, dest) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return TransferOutcome::SkippedExisting(dest.to_path_buf());
            }
            Err(e) => return TransferOutcome::Failed(e.to_string()),
        }

        // Attribute copy carried the source's mtime; the resolved instant wins.
        // An unstamped copy is removed, or the next run would skip it for good.
        if let Err(e) = self.fs.set_modified(dest, resolved.to_system_time()) {
            if let Err(cleanup) = self.fs.remove_file(dest) {
                warn!(?dest, error = %cleanup, "Failed to remove unstamped copy");
            }
            return TransferOutcome::Failed(format!("could not set modified time: {}", e));
        }

        TransferOutcome::Copied(dest.to_path_buf())
    }

    /// Backup location for `file` at the current moment
    fn backup_destination(&self, file: &MediaFile) -> PathBuf {
        let path = file.path();
        let relative = path
            .strip_prefix(&self.config.source_dir)
            .ok()
            .filter(|r| !r.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .or_else(|| file.file_name().map(PathBuf::from))
            .unwrap_or_else(|| path.to_path_buf());

        layout::backup_path(
            &self.config.backup_dir,
            self.clock.now(),
            &self.config.time_zone,
            &self.locale,
            &relative,
        )
    }

    fn back_up(&self, file: &MediaFile, report: &mut FileReport, sink: &mut dyn ConsoleSink) {
        let path = file.path();
        let planned = self.backup_destination(file);

        let result = layout::resolve_filename_conflict(planned.clone(), |p| self.fs.exists(p))
            .map_err(|e| e.to_string())
            .and_then(|backup| {
                if let Some(parent) = backup.parent() {
                    self.fs.create_dir_all(parent).map_err(|e| e.to_string())?;
                }
                self.fs.move_file(path, &backup).map_err(|e| e.to_string())?;
                Ok(backup)
            });

        match result {
            Ok(backup) => {
                if backup != planned {
                    debug!(?planned, ?backup, "Backup name taken, used a suffix");
                }
                info!(source = ?path, backup = ?backup, "Backed up original");
                sink.emit(&Event::BackedUp {
                    source: path.to_path_buf(),
                    backup: backup.clone(),
                });
                report.backup = Some(backup);
                report.status = ProcessingStatus::Organized;
            }
            Err(reason) => {
                warn!(source = ?path, backup = ?planned, error = %reason, "Failed to move original to backup");
                sink.emit(&Event::BackupFailed {
                    source: path.to_path_buf(),
                    backup: planned.clone(),
                    reason: reason.clone(),
                });
                report.backup = Some(planned);
                report.status = ProcessingStatus::BackupFailed;
                report.error = Some(reason);
            }
        }
    }

    /// Failure before a destination could be computed
    fn fail(&self, path: &Path, reason: String, sink: &mut dyn ConsoleSink) -> FileReport {
        sink.emit(&Event::CopyFailed {
            source: path.to_path_buf(),
            destination: None,
            reason: reason.clone(),
        });
        let mut report = FileReport::new(path, ProcessingStatus::Failed);
        report.error = Some(reason);
        report
    }
}
