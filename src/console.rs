//! Human-readable status lines
//!
//! The organizer reports every outcome as an [`Event`]; a [`ConsoleSink`]
//! decides where the line goes.

use crossterm::{
    ExecutableCommand,
    style::{Color, Print, Stylize, style},
};
use std::fmt;
use std::io::{Write, stdout};
use std::path::PathBuf;

/// Something that happened to one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Extension not in either media set
    Ignored { path: PathBuf, extension: String },
    /// Archive copy written
    Copied { source: PathBuf, destination: PathBuf },
    /// Original moved into the backup tree
    BackedUp { source: PathBuf, backup: PathBuf },
    /// Destination name already taken; nothing touched
    SkippedExisting { source: PathBuf, destination: PathBuf },
    /// Copy (or reading the source) failed; source left in place
    CopyFailed {
        source: PathBuf,
        destination: Option<PathBuf>,
        reason: String,
    },
    /// Archive copy exists but the original could not be moved
    BackupFailed {
        source: PathBuf,
        backup: PathBuf,
        reason: String,
    },
    /// Dry run: what would happen
    Planned {
        source: PathBuf,
        destination: PathBuf,
        backup: PathBuf,
    },
}

impl Event {
    fn glyph(&self) -> (&'static str, Color) {
        match self {
            Event::Ignored { .. } => ("-", Color::DarkGrey),
            Event::Copied { .. } => ("✓", Color::Green),
            Event::BackedUp { .. } => ("↪", Color::Cyan),
            Event::SkippedExisting { .. } => ("⊘", Color::Yellow),
            Event::CopyFailed { .. } | Event::BackupFailed { .. } => ("✗", Color::Red),
            Event::Planned { .. } => ("~", Color::Cyan),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Ignored { path, extension } => {
                let extension = if extension.is_empty() { "(none)" } else { extension };
                write!(f, "{} is not supported. Ignoring {}", extension, path.display())
            }
            Event::Copied { source, destination } => {
                write!(f, "Copied {} to {}", source.display(), destination.display())
            }
            Event::BackedUp { source, backup } => {
                write!(f, "Backed up {} to {}", source.display(), backup.display())
            }
            Event::SkippedExisting { source, destination } => write!(
                f,
                "Skipped {}: {} already exists",
                source.display(),
                destination.display()
            ),
            Event::CopyFailed {
                source,
                destination: Some(destination),
                reason,
            } => write!(
                f,
                "There was a problem copying {} to {}: {}",
                source.display(),
                destination.display(),
                reason
            ),
            Event::CopyFailed {
                source,
                destination: None,
                reason,
            } => write!(f, "There was a problem reading {}: {}", source.display(), reason),
            Event::BackupFailed { source, backup, reason } => write!(
                f,
                "There was a problem moving and backing up {} to {}: {}",
                source.display(),
                backup.display(),
                reason
            ),
            Event::Planned {
                source,
                destination,
                backup,
            } => write!(
                f,
                "Would copy {} to {} and back it up to {}",
                source.display(),
                destination.display(),
                backup.display()
            ),
        }
    }
}

/// Receives one event per line of output
pub trait ConsoleSink {
    fn emit(&mut self, event: &Event);
}

/// Collects events in memory
impl ConsoleSink for Vec<Event> {
    fn emit(&mut self, event: &Event) {
        self.push(event.clone());
    }
}

/// Coloured stdout output
#[derive(Debug, Default)]
pub struct StyledConsole;

impl StyledConsole {
    pub fn new() -> Self {
        Self
    }

    /// Print a key/value statistic
    pub fn print_stat(&mut self, key: &str, value: usize, color: Color) {
        let mut out = stdout();
        let _ = out.execute(Print("  "));
        let _ = out.execute(Print(style(key).with(Color::DarkGrey)));
        let _ = out.execute(Print(": "));
        let _ = out.execute(Print(style(value.to_string()).with(color).bold()));
        let _ = out.execute(Print("\n"));
    }

    /// Print a separator line
    pub fn print_separator(&mut self) {
        let _ = stdout().execute(Print(format!("{}\n", "─".repeat(60))));
    }

    /// Print a warning message
    pub fn print_warning(&mut self, msg: &str) {
        let _ = stdout().execute(Print(style("⚠ ").with(Color::Yellow).bold()));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }
}

impl ConsoleSink for StyledConsole {
    fn emit(&mut self, event: &Event) {
        let (glyph, color) = event.glyph();
        let mut out = stdout();
        let _ = out.execute(Print(style(glyph).with(color).bold()));
        let _ = out.execute(Print(format!(" {}\n", event)));
        let _ = out.flush();
    }
}
