//! here-to-there - file photos and videos into dated archives
//!
//! Walks a source directory, copies each picture and video into a
//! year/month folder by capture time and moves the original into a
//! timestamped backup folder.

use anyhow::Result;
use clap::Parser;
use crossterm::style::Color;
use here_to_there::{Cli, Organizer, RunStats, StyledConsole};
use std::path::Path;
use tracing::{Level, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let guard = setup_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "here-to-there starting");

    let config = cli.to_config()?;

    validate_config(&config)?;

    let mut console = StyledConsole::new();
    let mut organizer = Organizer::new(config);

    match organizer.run(&mut console) {
        Ok(_reports) => {
            print_summary(&mut console, organizer.stats(), cli.dry_run);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Organizing failed");
            // exit skips destructors; flush the log file first
            drop(guard);
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_summary(console: &mut StyledConsole, stats: &RunStats, dry_run: bool) {
    console.print_separator();
    console.print_stat("Files", stats.total_files, Color::White);
    console.print_stat("Organized", stats.organized, Color::Green);
    console.print_stat("Skipped", stats.skipped, Color::Yellow);
    console.print_stat("Ignored", stats.ignored, Color::DarkGrey);
    console.print_stat("Failed", stats.failed, Color::Red);
    console.print_stat("Backup failed", stats.backup_failed, Color::Red);

    if dry_run {
        console.print_stat("Planned", stats.planned, Color::Cyan);
        console.print_separator();
        console.print_warning("Dry run: nothing was copied or moved");
    }
}

/// Stderr logging, plus an optional log file
fn setup_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr));

    let Some(ref log_path) = cli.log_file else {
        subscriber.init();
        return Ok(None);
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(open_log_file(log_path)?);

    if cli.json_log {
        subscriber
            .with(fmt::layer().json().with_ansi(false).with_writer(non_blocking))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .init();
    }

    Ok(Some(guard))
}

fn open_log_file(log_path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = log_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    Ok(std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?)
}

/// Validate configuration before processing
fn validate_config(config: &here_to_there::Config) -> Result<()> {
    if !config.source_dir.is_dir() {
        anyhow::bail!("Source directory {} does not exist", config.source_dir.display());
    }

    config.validate()?;

    Ok(())
}
