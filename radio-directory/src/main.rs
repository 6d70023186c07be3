//! radio-directory: replay a recorded program list stream.
//!
//! Reads one `ProgramListChunk` per line (JSON) from a file or stdin, folds
//! the stream into a directory session and prints the resulting directory
//! and scan state as JSON.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use clap::Parser;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use radio_directory::config::{self, ConfigFile};
use radio_directory::{
    AnnouncementRouter, DirectoryConfig, ProgramDirectory, ScanEvent, ScanState, ScanStatus,
    Watermark,
};
use radio_directory_protocol::{
    validate_tune_request, AmFmRegionConfig, Announcement, Identifier, IdentifierType,
    ProgramFilter, ProgramInfo, ProgramListChunk, RegionPreset,
};

/// radio-directory - Program list synchronization replay tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Chunk stream, one JSON chunk per line ("-" for stdin)
    input: PathBuf,

    /// Announcement commands, one JSON object per line
    #[arg(short, long)]
    announcements: Option<PathBuf>,

    /// Configuration file path
    #[arg(short = 'f', long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Scan completion timeout in milliseconds
    #[arg(long)]
    scan_timeout_ms: Option<u64>,

    /// AM/FM region preset (itu1, itu2)
    #[arg(long)]
    region: Option<String>,

    /// Only report entries carrying one of these identifier type tags
    #[arg(short = 't', long = "type")]
    types: Vec<u32>,

    /// Include category entries (e.g. DAB ensembles) in the report
    #[arg(long)]
    include_categories: bool,

    /// Wait for the scan to complete or time out before reporting
    #[arg(long)]
    wait: bool,

    /// Directory where log files are stored
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Number of days to keep log files
    #[arg(long, default_value = "7")]
    log_retention_days: u64,
}

/// One line of the announcement command file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum AnnouncementCommand {
    Raise(Announcement),
    Clear(Identifier),
}

#[derive(Debug, Serialize)]
struct UntunableEntry {
    primary: Identifier,
    reason: String,
}

#[derive(Debug, Serialize)]
struct Report {
    watermark: Watermark,
    scan: ScanStatus,
    chunks_applied: usize,
    chunks_rejected: usize,
    entries: Vec<ProgramInfo>,
    untunable: Vec<UntunableEntry>,
    announcements: Vec<Announcement>,
}

fn open_input(path: &Path) -> io::Result<Box<dyn BufRead>> {
    if path.as_os_str() == "-" {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else {
        Ok(Box::new(BufReader::new(File::open(path)?)))
    }
}

fn parse_region(name: &str) -> Result<RegionPreset, String> {
    match name.to_ascii_lowercase().as_str() {
        "itu1" => Ok(RegionPreset::Itu1),
        "itu2" => Ok(RegionPreset::Itu2),
        other => Err(format!("Unknown region preset: {}", other)),
    }
}

/// Feed every chunk line into the directory. Returns (applied, rejected).
fn replay_chunks(
    directory: &ProgramDirectory,
    input: Box<dyn BufRead>,
) -> io::Result<(usize, usize)> {
    let mut applied = 0;
    let mut rejected = 0;

    for (index, line) in input.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let chunk: ProgramListChunk = match serde_json::from_str(line) {
            Ok(chunk) => chunk,
            Err(e) => {
                error!("Line {}: malformed chunk: {}", index + 1, e);
                rejected += 1;
                continue;
            }
        };

        match directory.apply_chunk(chunk) {
            Ok(outcome) => {
                debug!("Line {}: {:?}", index + 1, outcome);
                applied += 1;
            }
            Err(e) => {
                warn!("Line {}: chunk rejected: {}", index + 1, e);
                rejected += 1;
            }
        }
    }

    Ok((applied, rejected))
}

fn replay_announcements(router: &AnnouncementRouter, input: Box<dyn BufRead>) -> io::Result<()> {
    for (index, line) in input.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<AnnouncementCommand>(line) {
            Ok(AnnouncementCommand::Raise(announcement)) => {
                router.raise(announcement);
            }
            Ok(AnnouncementCommand::Clear(primary)) => {
                router.clear(&primary);
            }
            Err(e) => error!("Line {}: malformed announcement command: {}", index + 1, e),
        }
    }
    Ok(())
}

async fn wait_for_scan(directory: &ProgramDirectory) {
    let mut events = directory.scan_events();
    if directory.scan_status().state != ScanState::Scanning {
        return;
    }

    info!("Waiting for scan to finish (timeout {:?})", directory.config().scan_timeout);
    loop {
        match events.recv().await {
            Ok(ScanEvent::Completed { .. }) | Ok(ScanEvent::TimedOut { .. }) => break,
            Ok(ScanEvent::Started { .. }) => continue,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load config file: explicit path > auto-detect > default
    let config_path = config::resolve_config_path(args.config.clone());
    let file_config = if let Some(config_path) = &config_path {
        match config::load_config(config_path) {
            Ok(c) => {
                eprintln!("Loaded config from: {}", config_path.display());
                c
            }
            Err(e) => {
                eprintln!("Failed to load config file: {}", e);
                return Err(e);
            }
        }
    } else {
        ConfigFile::default()
    };

    // Merge logging configs (command line takes precedence)
    let log_dir = if args.log_dir.to_string_lossy() != "logs" {
        args.log_dir.clone()
    } else {
        PathBuf::from(file_config.logging.log_dir.as_deref().unwrap_or("logs"))
    };
    let log_retention_days = if args.log_retention_days != 7 {
        args.log_retention_days
    } else {
        file_config.logging.retention_days.unwrap_or(7)
    };
    let _log_guard = radio_directory::logging::init_logging(
        &log_dir,
        log_retention_days,
        args.verbose,
        file_config.logging.level.as_deref(),
    )?;

    let mut directory_config: DirectoryConfig = file_config.directory.to_directory_config();
    if let Some(ms) = args.scan_timeout_ms {
        directory_config.scan_timeout = std::time::Duration::from_millis(ms);
    }

    let region: AmFmRegionConfig = match args.region.as_deref() {
        Some(name) => AmFmRegionConfig::preset(parse_region(name)?),
        None => file_config.region.to_region_config(),
    };

    let report_filter = if args.types.is_empty() && !args.include_categories {
        None
    } else {
        let mut filter =
            ProgramFilter::default().with_types(args.types.iter().map(|&t| IdentifierType::from(t)));
        filter.include_categories = args.include_categories;
        Some(filter)
    };

    info!("Replaying chunk stream from {}", args.input.display());
    let directory = ProgramDirectory::start(directory_config);
    let router = AnnouncementRouter::new();

    let (chunks_applied, chunks_rejected) = replay_chunks(&directory, open_input(&args.input)?)?;
    if let Some(path) = &args.announcements {
        replay_announcements(&router, open_input(path)?)?;
    }

    if args.wait {
        wait_for_scan(&directory).await;
    }

    let entries = directory.snapshot(report_filter.as_ref());
    let untunable = entries
        .iter()
        .filter(|entry| !entry.is_category())
        .filter_map(|entry| {
            validate_tune_request(&entry.selector, &region)
                .err()
                .map(|e| UntunableEntry {
                    primary: *entry.key(),
                    reason: e.to_string(),
                })
        })
        .collect();

    let report = Report {
        watermark: directory.watermark(),
        scan: directory.scan_status(),
        chunks_applied,
        chunks_rejected,
        entries,
        untunable,
        announcements: router.active(),
    };

    info!(
        "Directory holds {} entries (scan {:?}), {} chunk(s) rejected",
        directory.len(),
        report.scan.state,
        chunks_rejected
    );

    println!("{}", serde_json::to_string_pretty(&report)?);
    directory.close();

    Ok(())
}
