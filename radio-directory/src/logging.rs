//! Logging setup with console and rotated file output.
//!
//! Library code logs through the `log` macros; this module installs a
//! `tracing` subscriber and bridges those macros into it. Log files rotate
//! daily and files older than the retention period are removed at startup.

use std::fs;
use std::io;
use std::path::Path;

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// File name prefix of the rotated log files.
pub const LOG_FILE_NAME: &str = "radio-directory.log";

/// Initialize console and file logging.
///
/// # Arguments
/// * `log_dir` - Directory where log files will be stored
/// * `retention_days` - Number of days to keep log files
/// * `verbose` - Use `debug` as the default level
/// * `level` - Default level from the configuration file; `verbose` wins
///
/// `RUST_LOG` overrides both. The returned guard flushes the file writer
/// when dropped and must be held for the life of the program.
pub fn init_logging(
    log_dir: &Path,
    retention_days: u64,
    verbose: bool,
    level: Option<&str>,
) -> Result<WorkerGuard, Box<dyn std::error::Error>> {
    fs::create_dir_all(log_dir)?;
    clean_old_logs(log_dir, retention_days)?;

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = default_level(verbose, level);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_timer(LocalTimeTimer),
        )
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .with_timer(LocalTimeTimer),
        );

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to set default subscriber: {}", e))?;

    // Route log:: macros from the library into tracing
    tracing_log::LogTracer::init().map_err(|e| format!("Failed to initialize LogTracer: {}", e))?;

    Ok(guard)
}

fn default_level(verbose: bool, level: Option<&str>) -> &str {
    if verbose {
        "debug"
    } else {
        level.unwrap_or("info")
    }
}

/// Remove log files older than `retention_days`.
pub fn clean_old_logs(log_dir: &Path, retention_days: u64) -> io::Result<()> {
    if !log_dir.exists() {
        return Ok(());
    }

    let cutoff = Local::now() - chrono::Duration::days(retention_days as i64);

    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let is_ours = path
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| name.contains(LOG_FILE_NAME));
        if !is_ours {
            continue;
        }

        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(modified) => chrono::DateTime::<Local>::from(modified),
            Err(_) => continue,
        };
        if modified < cutoff {
            if let Err(e) = fs::remove_file(&path) {
                eprintln!("Failed to remove old log file {:?}: {}", path, e);
            }
        }
    }

    Ok(())
}

/// Local time formatting for log lines.
#[derive(Debug, Clone, Copy)]
struct LocalTimeTimer;

impl fmt::time::FormatTime for LocalTimeTimer {
    fn format_time(&self, w: &mut fmt::format::Writer) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.6f"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level() {
        assert_eq!(default_level(true, Some("warn")), "debug");
        assert_eq!(default_level(false, Some("warn")), "warn");
        assert_eq!(default_level(false, None), "info");
    }

    #[test]
    fn test_clean_old_logs_keeps_recent_and_foreign_files() {
        let dir = std::env::temp_dir().join(format!("radio-directory-logs-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let ours = dir.join(format!("{}.2026-01-01", LOG_FILE_NAME));
        let foreign = dir.join("other.log");
        fs::write(&ours, b"x").unwrap();
        fs::write(&foreign, b"x").unwrap();

        clean_old_logs(&dir, 7).unwrap();
        assert!(ours.exists());
        assert!(foreign.exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_clean_missing_dir_is_ok() {
        let dir = std::env::temp_dir().join("radio-directory-logs-missing-dir");
        assert!(clean_old_logs(&dir, 7).is_ok());
    }
}
