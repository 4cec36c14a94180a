//! Logging manager with file rotation
//!
//! Provides dual-output logging:
//! - Console: INFO level with concise format
//! - File: configured level, text or JSON, rotated daily
//!
//! Audit records go through the same subscriber under the `safedb::audit`
//! target, so they land in the log file alongside everything else.

use crate::config::{expand_tilde, GeneralConfig, LogFormat};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

const LOG_FILE_PREFIX: &str = "safedb";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for log files
    pub log_directory: PathBuf,
    /// Log level for file output (console always uses INFO)
    pub log_level: Level,
    pub log_format: LogFormat,
    /// Maximum number of log files to keep
    pub max_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_directory: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("logs"),
            log_level: Level::INFO,
            log_format: LogFormat::Text,
            max_files: 10,
        }
    }
}

impl LoggingConfig {
    /// Create from the `[general]` section
    pub fn from_config(general: &GeneralConfig) -> Self {
        Self {
            log_directory: general.log_directory.clone(),
            log_level: parse_level(&general.log_level),
            log_format: general.log_format,
            max_files: general.log_max_files,
        }
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize logging with console and file outputs
///
/// Returns a guard that must be kept alive for the duration of the program.
/// When the guard is dropped, any remaining logs are flushed to disk.
pub fn init_logging(config: &LoggingConfig) -> Result<LogGuard> {
    let log_dir = expand_tilde(&config.log_directory);
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {:?}", log_dir))?;

    let file_appender = RollingFileAppender::new(
        Rotation::DAILY,
        &log_dir,
        format!("{}.log", LOG_FILE_PREFIX),
    );
    let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.log_format {
        LogFormat::Text => fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .with_span_events(FmtSpan::NONE)
            .with_filter(level_filter(config.log_level))
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_current_span(true)
            .with_span_list(false)
            .with_filter(level_filter(config.log_level))
            .boxed(),
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .with_level(true)
        .with_span_events(FmtSpan::NONE)
        .with_filter(level_filter(Level::INFO));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    cleanup_old_logs(&log_dir, config.max_files)?;

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}

/// Initialize simple console-only logging (for when config isn't available)
pub fn init_console_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .try_init();
}

/// Our own crate at `level`, dependencies only when they warn
fn level_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,safedb={}", level)))
}

/// Cleanup old log files, keeping only the most recent N files
fn cleanup_old_logs(log_dir: &Path, max_files: u32) -> Result<()> {
    let mut log_files: Vec<_> = fs::read_dir(log_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            name.starts_with(LOG_FILE_PREFIX) && name.contains(".log")
        })
        .collect();

    // Newest first
    log_files.sort_by(|a, b| {
        let a_time = a.metadata().and_then(|m| m.modified()).ok();
        let b_time = b.metadata().and_then(|m| m.modified()).ok();
        b_time.cmp(&a_time)
    });

    for file in log_files.into_iter().skip(max_files as usize) {
        if let Err(e) = fs::remove_file(file.path()) {
            tracing::warn!("Failed to remove old log file {:?}: {}", file.path(), e);
        } else {
            tracing::debug!("Removed old log file: {:?}", file.path());
        }
    }

    Ok(())
}

/// Guard that keeps the logging system alive
///
/// When dropped, flushes any remaining logs to disk.
pub struct LogGuard {
    _file_guard: WorkerGuard,
}
