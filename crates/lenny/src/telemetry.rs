//! Logging setup: console plus a size-capped rotating log file
//!
//! The pipeline only emits `tracing` events. Binaries call [`init_logging`] once
//! and keep the returned [`LogGuard`] alive until exit so buffered file output
//! is flushed.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Keeps the background log writer alive
pub struct LogGuard {
    _guard: Option<WorkerGuard>,
}

/// Install the global subscriber
///
/// Console verbosity follows `RUST_LOG` when set, otherwise `console_level`.
pub fn init_logging(config: &LoggingConfig) -> Result<LogGuard> {
    let console_level = parse_log_level(&config.console_level)?;
    let file_level = parse_log_level(&config.file_level)?;

    let console_filter = EnvFilter::builder()
        .with_default_directive(console_level.into())
        .from_env_lossy();

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(console_filter);

    let (file_layer, guard) = match &config.log_dir {
        Some(log_dir) => {
            let writer = SizeRotatingWriter::new(
                log_dir.join(&config.file_name),
                config.max_bytes,
                config.max_backups,
            )?;
            let (non_blocking, guard) = tracing_appender::non_blocking(writer);

            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(LevelFilter::from_level(file_level));

            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    tracing::debug!(
        console = %config.console_level,
        file = %config.file_level,
        log_dir = ?config.log_dir,
        "logger initialized"
    );

    Ok(LogGuard { _guard: guard })
}

/// Parse log level string to Level
fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!("Invalid log level: {level}"),
    }
}

/// Log file writer that rotates by size
///
/// When a write would push the file past `max_bytes`, `app.log` is renamed to
/// `app.log.1`, older backups shift up by one, and anything beyond
/// `max_backups` is deleted.
pub struct SizeRotatingWriter {
    path: PathBuf,
    file: File,
    written: u64,
    max_bytes: u64,
    max_backups: usize,
}

impl SizeRotatingWriter {
    /// Open (or create) the log file in append mode
    pub fn new(path: PathBuf, max_bytes: u64, max_backups: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory {}", parent.display()))?;
        }

        let file = open_append(&path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            path,
            file,
            written,
            max_bytes,
            max_backups,
        })
    }

    fn backup_path(&self, generation: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{generation}"));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.max_backups == 0 {
            self.file = File::create(&self.path)?;
        } else {
            let oldest = self.backup_path(self.max_backups);
            if oldest.exists() {
                fs::remove_file(&oldest)?;
            }
            for generation in (1..self.max_backups).rev() {
                let from = self.backup_path(generation);
                if from.exists() {
                    fs::rename(&from, self.backup_path(generation + 1))?;
                }
            }
            fs::rename(&self.path, self.backup_path(1))?;
            self.file = open_append(&self.path)?;
        }

        self.written = 0;
        Ok(())
    }
}

impl Write for SizeRotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
