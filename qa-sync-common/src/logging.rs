//! Logging setup and log file management
//!
//! Log output goes through `tracing`. When a log directory is configured,
//! events are additionally written to numbered per-day files named
//! `logfile_DD_MM_YYYY-NNN.log`; a file rolls over to the next number once
//! it reaches the configured line count. The notifier attaches the most
//! recent files to its report and `clear_logs` enforces retention.

use crate::config::LoggingConfig;
use crate::{Error, Result};
use chrono::{Duration, Local, NaiveDate};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "logfile_";
const LOG_FILE_SUFFIX: &str = ".log";
const LOG_FILE_DATE_FORMAT: &str = "%d_%m_%Y";
const MAX_FILES_PER_DAY: u32 = 1000;

/// Severity levels used across qa-sync, ordered `Debug < Run < Warning < Error < Critical`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Run,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Parse a level name, accepting both legacy names and tracing names
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "DEBUG" | "TRACE" => Some(LogLevel::Debug),
            "RUN" | "INFO" => Some(LogLevel::Run),
            "WARNING" | "WARN" => Some(LogLevel::Warning),
            "ERROR" => Some(LogLevel::Error),
            "CRITICAL" => Some(LogLevel::Critical),
            _ => None,
        }
    }

    /// Equivalent tracing level (CRITICAL collapses onto ERROR)
    pub fn as_tracing_level(self) -> Level {
        match self {
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Run => Level::INFO,
            LogLevel::Warning => Level::WARN,
            LogLevel::Error | LogLevel::Critical => Level::ERROR,
        }
    }
}

/// Initialize the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let level = LogLevel::parse(&config.level).ok_or_else(|| {
        Error::Config(format!("Unknown log level: {}", config.level))
    })?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_tracing_level().as_str().to_lowercase()));

    let file_layer = match &config.directory {
        Some(dir) => {
            let writer = RollingFileWriter::open(dir, config.max_lines)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(writer)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Internal(format!("Failed to install tracing subscriber: {}", e)))
}

/// File name for the `sequence`-th log file of `date`
pub fn log_file_name(date: NaiveDate, sequence: u32) -> String {
    format!(
        "{}{}-{:03}{}",
        LOG_FILE_PREFIX,
        date.format(LOG_FILE_DATE_FORMAT),
        sequence,
        LOG_FILE_SUFFIX
    )
}

/// Date encoded in a log file name, if the name follows the log file pattern
pub fn parse_log_file_date(file_name: &str) -> Option<NaiveDate> {
    let stem = file_name
        .strip_prefix(LOG_FILE_PREFIX)?
        .strip_suffix(LOG_FILE_SUFFIX)?;
    let (date_part, sequence) = stem.rsplit_once('-')?;
    if sequence.len() != 3 || !sequence.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(date_part, LOG_FILE_DATE_FORMAT).ok()
}

/// Create the first unused log file for `date` in `dir`
pub fn create_next_log_file(dir: &Path, date: NaiveDate) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    for sequence in 0..MAX_FILES_PER_DAY {
        let path = dir.join(log_file_name(date, sequence));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => return Ok(path),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(Error::Internal(format!(
        "All {} log files for {} already exist in {}",
        MAX_FILES_PER_DAY,
        date,
        dir.display()
    )))
}

/// Log files in `dir` dated within the last `days` days (inclusive)
pub fn recent_log_files(dir: &Path, days: u32, today: NaiveDate) -> Result<Vec<PathBuf>> {
    let border = today - Duration::days(i64::from(days));
    let mut files = dated_log_files(dir)?
        .into_iter()
        .filter(|(date, _)| *date >= border)
        .map(|(_, path)| path)
        .collect::<Vec<_>>();
    files.sort();
    Ok(files)
}

/// Delete log files older than `days` days; returns the removed paths
pub fn clear_logs(dir: &Path, days: u32, today: NaiveDate) -> Result<Vec<PathBuf>> {
    let border = today - Duration::days(i64::from(days));
    let mut removed = Vec::new();

    for (date, path) in dated_log_files(dir)? {
        if date < border {
            std::fs::remove_file(&path)?;
            tracing::debug!("Removed expired log file {}", path.display());
            removed.push(path);
        }
    }

    removed.sort();
    Ok(removed)
}

fn dated_log_files(dir: &Path) -> Result<Vec<(NaiveDate, PathBuf)>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(date) = name.to_str().and_then(parse_log_file_date) {
            files.push((date, entry.path()));
        }
    }
    Ok(files)
}

/// Line-counting writer that rolls to the next numbered file
pub struct RollingFileWriter {
    dir: PathBuf,
    max_lines: usize,
    file: File,
    path: PathBuf,
    lines: usize,
}

impl RollingFileWriter {
    /// Open a fresh log file for today in `dir`
    pub fn open(dir: &Path, max_lines: usize) -> Result<Self> {
        let path = create_next_log_file(dir, Local::now().date_naive())?;
        let file = OpenOptions::new().append(true).open(&path)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            max_lines: max_lines.max(1),
            file,
            path,
            lines: 0,
        })
    }

    /// Path of the file currently written to
    pub fn current_path(&self) -> &Path {
        &self.path
    }

    fn roll(&mut self) -> io::Result<()> {
        self.file.flush()?;
        let path = create_next_log_file(&self.dir, Local::now().date_naive())
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        self.file = OpenOptions::new().append(true).open(&path)?;
        self.path = path;
        self.lines = 0;
        Ok(())
    }
}

impl Write for RollingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.lines >= self.max_lines {
            self.roll()?;
        }
        let written = self.file.write(buf)?;
        self.lines += buf[..written].iter().filter(|b| **b == b'\n').count();
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
