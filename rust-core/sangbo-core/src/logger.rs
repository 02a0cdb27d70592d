//! # Logging
//!
//! Installs the global `tracing` subscriber: text or JSON lines on stdout,
//! mirrored into one append-only file per day (`<path>/<YYYY-MM-DD>.log`).
//!
//! The level comes from [`LogConfig::level`] unless `RUST_LOG` is set.

use crate::config::LogConfig;
use crate::error::{Error, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Writer factory appending to the current day's log file
#[derive(Debug, Clone)]
pub struct DailyFile {
    dir: PathBuf,
}

impl DailyFile {
    /// Log into `dir`, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| Error::Config {
            message: format!("log path {}: {e}", dir.display()),
        })?;
        Ok(Self { dir })
    }

    /// File receiving today's lines
    #[must_use]
    pub fn current_path(&self) -> PathBuf {
        file_for_day(&self.dir, &chrono::Local::now().format("%Y-%m-%d").to_string())
    }

    fn open(&self) -> io::Result<File> {
        OpenOptions::new().create(true).append(true).open(self.current_path())
    }
}

/// `<dir>/<day>.log`
#[must_use]
pub fn file_for_day(dir: &Path, day: &str) -> PathBuf {
    dir.join(format!("{day}.log"))
}

impl<'a> MakeWriter<'a> for DailyFile {
    type Writer = Box<dyn Write + 'a>;

    fn make_writer(&'a self) -> Self::Writer {
        match self.open() {
            Ok(file) => Box::new(file),
            Err(_) => Box::new(io::sink()),
        }
    }
}

/// Level filter: `RUST_LOG` wins, then `level`, then `info`
#[must_use]
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber
///
/// # Errors
///
/// Returns `Error::Config` if the log directory cannot be created or a
/// global subscriber is already installed.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter = env_filter(&config.level);
    let already = |e: Box<dyn std::error::Error + Send + Sync>| Error::Config {
        message: format!("logger: {e}"),
    };

    match (&config.path, config.json) {
        (Some(path), true) => {
            let writer = io::stdout.and(DailyFile::new(path)?);
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(writer)
                .try_init()
                .map_err(already)
        }
        (Some(path), false) => {
            let writer = io::stdout.and(DailyFile::new(path)?);
            tracing_subscriber::fmt()
                .with_ansi(false)
                .with_env_filter(filter)
                .with_writer(writer)
                .try_init()
                .map_err(already)
        }
        (None, true) => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
            .map_err(already),
        (None, false) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(already),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_file_appends() {
        let dir = tempfile::tempdir().unwrap();
        let daily = DailyFile::new(dir.path().join("logs")).unwrap();

        daily.make_writer().write_all(b"first\n").unwrap();
        daily.make_writer().write_all(b"second\n").unwrap();

        let content = fs::read_to_string(daily.current_path()).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn test_file_name_is_the_day() {
        let path = file_for_day(Path::new("/var/log/app"), "2024-01-31");
        assert_eq!(path, PathBuf::from("/var/log/app/2024-01-31.log"));

        let dir = tempfile::tempdir().unwrap();
        let daily = DailyFile::new(dir.path()).unwrap();
        let name = daily.current_path().file_name().unwrap().to_string_lossy().into_owned();
        let day = name.trim_end_matches(".log");
        assert!(chrono::NaiveDate::parse_from_str(day, "%Y-%m-%d").is_ok());
    }

    #[test]
    fn test_env_filter_falls_back() {
        let filter = env_filter("not a [valid filter");
        assert!(!filter.to_string().is_empty());
    }
}
