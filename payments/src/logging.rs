//! Logging setup for processes embedding the payment engine.
//!
//! Console output goes to stderr; file output goes to a daily-rolling log
//! in a configured directory, written from a background worker.

use std::fs;
use std::path::PathBuf;

use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{LoggingError, LoggingResult};

/// Default prefix of rolled log files.
pub const DEFAULT_FILE_PREFIX: &str = "smartnode-payments";

/// Keeps the file writer alive. Buffered entries are flushed on drop.
#[derive(Debug)]
pub struct LoggingGuard {
    _worker_guard: Option<WorkerGuard>,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Level filter. Falls back to `RUST_LOG`, then INFO.
    pub level: Option<LevelFilter>,
    /// Write to stderr.
    pub console: bool,
    pub file: Option<LogFileConfig>,
}

#[derive(Debug, Clone)]
pub struct LogFileConfig {
    pub log_dir: PathBuf,
    /// Files are named `<file_prefix>.<date>.log`.
    pub file_prefix: String,
    /// Rolled files kept on disk.
    pub max_files: usize,
}

impl LogFileConfig {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            max_files: 14,
        }
    }
}

/// Console-only logging at `level`.
pub fn init_console_logging(level: LevelFilter) -> LoggingResult<LoggingGuard> {
    init_logging(LoggingConfig {
        level: Some(level),
        console: true,
        file: None,
    })
}

/// Installs the global subscriber described by `config`.
///
/// With neither console nor file output, nothing is installed and the
/// tracing macros stay no-ops.
///
/// # Errors
///
/// Fails when the log directory cannot be created or a global subscriber
/// is already set.
pub fn init_logging(config: LoggingConfig) -> LoggingResult<LoggingGuard> {
    if !config.console && config.file.is_none() {
        return Ok(LoggingGuard {
            _worker_guard: None,
        });
    }

    let env_filter = env_filter(config.level);

    let (file_layer, guard) = match &config.file {
        Some(file_config) => {
            let (writer, guard) = file_writer(file_config)?;
            let layer = fmt::layer().with_target(true).with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    let console_layer =
        config.console.then(|| fmt::layer().with_target(true).with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| LoggingError::SubscriberInit(e.to_string()))?;

    Ok(LoggingGuard {
        _worker_guard: guard,
    })
}

fn env_filter(level: Option<LevelFilter>) -> EnvFilter {
    match level {
        Some(level) => EnvFilter::new(level.to_string()),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(LevelFilter::INFO.to_string())),
    }
}

fn file_writer(config: &LogFileConfig) -> LoggingResult<(NonBlocking, WorkerGuard)> {
    fs::create_dir_all(&config.log_dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(&config.file_prefix)
        .filename_suffix("log")
        .max_log_files(config.max_files.max(1))
        .build(&config.log_dir)
        .map_err(|e| LoggingError::FileAppender(e.to_string()))?;
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_no_output_is_a_noop() {
        let guard = init_logging(LoggingConfig {
            level: Some(LevelFilter::DEBUG),
            console: false,
            file: None,
        })
        .unwrap();
        assert!(guard._worker_guard.is_none());
    }

    #[test]
    fn test_file_writer_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = temp_dir.path().join("nested").join("logs");
        let config = LogFileConfig::new(&log_dir);

        let (mut writer, guard) = file_writer(&config).unwrap();
        writeln!(writer, "INFO connected block").unwrap();
        drop(guard);

        let files: Vec<_> = fs::read_dir(&log_dir).unwrap().filter_map(|e| e.ok()).collect();
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().to_string_lossy().to_string();
        assert!(name.starts_with(DEFAULT_FILE_PREFIX));
        assert!(name.ends_with(".log"));
        let contents = fs::read_to_string(files[0].path()).unwrap();
        assert!(contents.contains("connected block"));
    }

    #[test]
    fn test_file_writer_rejects_file_as_directory() {
        let temp_dir = TempDir::new().unwrap();
        let not_a_dir = temp_dir.path().join("occupied");
        fs::File::create(&not_a_dir).unwrap();

        let result = file_writer(&LogFileConfig::new(&not_a_dir));
        assert!(matches!(result, Err(LoggingError::DirectoryCreation(_))));
    }

    #[test]
    fn test_explicit_level_wins_over_environment() {
        let filter = env_filter(Some(LevelFilter::WARN));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    }
}
