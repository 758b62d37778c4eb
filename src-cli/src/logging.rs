//! Logging setup for the command-line tool.
//!
//! Console output goes to stderr so listings on stdout stay clean for
//! piping. Its level follows the `-v` count, and `RUST_LOG` overrides it.
//! Every run also appends JSON records to a rolling file under the log
//! directory, unless file logging is switched off.

use std::path::PathBuf;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Targets whose events are logged at the configured levels.
const OWN_TARGETS: [&str; 2] = ["cloudlist", "cloudlist_core"];

/// Prefix of the log file names.
const LOG_FILE_PREFIX: &str = "cloudlist";

/// Where and how much to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Level for console output.
    pub console_level: Level,
    /// Directory of the JSON log files, `None` to skip file logging.
    pub log_directory: Option<PathBuf>,
    /// Start a new file every hour instead of every day.
    pub hourly_rotation: bool,
}

impl LoggingConfig {
    /// Configuration for a run with `verbosity` `-v` flags.
    ///
    /// Debug builds rotate hourly so a development session's logs stay small.
    #[must_use]
    pub fn from_verbosity(verbosity: u8) -> Self {
        Self {
            console_level: console_level(verbosity),
            log_directory: Some(default_log_directory()),
            hourly_rotation: cfg!(debug_assertions),
        }
    }

    /// Write log files to `dir` instead of the default location.
    #[must_use]
    pub fn with_log_directory(mut self, dir: Option<PathBuf>) -> Self {
        if dir.is_some() {
            self.log_directory = dir;
        }
        self
    }

    /// Turn file logging off.
    #[must_use]
    pub fn without_file(mut self) -> Self {
        self.log_directory = None;
        self
    }

    fn rotation(&self) -> Rotation {
        if self.hourly_rotation {
            Rotation::HOURLY
        } else {
            Rotation::DAILY
        }
    }
}

/// Console level for a number of `-v` flags.
const fn console_level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Keeps the file writer alive; dropping it flushes pending records.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a subscriber
/// is already installed.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let console_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => own_targets_filter(config.console_level)?,
    };
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_filter);

    let (file_layer, file_guard) = match &config.log_directory {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| LoggingError::DirectoryCreationFailed {
                path: dir.clone(),
                reason: e.to_string(),
            })?;
            let appender = RollingFileAppender::new(config.rotation(), dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .json()
                .with_filter(own_targets_filter(Level::DEBUG)?);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Filter that shows only warnings from dependencies and `level` from our
/// own crates.
fn own_targets_filter(level: Level) -> Result<EnvFilter, LoggingError> {
    OWN_TARGETS
        .iter()
        .try_fold(EnvFilter::new("warn"), |filter, target| {
            Ok(filter.add_directive(target_directive(target, level)?))
        })
}

fn target_directive(target: &str, level: Level) -> Result<Directive, LoggingError> {
    let directive = format!("{target}={}", level.as_str().to_lowercase());
    directive
        .parse()
        .map_err(|_| LoggingError::InvalidDirective(directive))
}

/// Default directory of the log files.
#[must_use]
pub fn default_log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cloudlist")
        .join("logs")
}

/// Errors raised while installing the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The log directory could not be created.
    #[error("Failed to create log directory {path}: {reason}")]
    DirectoryCreationFailed {
        /// Directory that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        reason: String,
    },

    /// A filter directive did not parse.
    #[error("Invalid log directive: {0}")]
    InvalidDirective(String),

    /// A global subscriber was installed earlier.
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(LoggingConfig::from_verbosity(0).console_level, Level::WARN);
        assert_eq!(LoggingConfig::from_verbosity(1).console_level, Level::INFO);
        assert_eq!(LoggingConfig::from_verbosity(2).console_level, Level::DEBUG);
        assert_eq!(LoggingConfig::from_verbosity(7).console_level, Level::TRACE);
    }

    #[test]
    fn test_log_directory_override() {
        let config = LoggingConfig::from_verbosity(0);
        assert_eq!(config.log_directory, Some(default_log_directory()));

        let custom = PathBuf::from("/tmp/cloudlist-logs");
        let config = config.with_log_directory(Some(custom.clone()));
        assert_eq!(config.log_directory, Some(custom.clone()));

        let config = config.with_log_directory(None);
        assert_eq!(config.log_directory, Some(custom));
        assert_eq!(config.without_file().log_directory, None);
    }

    #[test]
    fn test_rotation() {
        let mut config = LoggingConfig::from_verbosity(0);
        config.hourly_rotation = true;
        assert!(matches!(config.rotation(), Rotation::HOURLY));
        config.hourly_rotation = false;
        assert!(matches!(config.rotation(), Rotation::DAILY));
    }

    #[test]
    fn test_own_targets_filter() {
        let filter = own_targets_filter(Level::DEBUG).expect("Should build");
        let rendered = filter.to_string();
        assert!(rendered.contains("cloudlist=debug"));
        assert!(rendered.contains("cloudlist_core=debug"));
    }

    #[test]
    fn test_default_log_directory() {
        let dir = default_log_directory();
        assert!(dir.ends_with("cloudlist/logs"));
    }
}
