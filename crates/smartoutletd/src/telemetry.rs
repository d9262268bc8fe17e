//! Structured telemetry initialisation for the daemon.

use std::fs::File;
use std::io::{self, IsTerminal};
use std::sync::Mutex;

use camino::Utf8Path;
use once_cell::sync::OnceCell;
use smartoutlet_config::{Config, LogFormat};
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the configured log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// The log file could not be created.
    #[error("failed to open log file '{path}': {source}")]
    LogFile {
        /// Configured log path.
        path: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Configures the global tracing subscriber when invoked for the first time.
///
/// Logs go to the configured file, truncated first, or to stderr. Repeated
/// calls are idempotent: only the first one installs a subscriber or touches
/// the log file.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid, the log file cannot
/// be created, or another subscriber is already installed.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|_| TelemetryHandle)
}

fn install_subscriber(config: &Config) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(config.log_filter())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;
    let (writer, ansi) = match config.log_path() {
        Some(path) => (BoxMakeWriter::new(Mutex::new(open_log_file(path)?)), false),
        None => (BoxMakeWriter::new(io::stderr), io::stderr().is_terminal()),
    };

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_timer(fmt::time::UtcTime::rfc_3339());

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

/// Creates the log file, discarding output from a previous daemon.
fn open_log_file(path: &Utf8Path) -> Result<File, TelemetryError> {
    File::create(path).map_err(|source| TelemetryError::LogFile {
        path: path.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use camino::Utf8PathBuf;

    use super::*;

    #[test]
    fn initialise_is_idempotent() {
        let config = Config::default();
        let first = initialise(&config).expect("first initialisation");
        let second = initialise(&config).expect("second initialisation");
        drop(first);
        drop(second);
    }

    #[test]
    fn log_files_are_truncated_on_open() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("smartoutletd.log"))
            .expect("utf8 path");
        fs::write(&path, "output from the previous daemon\n").expect("seed log");

        let file = open_log_file(&path).expect("open log");
        drop(file);

        assert_eq!(fs::read_to_string(&path).expect("read log"), "");
    }

    #[test]
    fn unwritable_log_paths_are_reported() {
        let error = open_log_file(Utf8Path::new("/nonexistent/dir/smartoutletd.log"))
            .expect_err("directory is missing");
        assert!(matches!(error, TelemetryError::LogFile { .. }));
    }
}
