//! Shared configuration for the smart outlet daemon and its clients.
//!
//! Both the client library and `smartoutletd` agree on the loopback port, the
//! bootstrap retry budget, and the cache freshness window through [`Config`].
//! Every field carries a compiled-in default so an empty TOML document (or no
//! document at all) yields a working configuration.

mod defaults;
mod logging;
mod policy;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DAEMON_HOST, DEFAULT_CACHE_TTL_MS, DEFAULT_DAEMON_PORT, DEFAULT_LOG_FILTER,
    default_cache_ttl_ms, default_daemon_port, default_log_filter, default_log_filter_string,
    default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use policy::{NetworkPolicy, RetryPolicy};

/// Runtime configuration shared by the daemon and the client bootstrap.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Loopback TCP port the daemon listens on.
    pub daemon_port: u16,
    /// Optional log file, truncated each time a fresh daemon starts.
    pub log_path: Option<Utf8PathBuf>,
    /// `tracing` filter expression.
    pub log_filter: String,
    /// Output format of the daemon log.
    pub log_format: LogFormat,
    /// Maximum age of a cached outlet state in milliseconds.
    pub cache_ttl_ms: u64,
    /// Retry budget used both for binding the listener and for waiting on a
    /// freshly spawned daemon.
    pub bootstrap: RetryPolicy,
    /// Network budget applied by outlet drivers.
    pub network: NetworkPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_port: default_daemon_port(),
            log_path: None,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            cache_ttl_ms: default_cache_ttl_ms(),
            bootstrap: RetryPolicy::default(),
            network: NetworkPolicy::default(),
        }
    }
}

impl Config {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the document is malformed or names
    /// an unknown field.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            source: Box::new(source),
        })
    }

    /// Loads a configuration file from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read and
    /// [`ConfigError::ParseFile`] when its contents are invalid.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: Box::new(source),
        })
    }

    /// Port the daemon binds on the loopback interface.
    #[must_use]
    pub const fn daemon_port(&self) -> u16 {
        self.daemon_port
    }

    /// Log file destination, if any.
    #[must_use]
    pub fn log_path(&self) -> Option<&Utf8Path> {
        self.log_path.as_deref()
    }

    /// Configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Configured log format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Freshness window for cached outlet states.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Retry budget for binding and connecting during bootstrap.
    #[must_use]
    pub const fn bootstrap(&self) -> RetryPolicy {
        self.bootstrap
    }

    /// Network budget handed to drivers.
    #[must_use]
    pub const fn network(&self) -> NetworkPolicy {
        self.network
    }
}

/// Errors raised while loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration '{path}': {source}")]
    Read {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration text was not valid.
    #[error("invalid configuration: {source}")]
    Parse {
        /// Underlying TOML error.
        #[source]
        source: Box<toml::de::Error>,
    },
    /// A configuration file contained invalid text.
    #[error("invalid configuration '{path}': {source}")]
    ParseFile {
        /// File that contained the text.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: Box<toml::de::Error>,
    },
}
