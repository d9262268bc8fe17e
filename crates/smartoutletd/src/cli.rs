//! Command-line arguments of the `smartoutletd` binary.

use camino::Utf8PathBuf;
use clap::Parser;
use smartoutlet_config::{Config, ConfigError, LogFormat};

use crate::process::LaunchMode;

/// Background daemon multiplexing smart outlet requests.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "smartoutletd", version, about)]
pub struct DaemonArgs {
    /// TOML configuration file; flags below override its values.
    #[arg(long, value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,
    /// Loopback port to listen on.
    #[arg(long)]
    pub port: Option<u16>,
    /// Log file, truncated on start. Logs go to stderr when absent.
    #[arg(long, value_name = "PATH")]
    pub log: Option<Utf8PathBuf>,
    /// `tracing` filter expression.
    #[arg(long, value_name = "FILTER")]
    pub log_filter: Option<String>,
    /// Log output format (`json` or `compact`).
    #[arg(long, value_name = "FORMAT")]
    pub log_format: Option<LogFormat>,
    /// Maximum age of a cached outlet state in milliseconds.
    #[arg(long, value_name = "MS")]
    pub cache_ttl_ms: Option<u64>,
    /// Stay attached to the terminal instead of detaching.
    #[arg(long)]
    pub foreground: bool,
}

impl DaemonArgs {
    /// Loads the configuration file, if any, and applies flag overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration file is unreadable or
    /// invalid.
    pub fn resolve_config(&self) -> Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) => Config::load_from_path(path.as_std_path())?,
            None => Config::default(),
        };
        if let Some(port) = self.port {
            config.daemon_port = port;
        }
        if let Some(log) = &self.log {
            config.log_path = Some(log.clone());
        }
        if let Some(filter) = &self.log_filter {
            config.log_filter.clone_from(filter);
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(ttl) = self.cache_ttl_ms {
            config.cache_ttl_ms = ttl;
        }
        Ok(config)
    }

    /// Requested launch mode.
    #[must_use]
    pub const fn mode(&self) -> LaunchMode {
        if self.foreground {
            LaunchMode::Foreground
        } else {
            LaunchMode::Background
        }
    }
}
