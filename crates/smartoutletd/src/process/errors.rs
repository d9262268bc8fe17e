//! Unified error surface for launching the daemon.

use smartoutlet_config::ConfigError;
use smartoutlet_core::RegistryError;
use thiserror::Error;

use crate::telemetry::TelemetryError;
use crate::transport::ListenerError;

use super::daemonizer::DaemonizeError;
use super::shutdown::ShutdownError;

/// Errors surfaced while launching or running the daemon process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The configuration file failed to load.
    #[error("failed to load configuration: {source}")]
    Config {
        /// Underlying loader error.
        #[source]
        source: ConfigError,
    },
    /// Telemetry could not be installed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The listener could not be bound.
    #[error("daemon listener failed: {source}")]
    Listener {
        /// Underlying listener error.
        #[source]
        source: ListenerError,
    },
    /// The built-in driver table could not be assembled.
    #[error("failed to build the outlet registry: {source}")]
    Registry {
        /// Underlying registry error.
        #[source]
        source: RegistryError,
    },
    /// Daemonisation failed.
    #[error("failed to daemonise: {source}")]
    Daemonize {
        /// Underlying daemonisation error.
        #[source]
        source: DaemonizeError,
    },
    /// Shutdown notifications could not be installed.
    #[error("failed to install shutdown handlers: {source}")]
    Shutdown {
        /// Underlying shutdown error.
        #[source]
        source: ShutdownError,
    },
}

impl From<ConfigError> for LaunchError {
    fn from(source: ConfigError) -> Self {
        Self::Config { source }
    }
}

impl From<TelemetryError> for LaunchError {
    fn from(source: TelemetryError) -> Self {
        Self::Telemetry { source }
    }
}

impl From<ListenerError> for LaunchError {
    fn from(source: ListenerError) -> Self {
        Self::Listener { source }
    }
}

impl From<RegistryError> for LaunchError {
    fn from(source: RegistryError) -> Self {
        Self::Registry { source }
    }
}

impl From<DaemonizeError> for LaunchError {
    fn from(source: DaemonizeError) -> Self {
        Self::Daemonize { source }
    }
}

impl From<ShutdownError> for LaunchError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}
