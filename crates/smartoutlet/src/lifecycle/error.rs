//! Error types for locating or starting the daemon.

use std::ffi::OsString;
use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors raised while bootstrapping a daemon connection.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The daemon binary could not be started.
    #[error("failed to spawn smartoutletd binary '{binary:?}': {source}")]
    LaunchDaemon {
        /// Binary that was executed.
        binary: OsString,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Checking on the spawned process failed.
    #[error("failed to monitor daemon launch: {source}")]
    MonitorChild {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The spawned process exited with a failure before answering.
    #[error("daemon exited before accepting connections (status: {exit_status:?})")]
    StartupFailed {
        /// Exit code, when the process was not killed by a signal.
        exit_status: Option<i32>,
    },
    /// No compatible daemon answered within the retry budget.
    #[error("no compatible daemon answered at {address} after {attempts} attempts")]
    StartupTimeout {
        /// Address that was polled.
        address: SocketAddr,
        /// Attempts made.
        attempts: u32,
    },
}
