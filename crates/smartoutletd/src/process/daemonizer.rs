//! Detaches the daemon from the process that started it.

use std::ffi::OsStr;

use daemonize_me::Daemon;
use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;

/// Abstraction over daemonisation strategies.
pub trait Daemonizer: Send + Sync {
    /// Detaches the process into the background.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonizeError`] when the process cannot be detached.
    fn daemonize(&self) -> Result<(), DaemonizeError>;
}

/// Errors surfaced by the daemonisation backend.
#[derive(Debug, Error)]
pub enum DaemonizeError {
    /// System-level daemonisation failed.
    #[error("{0}")]
    System(#[from] daemonize_me::DaemonError),
}

/// Daemoniser that delegates to `daemonize-me`.
///
/// The child leaves the caller's session, resets its umask, moves to `/` and
/// points its standard streams at `/dev/null`. The launching process exits
/// with status 0 once the child is running.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDaemonizer;

impl Daemonizer for SystemDaemonizer {
    fn daemonize(&self) -> Result<(), DaemonizeError> {
        info!(target: PROCESS_TARGET, "daemonising into background");
        Daemon::new()
            .work_dir("/")
            .umask(0)
            .name(OsStr::new(env!("CARGO_PKG_NAME")))
            .start()?;
        info!(
            target: PROCESS_TARGET,
            pid = std::process::id(),
            "daemon process detached; continuing in child"
        );
        Ok(())
    }
}
