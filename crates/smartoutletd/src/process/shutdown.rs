//! Shutdown token and the signals that trip it.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use thiserror::Error;
use tracing::debug;

use super::PROCESS_TARGET;

/// Cloneable flag owned by one daemon instance and watched by its accept
/// loop.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    flag: Arc<AtomicBool>,
}

impl ShutdownToken {
    /// Creates an untripped token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown. Idempotent.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

/// Abstraction over the notifications that end the daemon.
pub trait ShutdownSignal: Send + Sync {
    /// Arranges for `token` to be tripped when the process should exit.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] when the notification cannot be installed.
    fn install(&self, token: &ShutdownToken) -> Result<(), ShutdownError>;
}

/// Errors reported while installing shutdown notifications.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing a signal handler failed.
    #[error("failed to install handler for signal {signal}: {source}")]
    Install {
        /// Signal number.
        signal: i32,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Trips the token on SIGTERM, SIGINT, SIGQUIT or SIGHUP.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdownSignal;

impl ShutdownSignal for SystemShutdownSignal {
    fn install(&self, token: &ShutdownToken) -> Result<(), ShutdownError> {
        for signal in [SIGTERM, SIGINT, SIGQUIT, SIGHUP] {
            signal_hook::flag::register(signal, token.flag())
                .map_err(|source| ShutdownError::Install { signal, source })?;
        }
        debug!(target: PROCESS_TARGET, "shutdown signal handlers installed");
        Ok(())
    }
}
