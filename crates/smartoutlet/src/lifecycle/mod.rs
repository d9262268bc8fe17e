//! Connect-or-spawn bootstrap for the outlet daemon.
//!
//! Any number of clients may race to "ensure a daemon exists". Each one
//! probes the port, spawns a daemon if nothing compatible answers, then polls
//! until a compatible daemon does. Only one daemon can bind the port, so the
//! racers converge on the same instance; a spawned daemon that loses the race
//! simply fails to bind and exits.
//!
//! - [`probe`] performs the version handshake.
//! - [`spawning`] resolves and starts the daemon binary.
//! - [`error`] captures the failures surfaced to callers.

mod error;
mod probe;
mod spawning;

use std::net::SocketAddr;
use std::thread;

use camino::Utf8PathBuf;
use smartoutlet_config::{Config, RetryPolicy};
use tracing::{debug, info};

pub use error::LifecycleError;
pub use probe::{DaemonProbe, HandshakeProbe, Probe};
pub use spawning::{
    ChildStatus, DAEMON_BIN_ENV, DaemonLauncher, ProcessLauncher, SpawnedDaemon,
};

use crate::connection::DaemonClient;

const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

/// Where the daemon listens and what it is started with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonSettings {
    /// Loopback port.
    pub port: u16,
    /// Log file handed to a freshly spawned daemon.
    pub log: Option<Utf8PathBuf>,
}

impl DaemonSettings {
    /// Settings drawn from `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            port: config.daemon_port(),
            log: config.log_path().map(ToOwned::to_owned),
        }
    }
}

/// Locates or starts the daemon.
#[derive(Debug)]
pub struct LifecycleManager<P = HandshakeProbe, L = ProcessLauncher> {
    settings: DaemonSettings,
    policy: RetryPolicy,
    probe: P,
    launcher: L,
}

impl LifecycleManager {
    /// Manager using the real handshake and the `smartoutletd` binary.
    #[must_use]
    pub fn system(settings: DaemonSettings, policy: RetryPolicy) -> Self {
        Self::new(settings, policy, HandshakeProbe, ProcessLauncher::new())
    }
}

impl<P: DaemonProbe, L: DaemonLauncher> LifecycleManager<P, L> {
    /// Manager with injected collaborators.
    #[must_use]
    pub const fn new(settings: DaemonSettings, policy: RetryPolicy, probe: P, launcher: L) -> Self {
        Self {
            settings,
            policy,
            probe,
            launcher,
        }
    }

    /// Daemon address on the loopback interface.
    #[must_use]
    pub fn address(&self) -> SocketAddr {
        DaemonClient::loopback(self.settings.port).address()
    }

    /// Returns a client for a compatible daemon, spawning one if needed.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when the daemon cannot be spawned, exits
    /// with a failure before answering, or does not answer within the retry
    /// budget.
    pub fn connect_or_spawn(&self) -> Result<DaemonClient, LifecycleError> {
        let address = self.address();
        match self.probe.probe(address) {
            Probe::Compatible => {
                debug!(target: LIFECYCLE_TARGET, %address, "reusing running daemon");
                return Ok(DaemonClient::new(address));
            }
            Probe::Incompatible => info!(
                target: LIFECYCLE_TARGET,
                %address,
                "running daemon is incompatible; starting a replacement"
            ),
            Probe::Unreachable => info!(
                target: LIFECYCLE_TARGET,
                %address,
                "no daemon answered; starting one"
            ),
        }
        let mut spawned = self.launcher.launch(&self.settings)?;
        self.wait_for_daemon(address, spawned.as_mut())
    }

    fn wait_for_daemon(
        &self,
        address: SocketAddr,
        spawned: &mut dyn SpawnedDaemon,
    ) -> Result<DaemonClient, LifecycleError> {
        let attempts = self.policy.attempts.max(1);
        for attempt in 1..=attempts {
            if self.probe.probe(address) == Probe::Compatible {
                info!(target: LIFECYCLE_TARGET, %address, attempt, "daemon ready");
                return Ok(DaemonClient::new(address));
            }
            if let ChildStatus::Failed { code } = spawned.status()? {
                return Err(LifecycleError::StartupFailed { exit_status: code });
            }
            thread::sleep(self.policy.interval());
        }
        Err(LifecycleError::StartupTimeout { address, attempts })
    }
}

/// Connects to the daemon described by `config`, spawning it if needed.
///
/// # Errors
///
/// See [`LifecycleManager::connect_or_spawn`].
pub fn connect_or_spawn(config: &Config) -> Result<DaemonClient, LifecycleError> {
    LifecycleManager::system(DaemonSettings::from_config(config), config.bootstrap())
        .connect_or_spawn()
}
