//! Daemon launch sequencing.

use smartoutlet_config::{Config, DAEMON_HOST};
use smartoutlet_drivers::builtin_registry;
use tracing::info;

use crate::cli::DaemonArgs;
use crate::daemon::OutletDaemon;
use crate::telemetry;
use crate::transport::{ServeSummary, bind_with_retry};

use super::PROCESS_TARGET;
use super::daemonizer::{Daemonizer, SystemDaemonizer};
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Launch mode for the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Detach from the launching process and its terminal.
    Background,
    /// Stay attached; used for debugging, supervisors, and tests.
    Foreground,
}

/// Everything needed to run one daemon instance.
#[derive(Debug)]
pub struct LaunchPlan<D, S> {
    /// Resolved configuration.
    pub config: Config,
    /// Whether to detach.
    pub mode: LaunchMode,
    /// Detaching backend.
    pub daemonizer: D,
    /// Source of external shutdown requests.
    pub shutdown: S,
}

/// Runs the daemon with the production collaborators.
///
/// # Errors
///
/// Returns [`LaunchError`] when configuration, binding, telemetry or
/// detaching fails.
pub fn run_daemon(args: &DaemonArgs) -> Result<ServeSummary, LaunchError> {
    let plan = LaunchPlan {
        config: args.resolve_config()?,
        mode: args.mode(),
        daemonizer: SystemDaemonizer,
        shutdown: SystemShutdownSignal,
    };
    run_daemon_with(plan)
}

/// Runs the daemon with injected collaborators.
///
/// The port is bound before detaching, so a daemon that cannot bind exits
/// with a failure status its launcher can observe.
///
/// # Errors
///
/// Returns [`LaunchError`] when any startup step fails. Once serving starts
/// the daemon only returns after its shutdown token is tripped.
pub fn run_daemon_with<D, S>(plan: LaunchPlan<D, S>) -> Result<ServeSummary, LaunchError>
where
    D: Daemonizer,
    S: ShutdownSignal,
{
    let LaunchPlan {
        config,
        mode,
        daemonizer,
        shutdown,
    } = plan;

    let listener = bind_with_retry(DAEMON_HOST, config.daemon_port(), config.bootstrap())?;
    telemetry::initialise(&config)?;
    info!(
        target: PROCESS_TARGET,
        ?mode,
        addr = %listener.local_addr(),
        cache_ttl_ms = config.cache_ttl_ms,
        "starting outlet daemon"
    );
    let registry = builtin_registry(config.network())?;
    if mode == LaunchMode::Background {
        daemonizer.daemonize()?;
    }

    let mut daemon = OutletDaemon::new(registry, config.cache_ttl());
    shutdown.install(&daemon.shutdown_token())?;
    let summary = listener.serve(&mut daemon);
    info!(
        target: PROCESS_TARGET,
        outlets = daemon.registered_outlets(),
        "shutdown sequence completed"
    );
    Ok(summary)
}
