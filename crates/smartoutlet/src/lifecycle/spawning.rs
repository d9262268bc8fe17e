//! Daemon process spawning.
//!
//! Resolves the daemon binary and starts it in its own process group with
//! null stdio, so it neither shares the caller's terminal nor receives the
//! caller's job-control signals.

use std::env;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use tracing::info;

use super::error::LifecycleError;
use super::{DaemonSettings, LIFECYCLE_TARGET};

/// Environment variable naming the daemon binary.
pub const DAEMON_BIN_ENV: &str = "SMARTOUTLETD_BIN";

const DAEMON_BIN_NAME: &str = "smartoutletd";

/// State of a spawned daemon process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStatus {
    /// Still running.
    Running,
    /// Exited successfully; the daemon has detached into a new process.
    Detached,
    /// Exited with a failure.
    Failed {
        /// Exit code, when available.
        code: Option<i32>,
    },
}

/// A daemon process started by a [`DaemonLauncher`].
pub trait SpawnedDaemon: Send + fmt::Debug {
    /// Polls the process without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::MonitorChild`] when the status cannot be
    /// read.
    fn status(&mut self) -> Result<ChildStatus, LifecycleError>;
}

/// Starts daemon processes.
pub trait DaemonLauncher: Send + Sync {
    /// Starts a daemon for `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::LaunchDaemon`] when the process cannot be
    /// started.
    fn launch(&self, settings: &DaemonSettings) -> Result<Box<dyn SpawnedDaemon>, LifecycleError>;
}

/// [`DaemonLauncher`] that executes the `smartoutletd` binary.
#[derive(Debug, Default, Clone)]
pub struct ProcessLauncher {
    binary_override: Option<OsString>,
}

impl ProcessLauncher {
    /// Launcher that resolves the binary from the environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Launcher that always runs `binary`.
    #[must_use]
    pub fn with_binary(binary: impl Into<OsString>) -> Self {
        Self {
            binary_override: Some(binary.into()),
        }
    }
}

impl DaemonLauncher for ProcessLauncher {
    fn launch(&self, settings: &DaemonSettings) -> Result<Box<dyn SpawnedDaemon>, LifecycleError> {
        let child = spawn_daemon(settings, self.binary_override.as_deref())?;
        Ok(Box::new(ChildProcess(child)))
    }
}

#[derive(Debug)]
struct ChildProcess(Child);

impl SpawnedDaemon for ChildProcess {
    fn status(&mut self) -> Result<ChildStatus, LifecycleError> {
        let status = self
            .0
            .try_wait()
            .map_err(|source| LifecycleError::MonitorChild { source })?;
        Ok(match status {
            None => ChildStatus::Running,
            Some(status) if status.success() => ChildStatus::Detached,
            Some(status) => ChildStatus::Failed {
                code: status.code(),
            },
        })
    }
}

/// Builds the daemon's command line for `settings`.
fn daemon_arguments(settings: &DaemonSettings) -> Vec<OsString> {
    let mut arguments = vec![
        OsString::from("--port"),
        OsString::from(settings.port.to_string()),
    ];
    if let Some(log) = &settings.log {
        arguments.push(OsString::from("--log"));
        arguments.push(OsString::from(log.as_str()));
    }
    arguments
}

fn spawn_daemon(
    settings: &DaemonSettings,
    binary_override: Option<&OsStr>,
) -> Result<Child, LifecycleError> {
    let binary = resolve_daemon_binary(binary_override);
    let mut command = Command::new(&binary);
    command
        .args(daemon_arguments(settings))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    let child = command
        .spawn()
        .map_err(|source| LifecycleError::LaunchDaemon {
            binary: binary.clone(),
            source,
        })?;
    info!(
        target: LIFECYCLE_TARGET,
        binary = ?binary,
        pid = child.id(),
        port = settings.port,
        "spawned daemon"
    );
    Ok(child)
}

/// Picks the binary: explicit override, then `SMARTOUTLETD_BIN`, then a
/// `smartoutletd` next to the current executable, then `PATH`.
fn resolve_daemon_binary(binary_override: Option<&OsStr>) -> OsString {
    binary_override
        .map(OsString::from)
        .or_else(|| env::var_os(DAEMON_BIN_ENV))
        .or_else(|| sibling_binary().map(PathBuf::into_os_string))
        .unwrap_or_else(|| OsString::from(DAEMON_BIN_NAME))
}

fn sibling_binary() -> Option<PathBuf> {
    let executable = env::current_exe().ok()?;
    let candidate = executable
        .parent()?
        .join(DAEMON_BIN_NAME)
        .with_extension(env::consts::EXE_EXTENSION);
    candidate.is_file().then_some(candidate)
}
