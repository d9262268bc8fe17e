//! Process-level concerns: detaching, signals, and the launch sequence.

mod daemonizer;
mod errors;
mod launch;
mod shutdown;

pub use daemonizer::{DaemonizeError, Daemonizer, SystemDaemonizer};
pub use errors::LaunchError;
pub use launch::{LaunchMode, LaunchPlan, run_daemon, run_daemon_with};
pub use shutdown::{ShutdownError, ShutdownSignal, ShutdownToken, SystemShutdownSignal};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
