//! The smart outlet daemon.
//!
//! One `smartoutletd` process per machine owns every outlet driver and a
//! short-lived cache of their states. Clients reach it over a loopback TCP
//! port using the JSONL protocol from [`smartoutlet_core::protocol`], one
//! request per connection. Requests are served strictly one at a time, so a
//! device never sees two overlapping exchanges and the daemon needs no
//! locking.
//!
//! The daemon exits when a client reports a different protocol version,
//! leaving the port free for a compatible replacement, or when it receives a
//! termination signal.

mod cache;
mod cli;
mod daemon;
mod process;
mod telemetry;
mod transport;

pub use cache::{CachedState, Clock, StateCache, SystemClock};
pub use cli::DaemonArgs;
pub use daemon::OutletDaemon;
pub use process::{
    DaemonizeError, Daemonizer, LaunchError, LaunchMode, LaunchPlan, ShutdownError,
    ShutdownSignal, ShutdownToken, SystemDaemonizer, SystemShutdownSignal, run_daemon,
    run_daemon_with,
};
pub use telemetry::{TelemetryError, TelemetryHandle, initialise as initialise_telemetry};
pub use transport::{DaemonListener, ListenerError, RequestHandler, ServeSummary, bind_with_retry};

#[cfg(test)]
mod tests;
