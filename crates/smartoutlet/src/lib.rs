//! Client library for the smart outlet daemon.
//!
//! Callers describe an outlet with an [`OutletRecord`] and open an
//! [`OutletProxy`] on it. The proxy locates a compatible daemon on the
//! loopback port, starting one if needed, and forwards every query and
//! command to it. The daemon owns the drivers and the state cache, so any
//! number of short-lived client processes share one view of each outlet.
//!
//! ```no_run
//! use smartoutlet::{OutletProxy, OutletRecord};
//!
//! let record = OutletRecord::typed("ap7900")
//!     .with("host", "10.0.0.5")
//!     .with("outlet", 3);
//! let proxy = OutletProxy::connect(record)?;
//! proxy.set_state(true)?;
//! # Ok::<(), smartoutlet::ClientError>(())
//! ```

mod connection;
mod lifecycle;
mod proxy;

pub use connection::{CONNECTION_TIMEOUT, ConnectionError, DaemonClient};
pub use lifecycle::{
    ChildStatus, DAEMON_BIN_ENV, DaemonLauncher, DaemonProbe, DaemonSettings, HandshakeProbe,
    LifecycleError, LifecycleManager, ProcessLauncher, Probe, SpawnedDaemon, connect_or_spawn,
};
pub use proxy::{ClientError, OutletProxy};
pub use smartoutlet_core::{ErrorKind, OutletRecord, PROTOCOL_VERSION, Scalar};

#[cfg(test)]
mod tests;
