//! Error types for listener operations.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors surfaced while binding or running the listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The listen address could not be resolved.
    #[error("failed to resolve TCP address {host}:{port}: {source}")]
    Resolve {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },
    /// Resolution produced no usable address.
    #[error("no TCP addresses resolved for {host}:{port}")]
    ResolveEmpty {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
    },
    /// Binding kept failing for the whole retry budget.
    #[error("failed to bind TCP listener at {addr} after {attempts} attempts: {source}")]
    BindTcp {
        /// Address that could not be bound.
        addr: SocketAddr,
        /// Attempts made.
        attempts: u32,
        /// Error from the last attempt.
        #[source]
        source: io::Error,
    },
    /// The bound socket could not be switched to non-blocking mode.
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The bound socket could not report its address.
    #[error("failed to read listener address: {source}")]
    LocalAddr {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}
