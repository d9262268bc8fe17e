//! Probing for a running daemon.

use std::net::SocketAddr;

use smartoutlet_core::PROTOCOL_VERSION;
use tracing::debug;

use super::LIFECYCLE_TARGET;
use crate::connection::DaemonClient;

/// Outcome of knocking on the daemon port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// A daemon answered and speaks our protocol version.
    Compatible,
    /// A daemon answered with a different version and is now exiting.
    Incompatible,
    /// Nothing usable answered.
    Unreachable,
}

/// Checks whether a compatible daemon is listening.
pub trait DaemonProbe: Send + Sync {
    /// Probes the daemon at `address`.
    fn probe(&self, address: SocketAddr) -> Probe;
}

/// [`DaemonProbe`] that performs the real handshake over TCP.
#[derive(Debug, Default, Clone, Copy)]
pub struct HandshakeProbe;

impl DaemonProbe for HandshakeProbe {
    fn probe(&self, address: SocketAddr) -> Probe {
        match DaemonClient::new(address).check_version(PROTOCOL_VERSION) {
            Ok(true) => Probe::Compatible,
            Ok(false) => Probe::Incompatible,
            Err(error) => {
                debug!(
                    target: LIFECYCLE_TARGET,
                    %address,
                    error = %error,
                    "daemon probe failed"
                );
                Probe::Unreachable
            }
        }
    }
}
