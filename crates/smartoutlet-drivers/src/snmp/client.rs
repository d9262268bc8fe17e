//! Blocking SNMPv2c requests over UDP.

use std::fmt;
use std::io;
use std::net::{ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use super::ber::{BerError, Oid};
use super::pdu::{PduKind, SnmpMessage, SnmpValue};
use super::SNMP_TARGET;

/// Well-known SNMP agent port.
pub const SNMP_PORT: u16 = 161;

const MAX_DATAGRAM: usize = 65_507;

/// Where and how to send one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnmpTarget {
    /// Agent host name or address.
    pub host: String,
    /// Agent UDP port.
    pub port: u16,
    /// Community string.
    pub community: String,
    /// How long to wait for each response.
    pub timeout: Duration,
    /// Extra attempts after a timeout.
    pub retries: u32,
}

/// Failures of a single SNMP exchange.
#[derive(Debug, Error)]
pub enum SnmpError {
    /// The agent host could not be resolved.
    #[error("cannot resolve SNMP agent '{host}'")]
    Resolve {
        /// Host as configured.
        host: String,
    },
    /// The socket failed.
    #[error("SNMP transport error: {0}")]
    Io(#[from] io::Error),
    /// No matching response arrived in time.
    #[error("SNMP request timed out after {attempts} attempt(s)")]
    Timeout {
        /// Attempts made.
        attempts: u32,
    },
    /// The response could not be decoded.
    #[error("malformed SNMP response: {0}")]
    Decode(#[from] BerError),
    /// The agent answered with a non-zero error status.
    #[error("SNMP agent reported error status {status} at index {index}")]
    Agent {
        /// Error status.
        status: i64,
        /// Offending binding index.
        index: i64,
    },
    /// The agent answered without the requested binding.
    #[error("SNMP response carried no value for {oid}")]
    MissingBinding {
        /// Requested identifier.
        oid: Oid,
    },
}

/// Seam between SNMP drivers and the network.
pub trait SnmpTransport: Send + Sync + fmt::Debug {
    /// Fetches the value bound to `oid`.
    ///
    /// # Errors
    ///
    /// Returns an [`SnmpError`] on any error indication or error status.
    fn get(&self, target: &SnmpTarget, oid: &Oid) -> Result<SnmpValue, SnmpError>;

    /// Assigns `value` to `oid`.
    ///
    /// # Errors
    ///
    /// Returns an [`SnmpError`] on any error indication or error status.
    fn set(&self, target: &SnmpTarget, oid: &Oid, value: SnmpValue) -> Result<(), SnmpError>;
}

/// [`SnmpTransport`] backed by a fresh UDP socket per request.
#[derive(Debug, Default)]
pub struct UdpSnmpClient {
    next_request_id: AtomicI32,
}

impl UdpSnmpClient {
    /// Creates a client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn request_id(&self) -> i32 {
        self.next_request_id
            .fetch_add(1, Ordering::Relaxed)
            .wrapping_add(1)
            & i32::MAX
    }

    fn exchange(
        &self,
        target: &SnmpTarget,
        kind: PduKind,
        oid: &Oid,
        value: SnmpValue,
    ) -> Result<SnmpValue, SnmpError> {
        let address = (target.host.as_str(), target.port)
            .to_socket_addrs()
            .map_err(|_| SnmpError::Resolve {
                host: target.host.clone(),
            })?
            .next()
            .ok_or_else(|| SnmpError::Resolve {
                host: target.host.clone(),
            })?;
        let bind_address = if address.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_address)?;
        socket.connect(address)?;
        socket.set_read_timeout(Some(target.timeout))?;

        let request_id = self.request_id();
        let request =
            SnmpMessage::request(kind, &target.community, request_id, oid.clone(), value)
                .encode();
        let attempts = target.retries.saturating_add(1);
        let mut buffer = vec![0_u8; MAX_DATAGRAM];
        for attempt in 1..=attempts {
            socket.send(&request)?;
            debug!(
                target: SNMP_TARGET,
                host = %target.host,
                oid = %oid,
                attempt,
                "sent SNMP request"
            );
            match receive_response(&socket, &mut buffer, request_id) {
                Ok(response) => return first_binding(response, oid),
                Err(SnmpError::Io(error)) if is_timeout(&error) => continue,
                Err(error) => return Err(error),
            }
        }
        Err(SnmpError::Timeout { attempts })
    }
}

impl SnmpTransport for UdpSnmpClient {
    fn get(&self, target: &SnmpTarget, oid: &Oid) -> Result<SnmpValue, SnmpError> {
        self.exchange(target, PduKind::Get, oid, SnmpValue::Null)
    }

    fn set(&self, target: &SnmpTarget, oid: &Oid, value: SnmpValue) -> Result<(), SnmpError> {
        self.exchange(target, PduKind::Set, oid, value).map(drop)
    }
}

fn receive_response(
    socket: &UdpSocket,
    buffer: &mut [u8],
    request_id: i32,
) -> Result<SnmpMessage, SnmpError> {
    loop {
        let received = socket.recv(buffer)?;
        let datagram = buffer.get(..received).unwrap_or_default();
        let message = SnmpMessage::decode(datagram)?;
        if message.kind == PduKind::Response && message.request_id == request_id {
            return Ok(message);
        }
        debug!(
            target: SNMP_TARGET,
            request_id = message.request_id,
            "discarding unrelated SNMP datagram"
        );
    }
}

fn first_binding(response: SnmpMessage, oid: &Oid) -> Result<SnmpValue, SnmpError> {
    if response.error_status != 0 {
        return Err(SnmpError::Agent {
            status: response.error_status,
            index: response.error_index,
        });
    }
    response
        .bindings
        .into_iter()
        .next()
        .map(|(_, value)| value)
        .ok_or_else(|| SnmpError::MissingBinding { oid: oid.clone() })
}

fn is_timeout(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
