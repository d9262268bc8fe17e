//! One-shot request/response exchanges with the daemon.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::time::Duration;

use smartoutlet_config::DAEMON_HOST;
use smartoutlet_core::{
    DaemonRequest, DaemonResponse, PROTOCOL_VERSION, ProtocolError, read_message, write_message,
};
use thiserror::Error;

/// Bound on connecting to the daemon and on each read or write.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Failures talking to the daemon.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The daemon could not be reached.
    #[error("failed to connect to daemon at {address}: {source}")]
    Connect {
        /// Daemon address.
        address: SocketAddr,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The exchange itself failed.
    #[error("daemon exchange failed: {0}")]
    Protocol(#[from] ProtocolError),
    /// The daemon answered with a response that does not fit the request.
    #[error("unexpected response to {operation}: {response:?}")]
    Unexpected {
        /// Operation that was sent.
        operation: &'static str,
        /// What came back.
        response: Box<DaemonResponse>,
    },
}

/// Address of a reachable daemon.
///
/// Every call opens a fresh connection, sends one request and reads one
/// response, matching the daemon's one-request-per-connection protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonClient {
    address: SocketAddr,
    timeout: Duration,
}

impl DaemonClient {
    /// Client for a daemon at `address`.
    #[must_use]
    pub const fn new(address: SocketAddr) -> Self {
        Self {
            address,
            timeout: CONNECTION_TIMEOUT,
        }
    }

    /// Client for a daemon on the loopback `port`.
    #[must_use]
    pub fn loopback(port: u16) -> Self {
        let host = DAEMON_HOST.parse().unwrap_or(Ipv4Addr::LOCALHOST);
        Self::new(SocketAddr::from((host, port)))
    }

    /// Overrides the connect and IO timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Daemon address.
    #[must_use]
    pub const fn address(&self) -> SocketAddr {
        self.address
    }

    /// Performs one exchange.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] when the daemon is unreachable or the
    /// exchange fails.
    pub fn call(&self, request: &DaemonRequest) -> Result<DaemonResponse, ConnectionError> {
        let mut stream = self.connect()?;
        write_message(&mut stream, request)?;
        Ok(read_message(&mut stream)?)
    }

    /// Runs the protocol handshake.
    ///
    /// A `false` answer means the daemon is exiting to make way for a
    /// compatible one.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] when the exchange fails or the daemon
    /// answers with something other than a version verdict.
    pub fn check_version(&self, version: u32) -> Result<bool, ConnectionError> {
        let request = DaemonRequest::CheckVersion { version };
        match self.call(&request)? {
            DaemonResponse::Version { compatible } => Ok(compatible),
            other => Err(ConnectionError::Unexpected {
                operation: request.operation(),
                response: Box::new(other),
            }),
        }
    }

    /// Runs the handshake with this build's protocol version.
    ///
    /// # Errors
    ///
    /// See [`DaemonClient::check_version`].
    pub fn handshake(&self) -> Result<bool, ConnectionError> {
        self.check_version(PROTOCOL_VERSION)
    }

    fn connect(&self) -> Result<TcpStream, ConnectionError> {
        let connect_error = |source| ConnectionError::Connect {
            address: self.address,
            source,
        };
        let stream = TcpStream::connect_timeout(&self.address, self.timeout).map_err(connect_error)?;
        stream
            .set_read_timeout(Some(self.timeout))
            .map_err(connect_error)?;
        stream
            .set_write_timeout(Some(self.timeout))
            .map_err(connect_error)?;
        Ok(stream)
    }
}
