//! Listener implementation for the daemon's loopback port.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use smartoutlet_config::RetryPolicy;
use tracing::{debug, info, warn};

use super::handler::serve_connection;
use super::{LISTENER_TARGET, ListenerError, RequestHandler};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Counters reported when the accept loop exits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServeSummary {
    /// Connections accepted.
    pub connections: usize,
    /// Connections that carried a well-formed request.
    pub requests: usize,
}

/// A bound, non-blocking TCP listener.
#[derive(Debug)]
pub struct DaemonListener {
    listener: TcpListener,
    addr: SocketAddr,
}

/// Binds `host:port`, retrying per `policy` while the port is taken.
///
/// A daemon that has just been told to exit may still hold the port for a
/// moment; the retry budget covers that window.
///
/// # Errors
///
/// Fails immediately when the address cannot be resolved, and with
/// [`ListenerError::BindTcp`] once every attempt has failed.
pub fn bind_with_retry(
    host: &str,
    port: u16,
    policy: RetryPolicy,
) -> Result<DaemonListener, ListenerError> {
    let addr = resolve(host, port)?;
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match TcpListener::bind(addr) {
            Ok(listener) => return DaemonListener::new(listener),
            Err(source) if attempt >= attempts => {
                return Err(ListenerError::BindTcp {
                    addr,
                    attempts,
                    source,
                });
            }
            Err(error) => {
                debug!(
                    target: LISTENER_TARGET,
                    %addr,
                    attempt,
                    error = %error,
                    "bind failed; retrying"
                );
                attempt += 1;
                thread::sleep(policy.interval());
            }
        }
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, ListenerError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?;
    addrs
        .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
        .ok_or_else(|| ListenerError::ResolveEmpty {
            host: host.to_owned(),
            port,
        })
}

impl DaemonListener {
    fn new(listener: TcpListener) -> Result<Self, ListenerError> {
        listener
            .set_nonblocking(true)
            .map_err(|source| ListenerError::NonBlocking { source })?;
        let addr = listener
            .local_addr()
            .map_err(|source| ListenerError::LocalAddr { source })?;
        Ok(Self { listener, addr })
    }

    /// Address actually bound; differs from the request when port 0 was used.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serves connections one at a time until `handler` asks to stop.
    ///
    /// Each request is handled to completion on this thread before the next
    /// connection is accepted.
    pub fn serve<H>(self, handler: &mut H) -> ServeSummary
    where
        H: RequestHandler + ?Sized,
    {
        info!(
            target: LISTENER_TARGET,
            addr = %self.addr,
            "listening for outlet requests"
        );
        let mut summary = ServeSummary::default();
        let mut last_error = None::<io::ErrorKind>;
        while !handler.should_stop() {
            match self.accept() {
                Ok(Some(mut stream)) => {
                    last_error = None;
                    summary.connections += 1;
                    if serve_connection(&mut stream, handler) {
                        summary.requests += 1;
                    }
                }
                Ok(None) => thread::sleep(ACCEPT_BACKOFF),
                Err(error) => {
                    let kind = error.kind();
                    if last_error != Some(kind) {
                        warn!(
                            target: LISTENER_TARGET,
                            error = %error,
                            "socket accept error"
                        );
                    }
                    last_error = Some(kind);
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }
        info!(
            target: LISTENER_TARGET,
            connections = summary.connections,
            requests = summary.requests,
            "listener stopped"
        );
        summary
    }

    fn accept(&self) -> io::Result<Option<TcpStream>> {
        match self.listener.accept() {
            Ok((stream, _)) => {
                stream.set_nonblocking(false)?;
                stream.set_read_timeout(Some(CONNECTION_TIMEOUT))?;
                stream.set_write_timeout(Some(CONNECTION_TIMEOUT))?;
                Ok(Some(stream))
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        }
    }
}
