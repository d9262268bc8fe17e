//! Per-connection request handling.

use std::io::{Read, Write};

use smartoutlet_core::{
    DaemonRequest, DaemonResponse, ErrorKind, ProtocolError, read_message, write_message,
};
use tracing::{debug, warn};

use super::LISTENER_TARGET;

/// Serves decoded requests for the listener.
pub trait RequestHandler {
    /// Produces the response for one request.
    fn handle(&mut self, request: DaemonRequest) -> DaemonResponse;

    /// Whether the accept loop should exit.
    fn should_stop(&self) -> bool;
}

/// Reads one request, answers it, and returns whether a request was served.
pub(super) fn serve_connection<S, H>(stream: &mut S, handler: &mut H) -> bool
where
    S: Read + Write,
    H: RequestHandler + ?Sized,
{
    let response = match read_message::<DaemonRequest, _>(stream) {
        Ok(request) => {
            debug!(
                target: LISTENER_TARGET,
                operation = request.operation(),
                "request received"
            );
            handler.handle(request)
        }
        Err(ProtocolError::Closed) => {
            debug!(target: LISTENER_TARGET, "connection closed without a request");
            return false;
        }
        Err(ProtocolError::Io(error)) => {
            warn!(target: LISTENER_TARGET, error = %error, "connection read failed");
            return false;
        }
        Err(error) => {
            warn!(target: LISTENER_TARGET, error = %error, "rejected malformed request");
            DaemonResponse::error(ErrorKind::Protocol, error.to_string())
        }
    };
    let served = !matches!(
        response,
        DaemonResponse::Error {
            error: ErrorKind::Protocol,
            ..
        }
    );
    if let Err(error) = write_message(stream, &response) {
        warn!(target: LISTENER_TARGET, error = %error, "connection write failed");
    }
    served
}
