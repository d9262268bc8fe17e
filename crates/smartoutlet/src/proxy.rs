//! Client-side outlet handle forwarding every call to the daemon.

use camino::Utf8PathBuf;
use smartoutlet_config::Config;
use smartoutlet_core::{
    DaemonRequest, DaemonResponse, ErrorKind, LOG_FIELD, OutletRecord, PORT_FIELD, RecordError,
    Scalar, ScalarKind,
};
use thiserror::Error;
use tracing::debug;

use crate::connection::{ConnectionError, DaemonClient};
use crate::lifecycle::{self, LifecycleError};

const PROXY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::proxy");

/// Failures surfaced by [`OutletProxy`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// No compatible daemon could be reached or started.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    /// A call to the daemon failed in transit.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    /// A connection-only field was malformed.
    #[error("invalid connection field: {0}")]
    Record(#[from] RecordError),
    /// The record names no driver.
    #[error("outlet record has no 'type' field")]
    MissingType,
    /// The daemon rejected the request.
    #[error("daemon rejected the request ({kind}): {message}")]
    Daemon {
        /// Failure category reported by the daemon.
        kind: ErrorKind,
        /// Daemon-supplied detail.
        message: String,
    },
    /// The daemon answered with a response that does not fit the request.
    #[error("unexpected response to {operation}: {response:?}")]
    UnexpectedResponse {
        /// Operation that was sent.
        operation: &'static str,
        /// What came back.
        response: Box<DaemonResponse>,
    },
}

/// Connection-only fields split off a caller's record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ConnectionFields {
    port: Option<u16>,
    log: Option<Utf8PathBuf>,
}

impl ConnectionFields {
    fn apply(self, config: &Config) -> Config {
        let mut config = config.clone();
        if let Some(port) = self.port {
            config.daemon_port = port;
        }
        if let Some(log) = self.log {
            config.log_path = Some(log);
        }
        config
    }
}

/// Live handle on one outlet, served by the daemon.
///
/// The proxy holds only the daemon address and the outlet record; it keeps
/// no state cache of its own. It is deliberately not serialisable: persist
/// the record instead and reconnect with [`OutletProxy::connect`].
#[derive(Debug, Clone)]
pub struct OutletProxy {
    client: DaemonClient,
    record: OutletRecord,
}

impl OutletProxy {
    /// Connects using the default configuration, honouring `port` and `log`
    /// fields in `record`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the record is unusable or no compatible
    /// daemon can be reached or started.
    pub fn connect(record: OutletRecord) -> Result<Self, ClientError> {
        Self::connect_with(&Config::default(), record)
    }

    /// Connects using `config`, with `port` and `log` fields in `record`
    /// taking precedence.
    ///
    /// # Errors
    ///
    /// See [`OutletProxy::connect`].
    pub fn connect_with(config: &Config, mut record: OutletRecord) -> Result<Self, ClientError> {
        let fields = split_connection_fields(&mut record)?;
        require_type(&record)?;
        let config = fields.apply(config);
        let client = lifecycle::connect_or_spawn(&config)?;
        Ok(Self { client, record })
    }

    /// Wraps an established daemon client.
    ///
    /// Connection-only fields are dropped from `record` so they never reach
    /// the daemon.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MissingType`] when the record names no driver.
    pub fn new(client: DaemonClient, mut record: OutletRecord) -> Result<Self, ClientError> {
        record.remove(PORT_FIELD);
        record.remove(LOG_FIELD);
        require_type(&record)?;
        Ok(Self { client, record })
    }

    /// Record forwarded with every call.
    #[must_use]
    pub const fn record(&self) -> &OutletRecord {
        &self.record
    }

    /// Queries the outlet; `None` means the state is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails or the daemon rejects the
    /// record.
    pub fn get_state(&self) -> Result<Option<bool>, ClientError> {
        let request = DaemonRequest::GetState {
            record: self.record.clone(),
        };
        match self.client.call(&request)? {
            DaemonResponse::State { state } => Ok(state),
            other => Err(unexpected(&request, other)),
        }
    }

    /// Commands the outlet.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the call fails or the daemon rejects the
    /// record.
    pub fn set_state(&self, state: bool) -> Result<(), ClientError> {
        let request = DaemonRequest::SetState {
            record: self.record.clone(),
            state,
        };
        match self.client.call(&request)? {
            DaemonResponse::Ack => Ok(()),
            other => Err(unexpected(&request, other)),
        }
    }
}

fn unexpected(request: &DaemonRequest, response: DaemonResponse) -> ClientError {
    match response {
        DaemonResponse::Error { error, message } => {
            debug!(
                target: PROXY_TARGET,
                operation = request.operation(),
                %error,
                "daemon rejected request"
            );
            ClientError::Daemon {
                kind: error,
                message,
            }
        }
        other => ClientError::UnexpectedResponse {
            operation: request.operation(),
            response: Box::new(other),
        },
    }
}

fn require_type(record: &OutletRecord) -> Result<(), ClientError> {
    if record.type_tag().is_some() {
        Ok(())
    } else {
        Err(ClientError::MissingType)
    }
}

fn split_connection_fields(record: &mut OutletRecord) -> Result<ConnectionFields, RecordError> {
    let port = match record.remove(PORT_FIELD) {
        None => None,
        Some(Scalar::Integer(value)) => Some(port_in_range(value)?),
        Some(other) => {
            return Err(RecordError::wrong_type(
                PORT_FIELD,
                ScalarKind::Integer,
                &other,
            ));
        }
    };
    let log = match record.remove(LOG_FIELD) {
        None => None,
        Some(Scalar::Text(path)) => Some(Utf8PathBuf::from(path)),
        Some(other) => {
            return Err(RecordError::wrong_type(LOG_FIELD, ScalarKind::Text, &other));
        }
    };
    Ok(ConnectionFields { port, log })
}

fn port_in_range(value: i64) -> Result<u16, RecordError> {
    match u16::try_from(value) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(RecordError::OutOfRange {
            field: PORT_FIELD.to_owned(),
            value,
            min: 1,
            max: i64::from(u16::MAX),
        }),
    }
}
