//! JSONL messages exchanged between clients and the daemon.
//!
//! A connection carries exactly one request line and one response line.

mod codec;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use codec::{MAX_MESSAGE_BYTES, ProtocolError, read_message, write_message};

use crate::record::OutletRecord;
use crate::registry::RegistryError;

/// Version both sides must agree on before exchanging outlet calls.
pub const PROTOCOL_VERSION: u32 = 1;

/// A client request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DaemonRequest {
    /// Compatibility handshake.
    CheckVersion {
        /// Client protocol version.
        version: u32,
    },
    /// Queries an outlet.
    GetState {
        /// Record naming the outlet, including `type`.
        record: OutletRecord,
    },
    /// Commands an outlet.
    SetState {
        /// Record naming the outlet, including `type`.
        record: OutletRecord,
        /// Desired state.
        state: bool,
    },
}

impl DaemonRequest {
    /// Operation name used in logs.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::CheckVersion { .. } => "check_version",
            Self::GetState { .. } => "get_state",
            Self::SetState { .. } => "set_state",
        }
    }
}

/// A daemon response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DaemonResponse {
    /// Handshake result.
    Version {
        /// Whether the client version matches.
        compatible: bool,
    },
    /// Current outlet state; `None` when unknown.
    State {
        /// Observed state.
        state: Option<bool>,
    },
    /// A command completed.
    Ack,
    /// The request was rejected.
    Error {
        /// Failure category.
        error: ErrorKind,
        /// Human-readable detail.
        message: String,
    },
}

impl DaemonResponse {
    /// Builds an error response.
    #[must_use]
    pub fn error(error: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            error,
            message: message.into(),
        }
    }
}

/// Category of a rejected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The record failed validation.
    Validation,
    /// The record names an unregistered driver.
    UnknownType,
    /// The request could not be decoded.
    Protocol,
    /// The daemon failed while handling a valid request.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Validation => "validation",
            Self::UnknownType => "unknown_type",
            Self::Protocol => "protocol",
            Self::Internal => "internal",
        })
    }
}

impl From<&RegistryError> for ErrorKind {
    fn from(error: &RegistryError) -> Self {
        match error {
            RegistryError::UnknownType { .. } => Self::UnknownType,
            RegistryError::MissingType
            | RegistryError::Invalid { .. }
            | RegistryError::Collision { .. }
            | RegistryError::Ambiguous { .. } => Self::Validation,
            RegistryError::DuplicateType { .. } => Self::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::version(
        r#"{"op":"check_version","version":1}"#,
        DaemonRequest::CheckVersion { version: 1 }
    )]
    #[case::set(
        r#"{"op":"set_state","record":{"type":"ap7900","outlet":2},"state":true}"#,
        DaemonRequest::SetState {
            record: OutletRecord::typed("ap7900").with("outlet", 2),
            state: true,
        }
    )]
    fn requests_decode_from_wire_text(#[case] text: &str, #[case] expected: DaemonRequest) {
        let request: DaemonRequest = serde_json::from_str(text).expect("request parses");
        assert_eq!(request, expected);
    }

    #[rstest]
    #[case(DaemonResponse::State { state: None }, r#"{"kind":"state","state":null}"#)]
    #[case(DaemonResponse::Ack, r#"{"kind":"ack"}"#)]
    #[case(
        DaemonResponse::error(ErrorKind::UnknownType, "unknown outlet type 'x'"),
        r#"{"kind":"error","error":"unknown_type","message":"unknown outlet type 'x'"}"#
    )]
    fn responses_encode_to_wire_text(#[case] response: DaemonResponse, #[case] expected: &str) {
        let text = serde_json::to_string(&response).expect("response encodes");
        assert_eq!(text, expected);
    }

    #[test]
    fn registry_errors_map_to_wire_kinds() {
        assert_eq!(
            ErrorKind::from(&RegistryError::UnknownType { tag: "x".into() }),
            ErrorKind::UnknownType
        );
        assert_eq!(
            ErrorKind::from(&RegistryError::MissingType),
            ErrorKind::Validation
        );
        let key = OutletRecord::new().with("host", "pdu").key();
        assert_eq!(
            ErrorKind::from(&RegistryError::Ambiguous { key }),
            ErrorKind::Validation
        );
    }
}
