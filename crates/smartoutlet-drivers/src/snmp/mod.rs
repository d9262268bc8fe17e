//! Generic SNMP-controlled outlet.
//!
//! The outlet reads one OID to learn its state and writes another to change
//! it. Each pair of on/off values must share a scalar kind: integers are sent
//! as `INTEGER`, strings as `OCTET STRING`.

mod ber;
mod client;
mod pdu;

use std::sync::Arc;

use smartoutlet_config::NetworkPolicy;
use smartoutlet_core::{
    Outlet, OutletDriver, OutletRecord, ParameterSpec, RecordError, Scalar, ScalarKind,
};
use tracing::{debug, warn};

pub use ber::{BerError, Oid, OidParseError};
pub use client::{SNMP_PORT, SnmpError, SnmpTarget, SnmpTransport, UdpSnmpClient};
pub use pdu::{PduKind, SnmpMessage, SnmpValue};

pub(crate) const SNMP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::snmp");

/// Default community for reads.
pub const DEFAULT_READ_COMMUNITY: &str = "public";
/// Default community for writes.
pub const DEFAULT_WRITE_COMMUNITY: &str = "private";

/// An outlet driven by SNMP GET and SET.
#[derive(Debug, Clone)]
pub struct SnmpOutlet {
    host: String,
    query_oid: Oid,
    query_on_value: Scalar,
    query_off_value: Scalar,
    update_oid: Oid,
    update_on_value: Scalar,
    update_off_value: Scalar,
    read_community: String,
    write_community: String,
    network: NetworkPolicy,
    transport: Arc<dyn SnmpTransport>,
}

/// Value pair read from and written to the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnmpMapping {
    /// OID to read or write.
    pub oid: Oid,
    /// Value meaning "on".
    pub on: Scalar,
    /// Value meaning "off".
    pub off: Scalar,
}

impl SnmpOutlet {
    /// Builds an outlet from explicit query and update mappings.
    ///
    /// # Errors
    ///
    /// Fails when a mapping's on and off values differ in kind or are not
    /// integers or strings.
    pub fn new(
        host: impl Into<String>,
        query: SnmpMapping,
        update: SnmpMapping,
    ) -> Result<Self, RecordError> {
        check_pair("query", &query.on, &query.off)?;
        check_pair("update", &update.on, &update.off)?;
        Ok(Self {
            host: host.into(),
            query_oid: query.oid,
            query_on_value: query.on,
            query_off_value: query.off,
            update_oid: update.oid,
            update_on_value: update.on,
            update_off_value: update.off,
            read_community: DEFAULT_READ_COMMUNITY.to_owned(),
            write_community: DEFAULT_WRITE_COMMUNITY.to_owned(),
            network: NetworkPolicy::default(),
            transport: Arc::new(UdpSnmpClient::new()),
        })
    }

    /// Overrides both communities.
    #[must_use]
    pub fn with_communities(
        mut self,
        read: impl Into<String>,
        write: impl Into<String>,
    ) -> Self {
        self.read_community = read.into();
        self.write_community = write.into();
        self
    }

    /// Applies a timeout and retry budget.
    #[must_use]
    pub const fn with_network(mut self, network: NetworkPolicy) -> Self {
        self.network = network;
        self
    }

    /// Replaces the network transport.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn SnmpTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Agent host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    fn target(&self, community: &str, retries: u32) -> SnmpTarget {
        SnmpTarget {
            host: self.host.clone(),
            port: SNMP_PORT,
            community: community.to_owned(),
            timeout: self.network.timeout(),
            retries,
        }
    }

    fn interpret(&self, value: &SnmpValue) -> Option<bool> {
        let observed = match self.query_on_value.kind() {
            ScalarKind::Integer => value.as_integer().map(Scalar::Integer),
            ScalarKind::Text => value.as_text().map(Scalar::Text),
            ScalarKind::Bool => None,
        }?;
        if observed == self.query_on_value {
            Some(true)
        } else if observed == self.query_off_value {
            Some(false)
        } else {
            None
        }
    }

    fn update_value(&self, state: bool) -> SnmpValue {
        let chosen = if state {
            &self.update_on_value
        } else {
            &self.update_off_value
        };
        match chosen {
            Scalar::Integer(value) => SnmpValue::Integer(*value),
            Scalar::Text(text) => SnmpValue::OctetString(text.as_bytes().to_vec()),
            Scalar::Bool(flag) => SnmpValue::Integer(i64::from(*flag)),
        }
    }
}

impl Outlet for SnmpOutlet {
    fn type_tag(&self) -> &'static str {
        Self::TYPE
    }

    fn serialize(&self) -> OutletRecord {
        OutletRecord::typed(Self::TYPE)
            .with("host", self.host.as_str())
            .with("query_oid", self.query_oid.to_string())
            .with("query_on_value", self.query_on_value.clone())
            .with("query_off_value", self.query_off_value.clone())
            .with("update_oid", self.update_oid.to_string())
            .with("update_on_value", self.update_on_value.clone())
            .with("update_off_value", self.update_off_value.clone())
            .with("read_community", self.read_community.as_str())
            .with("write_community", self.write_community.as_str())
    }

    fn get_state(&self) -> Option<bool> {
        // GET never retries: a slow agent must not stall the daemon loop.
        let target = self.target(&self.read_community, 0);
        match self.transport.get(&target, &self.query_oid) {
            Ok(value) => {
                let state = self.interpret(&value);
                debug!(
                    target: SNMP_TARGET,
                    host = %self.host,
                    oid = %self.query_oid,
                    value = %value,
                    ?state,
                    "queried SNMP outlet"
                );
                state
            }
            Err(error) => {
                debug!(
                    target: SNMP_TARGET,
                    host = %self.host,
                    oid = %self.query_oid,
                    error = %error,
                    "SNMP query failed"
                );
                None
            }
        }
    }

    fn set_state(&self, state: bool) {
        let target = self.target(&self.write_community, self.network.retries);
        let value = self.update_value(state);
        if let Err(error) = self.transport.set(&target, &self.update_oid, value) {
            warn!(
                target: SNMP_TARGET,
                host = %self.host,
                oid = %self.update_oid,
                state,
                error = %error,
                "SNMP update failed"
            );
        }
    }
}

impl OutletDriver for SnmpOutlet {
    const TYPE: &'static str = "snmp";
    const PARAMETERS: &'static [ParameterSpec] = &[
        ParameterSpec::required("host", "hostname or IP address of the SNMP agent"),
        ParameterSpec::required("query_oid", "OID read to learn the outlet state"),
        ParameterSpec::required("query_on_value", "value of the query OID when the outlet is on"),
        ParameterSpec::required("query_off_value", "value of the query OID when the outlet is off"),
        ParameterSpec::required("update_oid", "OID written to change the outlet state"),
        ParameterSpec::required("update_on_value", "value written to turn the outlet on"),
        ParameterSpec::required("update_off_value", "value written to turn the outlet off"),
        ParameterSpec::optional(
            "read_community",
            "SNMP community used for reads",
            DEFAULT_READ_COMMUNITY,
        ),
        ParameterSpec::optional(
            "write_community",
            "SNMP community used for writes",
            DEFAULT_WRITE_COMMUNITY,
        ),
    ];

    fn deserialize(record: &OutletRecord) -> Result<Self, RecordError> {
        let query = SnmpMapping {
            oid: parse_oid(record, "query_oid")?,
            on: record.require("query_on_value")?.clone(),
            off: record.require("query_off_value")?.clone(),
        };
        let update = SnmpMapping {
            oid: parse_oid(record, "update_oid")?,
            on: record.require("update_on_value")?.clone(),
            off: record.require("update_off_value")?.clone(),
        };
        Ok(Self::new(record.require_text("host")?, query, update)?.with_communities(
            record.text_or("read_community", DEFAULT_READ_COMMUNITY)?,
            record.text_or("write_community", DEFAULT_WRITE_COMMUNITY)?,
        ))
    }
}

fn parse_oid(record: &OutletRecord, field: &str) -> Result<Oid, RecordError> {
    let text = record.require_text(field)?;
    text.parse()
        .map_err(|error: OidParseError| RecordError::invalid(field, error.to_string()))
}

fn check_pair(direction: &str, on: &Scalar, off: &Scalar) -> Result<(), RecordError> {
    let field = format!("{direction}_on_value");
    match (on.kind(), off.kind()) {
        (ScalarKind::Bool, _) => Err(RecordError::invalid(
            field,
            "SNMP values must be integers or strings",
        )),
        (on_kind, off_kind) if on_kind != off_kind => Err(RecordError::invalid(
            field,
            format!("{direction} on value is a {on_kind} but the off value is a {off_kind}"),
        )),
        _ => Ok(()),
    }
}
