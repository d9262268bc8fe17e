//! APC AP7900 switched rack PDU.

use std::sync::Arc;

use smartoutlet_config::NetworkPolicy;
use smartoutlet_core::{Outlet, OutletDriver, OutletRecord, ParameterSpec, RecordError, Scalar};

use crate::snmp::{
    DEFAULT_READ_COMMUNITY, DEFAULT_WRITE_COMMUNITY, Oid, SnmpMapping, SnmpOutlet, SnmpTransport,
};

/// `sPDUOutletCtl` column of the PowerNet MIB.
const OUTLET_CONTROL_OID: [u64; 15] = [1, 3, 6, 1, 4, 1, 318, 1, 1, 12, 3, 3, 1, 1, 4];
const OUTLET_ON: i64 = 1;
const OUTLET_OFF: i64 = 2;

/// Number of switched outlets on the unit.
pub const OUTLET_COUNT: i64 = 8;

/// One outlet of an AP7900, controlled over SNMP.
#[derive(Debug, Clone)]
pub struct Ap7900Outlet {
    outlet: i64,
    snmp: SnmpOutlet,
}

impl Ap7900Outlet {
    /// Outlet number, 1-based.
    #[must_use]
    pub const fn outlet(&self) -> i64 {
        self.outlet
    }

    /// Applies a timeout and retry budget.
    #[must_use]
    pub fn with_network(mut self, network: NetworkPolicy) -> Self {
        self.snmp = self.snmp.with_network(network);
        self
    }

    /// Replaces the SNMP transport.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn SnmpTransport>) -> Self {
        self.snmp = self.snmp.with_transport(transport);
        self
    }
}

fn control_oid(outlet: i64) -> Oid {
    Oid::from_arcs(&OUTLET_CONTROL_OID).child(outlet.unsigned_abs())
}

fn mapping(outlet: i64) -> SnmpMapping {
    SnmpMapping {
        oid: control_oid(outlet),
        on: Scalar::Integer(OUTLET_ON),
        off: Scalar::Integer(OUTLET_OFF),
    }
}

impl Outlet for Ap7900Outlet {
    fn type_tag(&self) -> &'static str {
        Self::TYPE
    }

    fn serialize(&self) -> OutletRecord {
        let snmp = self.snmp.serialize();
        let community = |name: &str, default: &str| {
            snmp.get(name)
                .cloned()
                .unwrap_or_else(|| Scalar::from(default))
        };
        OutletRecord::typed(Self::TYPE)
            .with("host", self.snmp.host())
            .with("outlet", self.outlet)
            .with(
                "read_community",
                community("read_community", DEFAULT_READ_COMMUNITY),
            )
            .with(
                "write_community",
                community("write_community", DEFAULT_WRITE_COMMUNITY),
            )
    }

    fn get_state(&self) -> Option<bool> {
        self.snmp.get_state()
    }

    fn set_state(&self, state: bool) {
        self.snmp.set_state(state);
    }
}

impl OutletDriver for Ap7900Outlet {
    const TYPE: &'static str = "ap7900";
    const PARAMETERS: &'static [ParameterSpec] = &[
        ParameterSpec::required(
            "host",
            "hostname or IP address of the AP7900 being controlled",
        ),
        ParameterSpec::required(
            "outlet",
            "outlet number (between 1-8 inclusive) being controlled",
        ),
        ParameterSpec::optional(
            "read_community",
            "SNMP read community as set in the AP7900 configuration menu",
            DEFAULT_READ_COMMUNITY,
        ),
        ParameterSpec::optional(
            "write_community",
            "SNMP write community as set in the AP7900 configuration menu",
            DEFAULT_WRITE_COMMUNITY,
        ),
    ];

    fn deserialize(record: &OutletRecord) -> Result<Self, RecordError> {
        let host = record.require_text("host")?;
        let outlet = record.require_integer_in("outlet", 1..=OUTLET_COUNT)?;
        let snmp = SnmpOutlet::new(host, mapping(outlet), mapping(outlet))?.with_communities(
            record.text_or("read_community", DEFAULT_READ_COMMUNITY)?,
            record.text_or("write_community", DEFAULT_WRITE_COMMUNITY)?,
        );
        Ok(Self { outlet, snmp })
    }
}
