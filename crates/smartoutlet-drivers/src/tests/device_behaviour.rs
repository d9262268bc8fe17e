//! Behavioural tests for device replies reaching the outlet contract.

use std::cell::RefCell;
use std::sync::Arc;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use smartoutlet_core::{Outlet, OutletDriver, OutletRecord};

use super::support::{MockFetcher, MockTransport, timeout_error};
use crate::np02b::Np02bOutlet;
use crate::snmp::{SnmpError, SnmpOutlet, SnmpValue};

const OUTLET_CONTROL: &str = "1.3.6.1.4.1.318.1.1.12.3.3.1.1.4";

#[derive(Default)]
struct DeviceWorld {
    record: OutletRecord,
    observed: Option<Option<bool>>,
}

impl DeviceWorld {
    fn fields(&self) -> OutletRecord {
        let mut fields = self.record.clone();
        fields.take_type().expect("record carries a type");
        fields
    }

    fn query_snmp<F>(&mut self, reply: F)
    where
        F: FnOnce() -> Result<SnmpValue, SnmpError> + Send + 'static,
    {
        let mut transport = MockTransport::new();
        transport.expect_get().times(1).return_once(move |_, _| reply());
        let outlet = SnmpOutlet::deserialize(&self.fields())
            .expect("record is valid")
            .with_transport(Arc::new(transport));
        self.observed = Some(outlet.get_state());
    }

    fn observed(&self) -> Option<bool> {
        self.observed.expect("a query was made")
    }
}

#[fixture]
fn world() -> RefCell<DeviceWorld> {
    RefCell::new(DeviceWorld::default())
}

#[given("an SNMP outlet record for host \"{host}\" and outlet {outlet}")]
fn given_snmp_record(world: &RefCell<DeviceWorld>, host: String, outlet: u8) {
    let oid = format!("{OUTLET_CONTROL}.{outlet}");
    world.borrow_mut().record = OutletRecord::typed("snmp")
        .with("host", host)
        .with("query_oid", oid.as_str())
        .with("query_on_value", 1)
        .with("query_off_value", 2)
        .with("update_oid", oid.as_str())
        .with("update_on_value", 1)
        .with("update_off_value", 2);
}

#[given("an NP-02B outlet record for outlet {outlet}")]
fn given_np02b_record(world: &RefCell<DeviceWorld>, outlet: u8) {
    world.borrow_mut().record = OutletRecord::typed("np-02b")
        .with("host", "strip.local")
        .with("outlet", i64::from(outlet));
}

#[when("the agent reports an error indication")]
fn when_agent_errors(world: &RefCell<DeviceWorld>) {
    world.borrow_mut().query_snmp(|| Err(timeout_error()));
}

#[when("the agent answers with the on value")]
fn when_agent_on(world: &RefCell<DeviceWorld>) {
    world.borrow_mut().query_snmp(|| Ok(SnmpValue::Integer(1)));
}

#[when("the agent answers with the off value")]
fn when_agent_off(world: &RefCell<DeviceWorld>) {
    world.borrow_mut().query_snmp(|| Ok(SnmpValue::Integer(2)));
}

#[when("the strip reports status \"{body}\"")]
fn when_strip_reports(world: &RefCell<DeviceWorld>, body: String) {
    let mut world = world.borrow_mut();
    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch()
        .withf(|request| request.url.ends_with("cmd.cgi?$A5"))
        .times(1)
        .return_once(move |_| Ok(body));
    let outlet = Np02bOutlet::deserialize(&world.fields())
        .expect("record is valid")
        .with_fetcher(Arc::new(fetcher));
    world.observed = Some(outlet.get_state());
}

#[then("the outlet state is unknown")]
fn then_unknown(world: &RefCell<DeviceWorld>) {
    assert_eq!(world.borrow().observed(), None);
}

#[then("the outlet state is on")]
fn then_on(world: &RefCell<DeviceWorld>) {
    assert_eq!(world.borrow().observed(), Some(true));
}

#[then("the outlet state is off")]
fn then_off(world: &RefCell<DeviceWorld>) {
    assert_eq!(world.borrow().observed(), Some(false));
}

#[scenario(path = "tests/features/snmp_outlet.feature")]
fn snmp_outlet_queries(#[from(world)] world: RefCell<DeviceWorld>) {
    let _ = world;
}

#[scenario(path = "tests/features/np02b_outlet.feature")]
fn np02b_status_parsing(#[from(world)] world: RefCell<DeviceWorld>) {
    let _ = world;
}
