//! Shared fixtures for daemon tests.

use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use smartoutlet_core::{
    DaemonRequest, DaemonResponse, DriverDescriptor, Outlet, OutletDriver, OutletRecord,
    OutletRegistry, PROTOCOL_VERSION, ParameterSpec, RecordError, read_message, write_message,
};
use smartoutlet_drivers::Np02bOutlet;

use crate::cache::Clock;
use crate::transport::RequestHandler;

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub(crate) struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub(crate) fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock");
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().expect("clock lock")
    }
}

/// Handler answering every request without touching any device.
#[derive(Debug, Default)]
pub(crate) struct EchoHandler {
    pub(crate) seen: usize,
    stop_after: Option<usize>,
}

impl EchoHandler {
    pub(crate) fn stopping_after(requests: usize) -> Self {
        Self {
            seen: 0,
            stop_after: Some(requests),
        }
    }
}

impl RequestHandler for EchoHandler {
    fn handle(&mut self, request: DaemonRequest) -> DaemonResponse {
        self.seen += 1;
        match request {
            DaemonRequest::CheckVersion { version } => DaemonResponse::Version {
                compatible: version == PROTOCOL_VERSION,
            },
            DaemonRequest::GetState { .. } => DaemonResponse::State { state: Some(true) },
            DaemonRequest::SetState { .. } => DaemonResponse::Ack,
        }
    }

    fn should_stop(&self) -> bool {
        self.stop_after.is_some_and(|limit| self.seen >= limit)
    }
}

/// Sends one request to a listening daemon and reads the reply.
pub(crate) fn call(addr: SocketAddr, request: &DaemonRequest) -> DaemonResponse {
    let mut stream = TcpStream::connect(addr).expect("connect to daemon");
    write_message(&mut stream, request).expect("write request");
    read_message(&mut stream).expect("read response")
}

/// In-memory stand-in for a physical outlet.
#[derive(Debug, Default)]
pub(crate) struct SimulatedDevice {
    queries: AtomicUsize,
    commands: AtomicUsize,
    state: Mutex<Option<bool>>,
}

impl SimulatedDevice {
    pub(crate) fn reachable(initial: bool) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(Some(initial)),
            ..Self::default()
        })
    }

    pub(crate) fn unreachable() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub(crate) fn commands(&self) -> usize {
        self.commands.load(Ordering::SeqCst)
    }
}

/// Driver talking to a [`SimulatedDevice`].
#[derive(Debug, Clone)]
pub(crate) struct SimulatedOutlet {
    host: String,
    outlet: i64,
    device: Arc<SimulatedDevice>,
}

impl SimulatedOutlet {
    fn attached(mut self, device: Arc<SimulatedDevice>) -> Self {
        self.device = device;
        self
    }
}

impl Outlet for SimulatedOutlet {
    fn type_tag(&self) -> &'static str {
        Self::TYPE
    }

    fn serialize(&self) -> OutletRecord {
        OutletRecord::typed(Self::TYPE)
            .with("host", self.host.as_str())
            .with("outlet", self.outlet)
    }

    fn get_state(&self) -> Option<bool> {
        self.device.queries.fetch_add(1, Ordering::SeqCst);
        *self.device.state.lock().expect("device lock")
    }

    fn set_state(&self, state: bool) {
        self.device.commands.fetch_add(1, Ordering::SeqCst);
        let mut current = self.device.state.lock().expect("device lock");
        if current.is_some() {
            *current = Some(state);
        }
    }
}

impl OutletDriver for SimulatedOutlet {
    const TYPE: &'static str = "simulated";
    const PARAMETERS: &'static [ParameterSpec] = &[
        ParameterSpec::required("host", "simulated host"),
        ParameterSpec::required("outlet", "outlet number between 1 and 8"),
    ];

    fn deserialize(record: &OutletRecord) -> Result<Self, RecordError> {
        Ok(Self {
            host: record.require_text("host")?.to_owned(),
            outlet: record.require_integer_in("outlet", 1..=8)?,
            device: SimulatedDevice::unreachable(),
        })
    }
}

/// Registry with the simulated driver wired to `device`, plus NP-02B so two
/// drivers share the `host`/`outlet` field names.
pub(crate) fn simulated_registry(device: &Arc<SimulatedDevice>) -> OutletRegistry {
    let device = Arc::clone(device);
    let mut registry = OutletRegistry::new();
    registry
        .register(DriverDescriptor::configured(move |driver: SimulatedOutlet| {
            driver.attached(Arc::clone(&device))
        }))
        .expect("register simulated driver");
    registry
        .register_driver::<Np02bOutlet>()
        .expect("register np-02b");
    registry
}

pub(crate) fn simulated_record(outlet: i64) -> OutletRecord {
    OutletRecord::typed(SimulatedOutlet::TYPE)
        .with("host", "bench.local")
        .with("outlet", outlet)
}
