//! Behavioural tests covering the daemon launch sequence.

use std::cell::RefCell;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use smartoutlet_config::{Config, DAEMON_HOST, RetryPolicy};
use smartoutlet_core::{DaemonRequest, DaemonResponse};

use super::support::call;
use crate::process::{
    DaemonizeError, Daemonizer, LaunchError, LaunchMode, LaunchPlan, ShutdownError,
    ShutdownSignal, ShutdownToken, run_daemon_with,
};
use crate::transport::{ListenerError, ServeSummary};

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Clone, Default)]
struct RecordingDaemonizer {
    calls: Arc<AtomicUsize>,
}

impl Daemonizer for RecordingDaemonizer {
    fn daemonize(&self) -> Result<(), DaemonizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct CapturedShutdown {
    token: Arc<Mutex<Option<ShutdownToken>>>,
}

impl ShutdownSignal for CapturedShutdown {
    fn install(&self, token: &ShutdownToken) -> Result<(), ShutdownError> {
        *self.token.lock().expect("token lock") = Some(token.clone());
        Ok(())
    }
}

type RunResult = Result<ServeSummary, LaunchError>;

#[derive(Default)]
struct ProcessWorld {
    port: u16,
    held: Option<TcpListener>,
    daemonizer: RecordingDaemonizer,
    shutdown: CapturedShutdown,
    run: Option<thread::JoinHandle<RunResult>>,
    outcome: Option<RunResult>,
    last: Option<DaemonResponse>,
}

impl ProcessWorld {
    fn address(&self) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], self.port))
    }

    fn start(&mut self, mode: LaunchMode) {
        let config = Config {
            daemon_port: self.port,
            bootstrap: RetryPolicy::new(5, Duration::from_millis(10)),
            ..Config::default()
        };
        let plan = LaunchPlan {
            config,
            mode,
            daemonizer: self.daemonizer.clone(),
            shutdown: self.shutdown.clone(),
        };
        self.run = Some(thread::spawn(move || run_daemon_with(plan)));
        if self.held.is_none() {
            self.wait_until_serving();
        }
    }

    fn wait_until_serving(&self) {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while self.shutdown.token.lock().expect("token lock").is_none() {
            assert!(Instant::now() < deadline, "daemon never started serving");
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn finish(&mut self) -> &RunResult {
        if let Some(handle) = self.run.take() {
            let deadline = Instant::now() + WAIT_TIMEOUT;
            while !handle.is_finished() {
                assert!(Instant::now() < deadline, "daemon run did not complete");
                thread::sleep(POLL_INTERVAL);
            }
            self.outcome = Some(handle.join().expect("daemon thread"));
        }
        self.outcome.as_ref().expect("daemon was started")
    }
}

impl Drop for ProcessWorld {
    fn drop(&mut self) {
        if let Some(token) = self.shutdown.token.lock().ok().and_then(|guard| guard.clone()) {
            token.trigger();
        }
    }
}

#[fixture]
fn world() -> RefCell<ProcessWorld> {
    RefCell::new(ProcessWorld::default())
}

#[given("a free loopback port")]
fn given_free_port(world: &RefCell<ProcessWorld>) {
    let probe = TcpListener::bind((DAEMON_HOST, 0)).expect("probe port");
    world.borrow_mut().port = probe.local_addr().expect("probe address").port();
}

#[given("a loopback port held by another process")]
fn given_held_port(world: &RefCell<ProcessWorld>) {
    let held = TcpListener::bind((DAEMON_HOST, 0)).expect("hold port");
    let mut world = world.borrow_mut();
    world.port = held.local_addr().expect("held address").port();
    world.held = Some(held);
}

#[when("the daemon starts in foreground mode")]
fn when_foreground(world: &RefCell<ProcessWorld>) {
    world.borrow_mut().start(LaunchMode::Foreground);
}

#[when("the daemon starts in background mode")]
fn when_background(world: &RefCell<ProcessWorld>) {
    world.borrow_mut().start(LaunchMode::Background);
}

#[when("a client asks the running daemon about protocol version {version}")]
fn when_version_checked(world: &RefCell<ProcessWorld>, version: u32) {
    let addr = world.borrow().address();
    world.borrow_mut().last = Some(call(addr, &DaemonRequest::CheckVersion { version }));
}

#[when("shutdown is signalled")]
fn when_shutdown(world: &RefCell<ProcessWorld>) {
    let world = world.borrow();
    let token = world.shutdown.token.lock().expect("token lock");
    token.as_ref().expect("token installed").trigger();
}

#[then("the running daemon accepts the version")]
fn then_compatible(world: &RefCell<ProcessWorld>) {
    assert_eq!(
        world.borrow().last,
        Some(DaemonResponse::Version { compatible: true })
    );
}

#[then("the running daemon rejects the version")]
fn then_incompatible(world: &RefCell<ProcessWorld>) {
    assert_eq!(
        world.borrow().last,
        Some(DaemonResponse::Version { compatible: false })
    );
}

#[then("the daemon run completes")]
fn then_completes(world: &RefCell<ProcessWorld>) {
    let mut world = world.borrow_mut();
    let summary = world.finish().as_ref().expect("daemon run succeeded");
    assert!(summary.requests >= 1, "expected served requests: {summary:?}");
}

#[then("the daemon run fails to bind")]
fn then_bind_fails(world: &RefCell<ProcessWorld>) {
    let mut world = world.borrow_mut();
    assert!(matches!(
        world.finish(),
        Err(LaunchError::Listener {
            source: ListenerError::BindTcp { attempts: 5, .. }
        })
    ));
    assert_eq!(world.daemonizer.calls.load(Ordering::SeqCst), 0);
}

#[then("daemonisation was requested")]
fn then_daemonised(world: &RefCell<ProcessWorld>) {
    assert_eq!(world.borrow().daemonizer.calls.load(Ordering::SeqCst), 1);
}

#[then("daemonisation was not requested")]
fn then_not_daemonised(world: &RefCell<ProcessWorld>) {
    assert_eq!(world.borrow().daemonizer.calls.load(Ordering::SeqCst), 0);
}

#[scenario(
    path = "tests/features/daemon_process.feature",
    name = "A foreground daemon serves until a newer client evicts it"
)]
fn foreground_eviction(world: RefCell<ProcessWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/daemon_process.feature",
    name = "A background daemon detaches before serving"
)]
fn background_detach(world: RefCell<ProcessWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/daemon_process.feature",
    name = "A second daemon cannot take a bound port"
)]
fn port_contention(world: RefCell<ProcessWorld>) {
    drop(world);
}
