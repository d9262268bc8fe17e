//! Tests for the daemon listener.

use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use rstest::{fixture, rstest};
use smartoutlet_config::{DAEMON_HOST, RetryPolicy};
use smartoutlet_core::{DaemonRequest, DaemonResponse};

use super::{ListenerError, bind_with_retry};
use crate::tests::support::{EchoHandler, call};

#[fixture]
fn quick_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(5))
}

#[rstest]
fn binds_an_ephemeral_port(quick_retry: RetryPolicy) {
    let listener = bind_with_retry(DAEMON_HOST, 0, quick_retry).expect("bind");
    assert_ne!(listener.local_addr().port(), 0);
    assert!(listener.local_addr().ip().is_loopback());
}

#[rstest]
fn gives_up_after_the_retry_budget(quick_retry: RetryPolicy) {
    let held = TcpListener::bind((DAEMON_HOST, 0)).expect("reserve port");
    let port = held.local_addr().expect("local addr").port();

    let error = bind_with_retry(DAEMON_HOST, port, quick_retry).expect_err("port is taken");
    assert!(
        matches!(error, ListenerError::BindTcp { attempts: 3, .. }),
        "unexpected error: {error}"
    );
}

#[test]
fn waits_for_a_departing_daemon_to_release_the_port() {
    let held = TcpListener::bind((DAEMON_HOST, 0)).expect("reserve port");
    let port = held.local_addr().expect("local addr").port();
    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(60));
        drop(held);
    });

    let policy = RetryPolicy::new(200, Duration::from_millis(10));
    let listener = bind_with_retry(DAEMON_HOST, port, policy).expect("port frees up");
    assert_eq!(listener.local_addr().port(), port);
    releaser.join().expect("join releaser");
}

#[rstest]
fn serves_requests_in_order_until_told_to_stop(quick_retry: RetryPolicy) {
    let listener = bind_with_retry(DAEMON_HOST, 0, quick_retry).expect("bind");
    let addr = listener.local_addr();
    let server = thread::spawn(move || {
        let mut handler = EchoHandler::stopping_after(2);
        let summary = listener.serve(&mut handler);
        (summary, handler.seen)
    });

    for _ in 0..2 {
        let response = call(addr, &DaemonRequest::CheckVersion { version: 1 });
        assert_eq!(response, DaemonResponse::Version { compatible: true });
    }

    let (summary, seen) = server.join().expect("join server");
    assert_eq!(seen, 2);
    assert_eq!(summary.connections, 2);
    assert_eq!(summary.requests, 2);
}
