//! Loopback listener for daemon requests.
//!
//! The transport binds the daemon port (retrying while a previous daemon
//! releases it) and serves one JSONL request per connection on the calling
//! thread until the handler asks to stop.

mod errors;
mod handler;
mod listener;
#[cfg(test)]
mod listener_tests;

pub use self::errors::ListenerError;
pub use self::handler::RequestHandler;
pub use self::listener::{DaemonListener, ServeSummary, bind_with_retry};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
