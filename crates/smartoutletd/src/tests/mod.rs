//! Test suites for the outlet daemon.

mod process_behaviour;
pub(crate) mod support;
