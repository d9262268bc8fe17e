//! Shared test support and behavioural suites for the built-in drivers.

mod device_behaviour;
pub(crate) mod support;
