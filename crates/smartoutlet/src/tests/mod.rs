//! Test suites for the outlet client.

pub(crate) mod support;
