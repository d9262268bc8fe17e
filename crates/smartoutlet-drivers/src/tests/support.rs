//! Mocks for the driver network seams.

use std::fmt;

use mockall::mock;

use crate::np02b::{FetchError, HttpFetcher, HttpRequest};
use crate::snmp::{Oid, SnmpError, SnmpTarget, SnmpTransport, SnmpValue};

mock! {
    pub Transport {}

    impl SnmpTransport for Transport {
        fn get(&self, target: &SnmpTarget, oid: &Oid) -> Result<SnmpValue, SnmpError>;
        fn set(&self, target: &SnmpTarget, oid: &Oid, value: SnmpValue) -> Result<(), SnmpError>;
    }
}

mock! {
    pub Fetcher {}

    impl HttpFetcher for Fetcher {
        fn fetch(&self, request: &HttpRequest) -> Result<String, FetchError>;
    }
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("MockTransport")
    }
}

impl fmt::Debug for MockFetcher {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("MockFetcher")
    }
}

pub(crate) fn timeout_error() -> SnmpError {
    SnmpError::Timeout { attempts: 1 }
}
