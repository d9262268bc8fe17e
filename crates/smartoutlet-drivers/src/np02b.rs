//! Synaccess NP-02B two-outlet strip controlled over HTTP.
//!
//! The strip exposes a CGI endpoint taking `$A`-prefixed commands. `$A5`
//! returns one character per outlet, highest outlet first, and `$A3` switches
//! a single outlet.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::blocking::Client;
use smartoutlet_config::NetworkPolicy;
use smartoutlet_core::{Outlet, OutletDriver, OutletRecord, ParameterSpec, RecordError};
use thiserror::Error;
use tracing::{debug, warn};

const NP02B_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::np02b");

const STATUS_COMMAND: &str = "$A5";
const SWITCH_COMMAND: &str = "$A3";
const DEFAULT_USERNAME: &str = "admin";
const DEFAULT_PASSWORD: &str = "admin";

/// Number of switched outlets on the strip.
pub const OUTLET_COUNT: i64 = 2;

/// A single authenticated GET against the strip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Absolute URL.
    pub url: String,
    /// Basic auth user.
    pub username: String,
    /// Basic auth password.
    pub password: String,
    /// Whole-request timeout.
    pub timeout: Duration,
}

/// HTTP failures seen by the driver.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be sent or the response read.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The device answered with a non-success status.
    #[error("HTTP status {status}")]
    Status {
        /// Status code.
        status: u16,
    },
}

/// Seam between the driver and the network.
pub trait HttpFetcher: Send + Sync + fmt::Debug {
    /// Performs the request and returns the response body.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] when the device is unreachable or refuses the
    /// request.
    fn fetch(&self, request: &HttpRequest) -> Result<String, FetchError>;
}

/// [`HttpFetcher`] backed by a blocking `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    /// Creates a fetcher with its own connection pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl HttpFetcher for ReqwestFetcher {
    fn fetch(&self, request: &HttpRequest) -> Result<String, FetchError> {
        let response = self
            .client
            .get(&request.url)
            .basic_auth(&request.username, Some(&request.password))
            .timeout(request.timeout)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response.text()?)
    }
}

static SHARED_FETCHER: Lazy<Arc<ReqwestFetcher>> = Lazy::new(|| Arc::new(ReqwestFetcher::new()));

/// One outlet of an NP-02B.
#[derive(Debug, Clone)]
pub struct Np02bOutlet {
    host: String,
    outlet: i64,
    username: String,
    password: String,
    network: NetworkPolicy,
    fetcher: Arc<dyn HttpFetcher>,
}

impl Np02bOutlet {
    /// Applies a timeout budget.
    #[must_use]
    pub const fn with_network(mut self, network: NetworkPolicy) -> Self {
        self.network = network;
        self
    }

    /// Replaces the HTTP client.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn HttpFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    fn request(&self, command: &str) -> HttpRequest {
        HttpRequest {
            url: format!("http://{}/cmd.cgi?{command}", self.host),
            username: self.username.clone(),
            password: self.password.clone(),
            timeout: self.network.timeout(),
        }
    }

    /// Picks this outlet's flag out of a `$A5` status body.
    fn parse_status(&self, body: &str) -> Option<bool> {
        if body.contains('$') {
            return None;
        }
        let position = usize::try_from(OUTLET_COUNT - self.outlet).ok()?;
        body.trim().chars().nth(position).map(|flag| flag != '0')
    }
}

impl Outlet for Np02bOutlet {
    fn type_tag(&self) -> &'static str {
        Self::TYPE
    }

    fn serialize(&self) -> OutletRecord {
        OutletRecord::typed(Self::TYPE)
            .with("host", self.host.as_str())
            .with("outlet", self.outlet)
            .with("username", self.username.as_str())
            .with("password", self.password.as_str())
    }

    fn get_state(&self) -> Option<bool> {
        match self.fetcher.fetch(&self.request(STATUS_COMMAND)) {
            Ok(body) => {
                let state = self.parse_status(&body);
                debug!(
                    target: NP02B_TARGET,
                    host = %self.host,
                    outlet = self.outlet,
                    body = %body.trim(),
                    ?state,
                    "queried NP-02B outlet"
                );
                state
            }
            Err(error) => {
                debug!(
                    target: NP02B_TARGET,
                    host = %self.host,
                    error = %error,
                    "NP-02B query failed"
                );
                None
            }
        }
    }

    fn set_state(&self, state: bool) {
        let flag = if state { '1' } else { '0' };
        let command = format!("{SWITCH_COMMAND} {} {flag}", self.outlet);
        if let Err(error) = self.fetcher.fetch(&self.request(&command)) {
            warn!(
                target: NP02B_TARGET,
                host = %self.host,
                outlet = self.outlet,
                state,
                error = %error,
                "NP-02B update failed"
            );
        }
    }
}

impl OutletDriver for Np02bOutlet {
    const TYPE: &'static str = "np-02b";
    const PARAMETERS: &'static [ParameterSpec] = &[
        ParameterSpec::required("host", "hostname or IP address of the NP-02B"),
        ParameterSpec::required("outlet", "outlet number (1 or 2) being controlled"),
        ParameterSpec::optional("username", "web interface user", DEFAULT_USERNAME),
        ParameterSpec::optional("password", "web interface password", DEFAULT_PASSWORD),
    ];

    fn deserialize(record: &OutletRecord) -> Result<Self, RecordError> {
        Ok(Self {
            host: record.require_text("host")?.to_owned(),
            outlet: record.require_integer_in("outlet", 1..=OUTLET_COUNT)?,
            username: record.text_or("username", DEFAULT_USERNAME)?.to_owned(),
            password: record.text_or("password", DEFAULT_PASSWORD)?.to_owned(),
            network: NetworkPolicy::default(),
            fetcher: Arc::<ReqwestFetcher>::clone(&SHARED_FETCHER),
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::tests::support::MockFetcher;

    fn record(outlet: i64) -> OutletRecord {
        OutletRecord::new()
            .with("host", "strip.local")
            .with("outlet", outlet)
    }

    fn outlet_answering(outlet: i64, body: &'static str) -> Np02bOutlet {
        let mut fetcher = MockFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|request| {
                request.url == "http://strip.local/cmd.cgi?$A5"
                    && request.username == "admin"
                    && request.password == "admin"
            })
            .times(1)
            .return_once(move |_| Ok(body.to_owned()));
        Np02bOutlet::deserialize(&record(outlet))
            .expect("valid record")
            .with_fetcher(Arc::new(fetcher))
    }

    #[rstest]
    #[case::outlet_one_on(1, "01", Some(true))]
    #[case::outlet_one_off(1, "10", Some(false))]
    #[case::outlet_two_on(2, "10", Some(true))]
    #[case::outlet_two_off(2, "01", Some(false))]
    #[case::error_reply(1, "$A0", None)]
    #[case::short_reply(1, "1", None)]
    fn status_characters_are_ordered_high_to_low(
        #[case] outlet: i64,
        #[case] body: &'static str,
        #[case] expected: Option<bool>,
    ) {
        assert_eq!(outlet_answering(outlet, body).get_state(), expected);
    }

    #[test]
    fn set_sends_the_switch_command() {
        let mut fetcher = MockFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|request| request.url == "http://strip.local/cmd.cgi?$A3 2 0")
            .times(1)
            .return_once(|_| Ok("$A0".to_owned()));
        Np02bOutlet::deserialize(&record(2))
            .expect("valid record")
            .with_fetcher(Arc::new(fetcher))
            .set_state(false);
    }

    #[test]
    fn failures_are_absorbed() {
        let mut fetcher = MockFetcher::new();
        fetcher
            .expect_fetch()
            .times(2)
            .returning(|_| Err(FetchError::Status { status: 401 }));
        let driver = Np02bOutlet::deserialize(&record(1))
            .expect("valid record")
            .with_fetcher(Arc::new(fetcher));
        driver.set_state(true);
        assert_eq!(driver.get_state(), None);
    }

    #[test]
    fn timeouts_follow_the_network_policy() {
        let driver = Np02bOutlet::deserialize(&record(1))
            .expect("valid record")
            .with_network(NetworkPolicy {
                timeout_ms: 300,
                retries: 0,
            });
        assert_eq!(
            driver.request(STATUS_COMMAND).timeout,
            Duration::from_millis(300)
        );
    }

    #[rstest]
    #[case(0)]
    #[case(3)]
    fn rejects_outlets_out_of_range(#[case] outlet: i64) {
        assert!(Np02bOutlet::deserialize(&record(outlet)).is_err());
    }

    #[test]
    fn serialize_includes_credentials() {
        let driver = Np02bOutlet::deserialize(&record(1).with("password", "hunter2"))
            .expect("valid record");
        let expected = record(1)
            .with("type", "np-02b")
            .with("username", "admin")
            .with("password", "hunter2");
        assert_eq!(driver.serialize(), expected);
    }
}
