//! Request handling for the outlet daemon.
//!
//! [`OutletDaemon`] is the single owner of every live driver and of the state
//! cache. It is only ever driven from the accept loop, one request at a time,
//! so none of its state needs locking.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::Duration;

use smartoutlet_core::{
    DaemonRequest, DaemonResponse, ErrorKind, Outlet, OutletKey, OutletRecord, OutletRegistry,
    PROTOCOL_VERSION, RegistryError, TYPE_FIELD,
};
use tracing::{debug, info, warn};

use crate::cache::{Clock, StateCache, SystemClock};
use crate::process::ShutdownToken;
use crate::transport::RequestHandler;

const DAEMON_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::daemon");

#[derive(Debug)]
struct RegisteredOutlet {
    tag: &'static str,
    fields: OutletRecord,
    outlet: Box<dyn Outlet>,
}

/// The daemon's in-memory state: drivers by identity, the cache, and the
/// shutdown token the accept loop watches.
#[derive(Debug)]
pub struct OutletDaemon<C = SystemClock> {
    registry: OutletRegistry,
    outlets: HashMap<OutletKey, RegisteredOutlet>,
    cache: StateCache<C>,
    shutdown: ShutdownToken,
}

impl OutletDaemon {
    /// Creates a daemon that caches reads for `ttl`.
    #[must_use]
    pub fn new(registry: OutletRegistry, ttl: Duration) -> Self {
        Self::with_cache(registry, StateCache::new(ttl))
    }
}

impl<C: Clock> OutletDaemon<C> {
    /// Creates a daemon around an existing cache.
    #[must_use]
    pub fn with_cache(registry: OutletRegistry, cache: StateCache<C>) -> Self {
        Self {
            registry,
            outlets: HashMap::new(),
            cache,
            shutdown: ShutdownToken::new(),
        }
    }

    /// Token tripped when the daemon decides to exit.
    #[must_use]
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    /// Number of outlets constructed so far.
    #[must_use]
    pub fn registered_outlets(&self) -> usize {
        self.outlets.len()
    }

    /// Compares the client's protocol version with ours.
    ///
    /// A mismatch trips the shutdown token so a compatible daemon can take
    /// over the port.
    #[must_use]
    pub fn check_version(&self, version: u32) -> bool {
        if version == PROTOCOL_VERSION {
            return true;
        }
        warn!(
            target: DAEMON_TARGET,
            client = version,
            daemon = PROTOCOL_VERSION,
            "protocol version mismatch; shutting down"
        );
        self.shutdown.trigger();
        false
    }

    /// Returns the state of the outlet `record` names.
    ///
    /// Served from the cache while fresh, otherwise the driver is queried and
    /// the result stored.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] when the record cannot be resolved to a
    /// driver.
    pub fn get_state(&mut self, record: &OutletRecord) -> Result<Option<bool>, RegistryError> {
        let key = record.key();
        let registered = register(&self.registry, &mut self.outlets, &key, record)?;
        if let Some(state) = self.cache.fresh(&key) {
            debug!(target: DAEMON_TARGET, outlet = %key, ?state, "cache hit");
            return Ok(state);
        }
        let state = registered.outlet.get_state();
        debug!(target: DAEMON_TARGET, outlet = %key, ?state, "queried device");
        self.cache.put(key, state);
        Ok(state)
    }

    /// Commands the outlet, then re-reads it so the next query observes the
    /// outcome regardless of the TTL.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] when the record cannot be resolved to a
    /// driver.
    pub fn set_state(&mut self, record: &OutletRecord, state: bool) -> Result<(), RegistryError> {
        let key = record.key();
        let registered = register(&self.registry, &mut self.outlets, &key, record)?;
        registered.outlet.set_state(state);
        let observed = registered.outlet.get_state();
        debug!(
            target: DAEMON_TARGET,
            outlet = %key,
            requested = state,
            ?observed,
            "updated device"
        );
        self.cache.put(key, observed);
        Ok(())
    }
}

/// Returns the driver for `key`, constructing it on first use.
///
/// Keys are not injective, so a reused identity must also carry the same
/// non-type fields as the record it was built from.
fn register<'a>(
    registry: &OutletRegistry,
    outlets: &'a mut HashMap<OutletKey, RegisteredOutlet>,
    key: &OutletKey,
    record: &OutletRecord,
) -> Result<&'a RegisteredOutlet, RegistryError> {
    match outlets.entry(key.clone()) {
        Entry::Occupied(entry) => {
            let registered = entry.into_mut();
            let requested = record.type_tag().ok_or(RegistryError::MissingType)?;
            if !registered.tag.eq_ignore_ascii_case(requested) {
                return Err(RegistryError::Collision {
                    key: key.clone(),
                    registered: registered.tag.to_owned(),
                    requested: requested.to_owned(),
                });
            }
            if registered.fields != without_type(record) {
                return Err(RegistryError::Ambiguous { key: key.clone() });
            }
            Ok(registered)
        }
        Entry::Vacant(slot) => {
            let resolved = registry.resolve(record)?;
            info!(
                target: DAEMON_TARGET,
                outlet = %resolved.key,
                driver = resolved.tag,
                "registered outlet"
            );
            Ok(slot.insert(RegisteredOutlet {
                tag: resolved.tag,
                fields: without_type(record),
                outlet: resolved.outlet,
            }))
        }
    }
}

fn without_type(record: &OutletRecord) -> OutletRecord {
    let mut fields = record.clone();
    fields.remove(TYPE_FIELD);
    fields
}

fn rejected(error: &RegistryError) -> DaemonResponse {
    warn!(target: DAEMON_TARGET, error = %error, "rejected outlet record");
    DaemonResponse::error(ErrorKind::from(error), error.to_string())
}

impl<C: Clock> RequestHandler for OutletDaemon<C> {
    fn handle(&mut self, request: DaemonRequest) -> DaemonResponse {
        match request {
            DaemonRequest::CheckVersion { version } => DaemonResponse::Version {
                compatible: self.check_version(version),
            },
            DaemonRequest::GetState { record } => match self.get_state(&record) {
                Ok(state) => DaemonResponse::State { state },
                Err(error) => rejected(&error),
            },
            DaemonRequest::SetState { record, state } => match self.set_state(&record, state) {
                Ok(()) => DaemonResponse::Ack,
                Err(error) => rejected(&error),
            },
        }
    }

    fn should_stop(&self) -> bool {
        self.shutdown.is_triggered()
    }
}
