//! Time-bounded cache of observed outlet states.
//!
//! Entries are replaced wholesale on every device read. A read may be served
//! from the cache only while `now - observed_at < ttl`.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use smartoutlet_core::OutletKey;

/// Source of the current instant.
pub trait Clock: Send + fmt::Debug {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// [`Clock`] backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Last observation of one outlet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedState {
    /// Observed state; `None` when the device did not answer.
    pub state: Option<bool>,
    /// When the observation was stored.
    pub observed_at: Instant,
}

/// Outlet states keyed by identity.
#[derive(Debug)]
pub struct StateCache<C = SystemClock> {
    ttl: Duration,
    clock: C,
    entries: HashMap<OutletKey, CachedState>,
}

impl StateCache {
    /// Creates a cache driven by the system clock.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }
}

impl<C: Clock> StateCache<C> {
    /// Creates a cache driven by `clock`.
    #[must_use]
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        Self {
            ttl,
            clock,
            entries: HashMap::new(),
        }
    }

    /// Freshness window.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the stored entry regardless of its age.
    #[must_use]
    pub fn get(&self, key: &OutletKey) -> Option<CachedState> {
        self.entries.get(key).copied()
    }

    /// Returns the stored state when it is still within the TTL.
    ///
    /// The outer `Option` says whether a fresh entry exists; the inner one is
    /// the cached state itself, which may be unknown.
    #[must_use]
    pub fn fresh(&self, key: &OutletKey) -> Option<Option<bool>> {
        let entry = self.entries.get(key)?;
        let age = self.clock.now().saturating_duration_since(entry.observed_at);
        (age < self.ttl).then_some(entry.state)
    }

    /// Stores an observation stamped with the current time.
    pub fn put(&mut self, key: OutletKey, state: Option<bool>) {
        let observed_at = self.clock.now();
        self.entries.insert(key, CachedState { state, observed_at });
    }

    /// Number of outlets with an observation.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been observed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
