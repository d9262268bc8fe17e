/// Host the daemon binds and clients dial. The daemon is local-machine only.
pub const DAEMON_HOST: &str = "127.0.0.1";

/// Default loopback port for the daemon.
pub const DEFAULT_DAEMON_PORT: u16 = 54545;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default freshness window for cached outlet states.
pub const DEFAULT_CACHE_TTL_MS: u64 = 500;

/// Default loopback port for the daemon.
#[must_use]
pub const fn default_daemon_port() -> u16 {
    DEFAULT_DAEMON_PORT
}

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the daemon.
#[must_use]
pub const fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Compact
}

/// Default cache TTL in milliseconds.
#[must_use]
pub const fn default_cache_ttl_ms() -> u64 {
    DEFAULT_CACHE_TTL_MS
}
