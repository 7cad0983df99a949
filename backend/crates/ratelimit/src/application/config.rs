//! Application Configuration
//!
//! Engine-level settings for the rate limiter. Per-tenant quota values live
//! in [`crate::domain::value_objects::RateLimitConfig`]; this struct covers
//! the knobs of the engine itself.

use std::env;
use std::time::Duration;

/// Rate limiter engine configuration
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    /// Upper bound on any single counter-store call. A slow backend must
    /// not stall request processing; on timeout the check fails open.
    pub store_timeout: Duration,
    /// Synthetic per-window limit reported while the counter store is
    /// unreachable
    pub fail_open_limit: u64,
    /// How long a resolved tenant config may be served from cache
    pub config_cache_ttl: Duration,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_millis(500),
            fail_open_limit: 60,
            config_cache_ttl: Duration::from_secs(30),
        }
    }
}

impl LimiterConfig {
    /// Load engine configuration from environment variables, falling back
    /// to defaults for anything unset or unparsable.
    ///
    /// - `RATE_LIMIT_STORE_TIMEOUT_MS`
    /// - `RATE_LIMIT_FAIL_OPEN_LIMIT`
    /// - `RATE_LIMIT_CONFIG_CACHE_TTL_SECS`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = env_parse::<u64>("RATE_LIMIT_STORE_TIMEOUT_MS") {
            config.store_timeout = Duration::from_millis(ms);
        }

        if let Some(limit) = env_parse::<u64>("RATE_LIMIT_FAIL_OPEN_LIMIT") {
            config.fail_open_limit = limit;
        }

        if let Some(secs) = env_parse::<u64>("RATE_LIMIT_CONFIG_CACHE_TTL_SECS") {
            config.config_cache_ttl = Duration::from_secs(secs);
        }

        config
    }

    pub fn store_timeout_ms(&self) -> i64 {
        self.store_timeout.as_millis() as i64
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
