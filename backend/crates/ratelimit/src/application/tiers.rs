//! Tier Catalog
//!
//! Named quota presets assignable to many tenants. Read-only reference
//! data, shared via `Arc` across all request handlers.

use crate::domain::value_objects::RateLimitConfig;
use serde::Serialize;
use std::collections::HashMap;

/// Name of the tier every degraded lookup falls back to
pub const FREE_TIER: &str = "free";

/// Compiled-in free-tier limits. The catalog guarantees this preset always
/// resolves, so config resolution can never fail.
fn free_preset() -> RateLimitConfig {
    RateLimitConfig {
        requests_per_minute: 60,
        requests_per_hour: 1_000,
        requests_per_day: 10_000,
        burst_allowance: 0,
        webhooks_per_minute: 10,
        webhooks_per_hour: 100,
        max_concurrent_requests: 10,
        enforce_hard_limits: true,
    }
}

/// A named preset in the catalog
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitTier {
    pub name: String,
    pub limits: RateLimitConfig,
}

/// Registry of named quota presets
///
/// Lifecycle is tied to catalog construction, not requests: presets are
/// registered once at startup and only read afterwards.
#[derive(Debug, Clone)]
pub struct TierCatalog {
    tiers: HashMap<String, RateLimitConfig>,
}

impl TierCatalog {
    /// Catalog with the built-in presets (free, starter, pro, enterprise)
    pub fn builtin() -> Self {
        let mut catalog = Self {
            tiers: HashMap::new(),
        };

        catalog.insert(FREE_TIER, free_preset());
        catalog.insert(
            "starter",
            RateLimitConfig {
                requests_per_minute: 300,
                requests_per_hour: 5_000,
                requests_per_day: 50_000,
                burst_allowance: 50,
                webhooks_per_minute: 30,
                webhooks_per_hour: 500,
                max_concurrent_requests: 25,
                enforce_hard_limits: true,
            },
        );
        catalog.insert(
            "pro",
            RateLimitConfig {
                requests_per_minute: 600,
                requests_per_hour: 20_000,
                requests_per_day: 200_000,
                burst_allowance: 100,
                webhooks_per_minute: 60,
                webhooks_per_hour: 1_000,
                max_concurrent_requests: 50,
                enforce_hard_limits: true,
            },
        );
        catalog.insert(
            "enterprise",
            RateLimitConfig {
                requests_per_minute: 3_000,
                requests_per_hour: 100_000,
                requests_per_day: 1_000_000,
                burst_allowance: 500,
                webhooks_per_minute: 300,
                webhooks_per_hour: 5_000,
                max_concurrent_requests: 200,
                enforce_hard_limits: true,
            },
        );

        catalog
    }

    /// Register or replace a preset; returns `self` for startup chaining
    pub fn with_tier(mut self, name: impl Into<String>, limits: RateLimitConfig) -> Self {
        self.tiers.insert(name.into(), limits);
        self
    }

    /// Resolve a tier name to its limits. Unknown names return `None`;
    /// callers fall back via [`TierCatalog::free`].
    pub fn resolve(&self, name: &str) -> Option<RateLimitConfig> {
        self.tiers.get(name).cloned()
    }

    /// The free-tier limits. Always resolves, even if the registered free
    /// preset was replaced and later removed.
    pub fn free(&self) -> RateLimitConfig {
        self.tiers
            .get(FREE_TIER)
            .cloned()
            .unwrap_or_else(free_preset)
    }

    /// All registered tiers, for admin/export surfaces
    pub fn tiers(&self) -> Vec<RateLimitTier> {
        self.tiers
            .iter()
            .map(|(name, limits)| RateLimitTier {
                name: name.clone(),
                limits: limits.clone(),
            })
            .collect()
    }

    fn insert(&mut self, name: &str, limits: RateLimitConfig) {
        self.tiers.insert(name.to_string(), limits);
    }
}

impl Default for TierCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
