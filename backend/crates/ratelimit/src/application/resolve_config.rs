//! Resolve Tenant Config Use Case
//!
//! Maps a tenant to its effective quota. Resolution is an ordered list of
//! strategies, each returning an option; the last strategy always succeeds,
//! so the resolver never returns an error to its caller. Degraded lookups
//! degrade to a safe default instead of blocking traffic.

use crate::application::tiers::TierCatalog;
use crate::domain::repository::ConfigStore;
use crate::domain::value_objects::RateLimitConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Short-TTL cache of resolved tenant configs.
///
/// Shared across requests so a hot tenant costs one config-store round trip
/// per TTL, not one per request. A tier change is picked up at the next TTL
/// expiry, or immediately via [`ConfigCache::invalidate`].
#[derive(Debug)]
pub struct ConfigCache {
    entries: RwLock<HashMap<String, (RateLimitConfig, Instant)>>,
    ttl: Duration,
}

impl ConfigCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn get(&self, tenant_id: &str) -> Option<RateLimitConfig> {
        let entries = self.entries.read().await;
        entries
            .get(tenant_id)
            .filter(|(_, cached_at)| cached_at.elapsed() < self.ttl)
            .map(|(config, _)| config.clone())
    }

    pub async fn insert(&self, tenant_id: &str, config: RateLimitConfig) {
        let mut entries = self.entries.write().await;
        entries.insert(tenant_id.to_string(), (config, Instant::now()));
    }

    /// Drop a tenant's cached config so the next resolve sees fresh data
    pub async fn invalidate(&self, tenant_id: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(tenant_id);
    }
}

/// Resolve Tenant Config Use Case
pub struct TenantConfigResolver<C>
where
    C: ConfigStore,
{
    config_store: Arc<C>,
    catalog: Arc<TierCatalog>,
    cache: Arc<ConfigCache>,
}

impl<C> TenantConfigResolver<C>
where
    C: ConfigStore,
{
    pub fn new(config_store: Arc<C>, catalog: Arc<TierCatalog>, cache: Arc<ConfigCache>) -> Self {
        Self {
            config_store,
            catalog,
            cache,
        }
    }

    /// Effective quota for a tenant. Infallible by construction:
    /// override -> assigned tier -> free preset.
    pub async fn resolve(&self, tenant_id: &str) -> RateLimitConfig {
        if let Some(cached) = self.cache.get(tenant_id).await {
            return cached;
        }

        let resolved = self.resolve_uncached(tenant_id).await;
        self.cache.insert(tenant_id, resolved.clone()).await;
        resolved
    }

    async fn resolve_uncached(&self, tenant_id: &str) -> RateLimitConfig {
        if let Some(config) = self.from_override(tenant_id).await {
            return config;
        }
        if let Some(config) = self.from_assigned_tier(tenant_id).await {
            return config;
        }
        self.catalog.free()
    }

    /// Strategy 1: explicit per-tenant override
    async fn from_override(&self, tenant_id: &str) -> Option<RateLimitConfig> {
        match self.config_store.get_override(tenant_id).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    error = %e,
                    "Override lookup failed, falling back to tier"
                );
                None
            }
        }
    }

    /// Strategy 2: the tenant's assigned tier, resolved via the catalog
    async fn from_assigned_tier(&self, tenant_id: &str) -> Option<RateLimitConfig> {
        let tier_name = match self.config_store.get_assigned_tier(tenant_id).await {
            Ok(found) => found?,
            Err(e) => {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    error = %e,
                    "Tier lookup failed, falling back to free tier"
                );
                return None;
            }
        };

        let resolved = self.catalog.resolve(&tier_name);
        if resolved.is_none() {
            tracing::warn!(
                tenant_id = %tenant_id,
                tier = %tier_name,
                "Assigned tier not in catalog, falling back to free tier"
            );
        }
        resolved
    }
}
