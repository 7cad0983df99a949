//! Repository Traits
//!
//! Interfaces for data persistence. Implementation is in infrastructure layer.

use crate::domain::entities::RateLimitViolation;
use crate::domain::value_objects::{BucketKey, RateLimitConfig};
use crate::error::LimiterResult;

/// Atomic counter backend, keyed by bucket.
///
/// Storage errors propagate as explicit error values; the store never
/// substitutes defaults. Deciding what to do on failure (fail-open) belongs
/// to the checker.
#[trait_variant::make(CounterStore: Send)]
pub trait LocalCounterStore {
    /// Atomically add one to the bucket's count and return the new count.
    ///
    /// Must be a single upsert-and-increment at the storage layer, safe
    /// under arbitrary concurrent callers on the same key.
    async fn increment(&self, key: &BucketKey) -> LimiterResult<u64>;

    /// Read the bucket's current count. An absent bucket reads zero.
    /// May lag in-flight increments.
    async fn peek(&self, key: &BucketKey) -> LimiterResult<u64>;
}

/// Per-tenant configuration lookups (overrides and tier assignments)
#[trait_variant::make(ConfigStore: Send)]
pub trait LocalConfigStore {
    /// Explicit per-tenant quota override, if one exists
    async fn get_override(&self, tenant_id: &str) -> LimiterResult<Option<RateLimitConfig>>;

    /// Name of the tier assigned to the tenant, if one exists
    async fn get_assigned_tier(&self, tenant_id: &str) -> LimiterResult<Option<String>>;
}

/// Append-only audit sink for denied requests
#[trait_variant::make(AuditSink: Send)]
pub trait LocalAuditSink {
    /// Append one violation record
    async fn append(&self, violation: &RateLimitViolation) -> LimiterResult<()>;
}
