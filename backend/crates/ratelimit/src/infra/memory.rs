//! In-Memory Repository Implementation
//!
//! Mutex-and-map backend for tests and single-process development setups.
//! Supports failure and latency injection so the fail-open paths can be
//! exercised without a real outage.

use crate::domain::entities::{CounterBucket, RateLimitViolation};
use crate::domain::repository::{AuditSink, ConfigStore, CounterStore};
use crate::domain::value_objects::{BucketKey, RateLimitConfig};
use crate::error::{LimiterResult, RateLimitError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Inner {
    counters: Mutex<HashMap<BucketKey, u64>>,
    overrides: Mutex<HashMap<String, RateLimitConfig>>,
    tier_assignments: Mutex<HashMap<String, String>>,
    violations: Mutex<Vec<RateLimitViolation>>,
    fail_counters: AtomicBool,
    fail_config: AtomicBool,
    fail_audit: AtomicBool,
    counter_latency: Mutex<Option<Duration>>,
}

/// In-memory repository implementing all three store traits
#[derive(Clone, Default)]
pub struct InMemoryRateLimitStore {
    inner: Arc<Inner>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an explicit per-tenant override
    pub fn set_override(&self, tenant_id: &str, config: RateLimitConfig) {
        self.inner
            .overrides
            .lock()
            .expect("overrides lock poisoned")
            .insert(tenant_id.to_string(), config);
    }

    /// Assign a tier name to a tenant
    pub fn assign_tier(&self, tenant_id: &str, tier_name: &str) {
        self.inner
            .tier_assignments
            .lock()
            .expect("tiers lock poisoned")
            .insert(tenant_id.to_string(), tier_name.to_string());
    }

    /// Make every counter operation fail (simulated store outage)
    pub fn fail_counters(&self, fail: bool) {
        self.inner.fail_counters.store(fail, Ordering::SeqCst);
    }

    /// Make every config lookup fail
    pub fn fail_config(&self, fail: bool) {
        self.inner.fail_config.store(fail, Ordering::SeqCst);
    }

    /// Make every audit append fail
    pub fn fail_audit(&self, fail: bool) {
        self.inner.fail_audit.store(fail, Ordering::SeqCst);
    }

    /// Delay every counter operation (simulated slow backend)
    pub fn set_counter_latency(&self, latency: Option<Duration>) {
        *self
            .inner
            .counter_latency
            .lock()
            .expect("latency lock poisoned") = latency;
    }

    /// Snapshot of recorded violations
    pub fn violations(&self) -> Vec<RateLimitViolation> {
        self.inner
            .violations
            .lock()
            .expect("violations lock poisoned")
            .clone()
    }

    /// Drop buckets whose window has passed, mirroring storage-layer
    /// retention
    pub fn evict_expired(&self, now_ms: i64) -> usize {
        let mut counters = self
            .inner
            .counters
            .lock()
            .expect("counters lock poisoned");
        let before = counters.len();
        counters.retain(|key, count| {
            let bucket = CounterBucket {
                key: key.clone(),
                count: *count,
            };
            !bucket.is_expired(now_ms)
        });
        before - counters.len()
    }

    async fn counter_guard(&self) -> LimiterResult<()> {
        let latency = *self
            .inner
            .counter_latency
            .lock()
            .expect("latency lock poisoned");
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.inner.fail_counters.load(Ordering::SeqCst) {
            return Err(RateLimitError::Internal(
                "injected counter store failure".to_string(),
            ));
        }
        Ok(())
    }
}

impl CounterStore for InMemoryRateLimitStore {
    async fn increment(&self, key: &BucketKey) -> LimiterResult<u64> {
        self.counter_guard().await?;

        let mut counters = self
            .inner
            .counters
            .lock()
            .expect("counters lock poisoned");
        let count = counters.entry(key.clone()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn peek(&self, key: &BucketKey) -> LimiterResult<u64> {
        self.counter_guard().await?;

        let counters = self
            .inner
            .counters
            .lock()
            .expect("counters lock poisoned");
        Ok(counters.get(key).copied().unwrap_or(0))
    }
}

impl ConfigStore for InMemoryRateLimitStore {
    async fn get_override(&self, tenant_id: &str) -> LimiterResult<Option<RateLimitConfig>> {
        if self.inner.fail_config.load(Ordering::SeqCst) {
            return Err(RateLimitError::Internal(
                "injected config store failure".to_string(),
            ));
        }
        Ok(self
            .inner
            .overrides
            .lock()
            .expect("overrides lock poisoned")
            .get(tenant_id)
            .cloned())
    }

    async fn get_assigned_tier(&self, tenant_id: &str) -> LimiterResult<Option<String>> {
        if self.inner.fail_config.load(Ordering::SeqCst) {
            return Err(RateLimitError::Internal(
                "injected config store failure".to_string(),
            ));
        }
        Ok(self
            .inner
            .tier_assignments
            .lock()
            .expect("tiers lock poisoned")
            .get(tenant_id)
            .cloned())
    }
}

impl AuditSink for InMemoryRateLimitStore {
    async fn append(&self, violation: &RateLimitViolation) -> LimiterResult<()> {
        if self.inner.fail_audit.load(Ordering::SeqCst) {
            return Err(RateLimitError::Internal(
                "injected audit sink failure".to_string(),
            ));
        }
        self.inner
            .violations
            .lock()
            .expect("violations lock poisoned")
            .push(violation.clone());
        Ok(())
    }
}
