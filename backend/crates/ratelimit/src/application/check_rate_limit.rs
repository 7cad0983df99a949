//! Check Rate Limit Use Case
//!
//! Evaluates one window against a resolved quota. The checker owns the
//! fail-open policy: a counter store that errors or times out never blocks
//! a request, it degrades to a conservative synthetic limit.

use crate::application::config::LimiterConfig;
use crate::domain::repository::CounterStore;
use crate::domain::services::{effective_limit, evaluate_window, fail_open_result};
use crate::domain::value_objects::{BucketKey, RateLimitConfig, RateLimitResult, WindowType};
use chrono::Utc;
use std::sync::Arc;
use tokio::time::timeout;

/// Check Rate Limit Use Case
pub struct RateLimitChecker<S>
where
    S: CounterStore,
{
    counter_store: Arc<S>,
    config: Arc<LimiterConfig>,
}

impl<S> RateLimitChecker<S>
where
    S: CounterStore,
{
    pub fn new(counter_store: Arc<S>, config: Arc<LimiterConfig>) -> Self {
        Self {
            counter_store,
            config,
        }
    }

    /// Verdict for one window.
    ///
    /// Reads are peek-only; increments happen after the overall allow
    /// decision, off the request path. The count observed here may lag
    /// in-flight increments from concurrent requests - approximate counting
    /// is the accepted tradeoff for a lock-free hot path.
    pub async fn check(
        &self,
        tenant_id: &str,
        api_key_id: Option<&str>,
        window: WindowType,
        limits: &RateLimitConfig,
    ) -> RateLimitResult {
        let now_ms = Utc::now().timestamp_millis();
        let key = BucketKey::current(tenant_id, api_key_id, window, now_ms);
        let limit = effective_limit(limits, window);

        match timeout(self.config.store_timeout, self.counter_store.peek(&key)).await {
            Ok(Ok(count)) => evaluate_window(window, count, limit, now_ms),
            Ok(Err(e)) => {
                tracing::error!(
                    tenant_id = %tenant_id,
                    window = %window,
                    error = %e,
                    "Counter peek failed, failing open"
                );
                fail_open_result(window, self.config.fail_open_limit, now_ms)
            }
            Err(_) => {
                tracing::error!(
                    tenant_id = %tenant_id,
                    window = %window,
                    timeout_ms = self.config.store_timeout_ms(),
                    "Counter peek timed out, failing open"
                );
                fail_open_result(window, self.config.fail_open_limit, now_ms)
            }
        }
    }
}

/// Spawn fire-and-forget increments for all three window buckets of an
/// allowed request.
///
/// The request is never held up waiting for increments to land; failures
/// are logged and never surfaced. Increments are additive and not
/// conditioned on the request's ultimate success, so nothing needs rolling
/// back if the client goes away.
pub fn spawn_increments<S>(
    counter_store: Arc<S>,
    config: Arc<LimiterConfig>,
    tenant_id: String,
    api_key_id: Option<String>,
) where
    S: CounterStore + Sync + 'static,
{
    tokio::spawn(async move {
        let now_ms = Utc::now().timestamp_millis();

        for window in WindowType::ALL {
            let key = BucketKey::current(&tenant_id, api_key_id.as_deref(), window, now_ms);
            match timeout(config.store_timeout, counter_store.increment(&key)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::warn!(
                        tenant_id = %tenant_id,
                        window = %window,
                        error = %e,
                        "Counter increment failed"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        tenant_id = %tenant_id,
                        window = %window,
                        "Counter increment timed out"
                    );
                }
            }
        }
    });
}
