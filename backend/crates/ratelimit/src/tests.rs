//! Unit tests for the rate limiting crate

#[cfg(test)]
mod window_tests {
    use crate::domain::value_objects::*;

    #[test]
    fn test_window_sizes() {
        assert_eq!(WindowType::Minute.size_secs(), 60);
        assert_eq!(WindowType::Hour.size_secs(), 3_600);
        assert_eq!(WindowType::Day.size_secs(), 86_400);
        assert_eq!(WindowType::Minute.size_ms(), 60_000);
    }

    #[test]
    fn test_priority_order_tightest_first() {
        assert_eq!(
            WindowType::ALL,
            [WindowType::Minute, WindowType::Hour, WindowType::Day]
        );
    }

    #[test]
    fn test_window_start_truncates_to_boundary() {
        // 2023-11-14T22:13:20.123Z
        let now_ms = 1_700_000_000_123;
        for window in WindowType::ALL {
            let start = window.window_start_ms(now_ms);
            assert_eq!(start % window.size_ms(), 0, "{window} start not aligned");
            assert!(start <= now_ms);
            assert!(now_ms < start + window.size_ms());
        }
    }

    #[test]
    fn test_window_start_stable_within_window() {
        let start_of_minute = 1_700_000_040_000;
        for offset in [0, 1, 30_000, 59_999] {
            assert_eq!(
                WindowType::Minute.window_start_ms(start_of_minute + offset),
                start_of_minute
            );
        }
        assert_ne!(
            WindowType::Minute.window_start_ms(start_of_minute + 60_000),
            start_of_minute
        );
    }

    #[test]
    fn test_window_storage_string_roundtrip() {
        for window in WindowType::ALL {
            let parsed: WindowType = window.as_str().parse().unwrap();
            assert_eq!(parsed, window);
        }
        assert!("fortnight".parse::<WindowType>().is_err());
    }

    #[test]
    fn test_bucket_key_current() {
        let now_ms = 1_700_000_000_123;
        let key = BucketKey::current("acme", Some("key-1"), WindowType::Minute, now_ms);

        assert_eq!(key.tenant_id, "acme");
        assert_eq!(key.api_key_id.as_deref(), Some("key-1"));
        assert_eq!(key.window_start_ms, WindowType::Minute.window_start_ms(now_ms));
        assert_eq!(key.expires_at_ms(), key.window_start_ms + 60_000);
    }

    #[test]
    fn test_bucket_keys_differ_per_window() {
        let now_ms = 1_700_000_000_123;
        let minute = BucketKey::current("acme", None, WindowType::Minute, now_ms);
        let hour = BucketKey::current("acme", None, WindowType::Hour, now_ms);
        assert_ne!(minute, hour);
    }
}

#[cfg(test)]
mod domain_tests {
    use crate::domain::entities::*;
    use crate::domain::value_objects::*;

    #[test]
    fn test_counter_bucket_expiry() {
        let now_ms = 1_700_000_000_123;
        let bucket = CounterBucket::new("acme", None, WindowType::Minute, now_ms);

        assert_eq!(bucket.count, 0);
        assert!(!bucket.is_expired(now_ms));
        assert!(bucket.is_expired(bucket.key.window_start_ms + 60_000));
    }

    #[test]
    fn test_violation_creation() {
        let tenant = TenantContext::new("acme").with_api_key("key-1");
        let violation = RateLimitViolation::new(
            &tenant,
            "POST",
            "/api/v1/data",
            WindowType::Minute,
            61,
            60,
            42,
            Some("192.168.1.1".parse().unwrap()),
            Some("curl/8.0".to_string()),
        );

        assert_eq!(violation.tenant_id, "acme");
        assert_eq!(violation.api_key_id.as_deref(), Some("key-1"));
        assert_eq!(violation.limit_type, WindowType::Minute);
        assert_eq!(violation.observed_count, 61);
        assert_eq!(violation.limit_value, 60);
        assert_eq!(violation.retry_after_secs, 42);
    }
}

#[cfg(test)]
mod tier_tests {
    use crate::application::tiers::*;
    use crate::domain::value_objects::RateLimitConfig;

    #[test]
    fn test_builtin_presets_resolve() {
        let catalog = TierCatalog::builtin();
        for name in ["free", "starter", "pro", "enterprise"] {
            assert!(catalog.resolve(name).is_some(), "{name} missing");
        }
    }

    #[test]
    fn test_free_preset_limits() {
        let free = TierCatalog::builtin().free();
        assert_eq!(free.requests_per_minute, 60);
        assert_eq!(free.requests_per_hour, 1_000);
        assert_eq!(free.requests_per_day, 10_000);
        assert_eq!(free.burst_allowance, 0);
        assert!(free.enforce_hard_limits);
    }

    #[test]
    fn test_unknown_tier_is_none() {
        assert!(TierCatalog::builtin().resolve("platinum").is_none());
    }

    #[test]
    fn test_tiers_are_ordered_by_generosity() {
        let catalog = TierCatalog::builtin();
        let free = catalog.resolve("free").unwrap();
        let pro = catalog.resolve("pro").unwrap();
        let enterprise = catalog.resolve("enterprise").unwrap();

        assert!(free.requests_per_minute < pro.requests_per_minute);
        assert!(pro.requests_per_minute < enterprise.requests_per_minute);
    }

    #[test]
    fn test_custom_tier_registration() {
        let custom = RateLimitConfig {
            requests_per_minute: 5,
            requests_per_hour: 50,
            requests_per_day: 500,
            burst_allowance: 0,
            webhooks_per_minute: 1,
            webhooks_per_hour: 10,
            max_concurrent_requests: 2,
            enforce_hard_limits: true,
        };
        let catalog = TierCatalog::builtin().with_tier("trial", custom.clone());

        assert_eq!(catalog.resolve("trial"), Some(custom));
    }

    #[test]
    fn test_tier_listing_for_admin_surface() {
        let tiers = TierCatalog::builtin().tiers();
        assert_eq!(tiers.len(), 4);
        assert!(tiers.iter().any(|t| t.name == "free"));
    }
}

#[cfg(test)]
mod config_tests {
    use crate::application::config::LimiterConfig;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = LimiterConfig::default();

        assert_eq!(config.store_timeout, Duration::from_millis(500));
        assert_eq!(config.fail_open_limit, 60);
        assert_eq!(config.config_cache_ttl, Duration::from_secs(30));
        assert_eq!(config.store_timeout_ms(), 500);
    }
}

#[cfg(test)]
mod resolver_tests {
    use crate::application::resolve_config::{ConfigCache, TenantConfigResolver};
    use crate::application::tiers::TierCatalog;
    use crate::domain::value_objects::RateLimitConfig;
    use crate::infra::memory::InMemoryRateLimitStore;
    use std::sync::Arc;
    use std::time::Duration;

    fn override_config(rpm: u64) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_minute: rpm,
            requests_per_hour: 100_000,
            requests_per_day: 1_000_000,
            burst_allowance: 0,
            webhooks_per_minute: 10,
            webhooks_per_hour: 100,
            max_concurrent_requests: 10,
            enforce_hard_limits: true,
        }
    }

    fn resolver(
        store: &InMemoryRateLimitStore,
        ttl: Duration,
    ) -> TenantConfigResolver<InMemoryRateLimitStore> {
        TenantConfigResolver::new(
            Arc::new(store.clone()),
            Arc::new(TierCatalog::builtin()),
            Arc::new(ConfigCache::new(ttl)),
        )
    }

    #[tokio::test]
    async fn test_override_beats_tier() {
        let store = InMemoryRateLimitStore::new();
        store.assign_tier("acme", "pro");
        store.set_override("acme", override_config(7));

        let resolved = resolver(&store, Duration::ZERO).resolve("acme").await;
        assert_eq!(resolved.requests_per_minute, 7);
    }

    #[tokio::test]
    async fn test_assigned_tier_resolves() {
        let store = InMemoryRateLimitStore::new();
        store.assign_tier("acme", "pro");

        let resolved = resolver(&store, Duration::ZERO).resolve("acme").await;
        let pro = TierCatalog::builtin().resolve("pro").unwrap();
        assert_eq!(resolved, pro);
    }

    #[tokio::test]
    async fn test_unknown_tier_falls_back_to_free() {
        let store = InMemoryRateLimitStore::new();
        store.assign_tier("acme", "platinum");

        let resolved = resolver(&store, Duration::ZERO).resolve("acme").await;
        assert_eq!(resolved, TierCatalog::builtin().free());
    }

    #[tokio::test]
    async fn test_no_assignment_falls_back_to_free() {
        let store = InMemoryRateLimitStore::new();
        let resolved = resolver(&store, Duration::ZERO).resolve("ghost").await;
        assert_eq!(resolved, TierCatalog::builtin().free());
    }

    #[tokio::test]
    async fn test_store_failure_degrades_to_free() {
        let store = InMemoryRateLimitStore::new();
        store.set_override("acme", override_config(7));
        store.fail_config(true);

        // The resolver never errors; degraded lookups land on the free tier
        let resolved = resolver(&store, Duration::ZERO).resolve("acme").await;
        assert_eq!(resolved, TierCatalog::builtin().free());
    }

    #[tokio::test]
    async fn test_cache_serves_within_ttl() {
        let store = InMemoryRateLimitStore::new();
        store.set_override("acme", override_config(7));

        let resolver = resolver(&store, Duration::from_secs(60));
        assert_eq!(resolver.resolve("acme").await.requests_per_minute, 7);

        // The new override is not visible until the cache entry goes away
        store.set_override("acme", override_config(9));
        assert_eq!(resolver.resolve("acme").await.requests_per_minute, 7);
    }

    #[tokio::test]
    async fn test_invalidate_drops_cached_config() {
        let store = InMemoryRateLimitStore::new();
        store.set_override("acme", override_config(7));

        let cache = Arc::new(ConfigCache::new(Duration::from_secs(60)));
        let resolver = TenantConfigResolver::new(
            Arc::new(store.clone()),
            Arc::new(TierCatalog::builtin()),
            cache.clone(),
        );

        assert_eq!(resolver.resolve("acme").await.requests_per_minute, 7);

        store.set_override("acme", override_config(9));
        cache.invalidate("acme").await;
        assert_eq!(resolver.resolve("acme").await.requests_per_minute, 9);
    }
}

#[cfg(test)]
mod checker_tests {
    use crate::application::check_rate_limit::RateLimitChecker;
    use crate::application::config::LimiterConfig;
    use crate::domain::repository::CounterStore;
    use crate::domain::value_objects::{BucketKey, RateLimitConfig, WindowType};
    use crate::infra::memory::InMemoryRateLimitStore;
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;

    fn limits(rph: u64) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_minute: 1_000_000,
            requests_per_hour: rph,
            requests_per_day: 1_000_000,
            burst_allowance: 0,
            webhooks_per_minute: 10,
            webhooks_per_hour: 100,
            max_concurrent_requests: 10,
            enforce_hard_limits: true,
        }
    }

    fn checker(store: &InMemoryRateLimitStore) -> RateLimitChecker<InMemoryRateLimitStore> {
        RateLimitChecker::new(Arc::new(store.clone()), Arc::new(LimiterConfig::default()))
    }

    // The hour window keeps these tests clear of minute-boundary rollover.

    #[tokio::test]
    async fn test_denies_request_past_limit() {
        let store = InMemoryRateLimitStore::new();
        let checker = checker(&store);
        let limits = limits(5);

        for i in 0..5 {
            let result = checker.check("acme", None, WindowType::Hour, &limits).await;
            assert!(result.allowed, "request {} should be allowed", i + 1);

            let now_ms = Utc::now().timestamp_millis();
            let key = BucketKey::current("acme", None, WindowType::Hour, now_ms);
            store.increment(&key).await.unwrap();
        }

        // Quota spent: the next request in the same window is denied
        let result = checker.check("acme", None, WindowType::Hour, &limits).await;
        assert!(!result.allowed);
        assert_eq!(result.limit, 5);
        assert_eq!(result.remaining, 0);
        let retry = result.retry_after_secs.unwrap();
        assert!(retry >= 1 && retry <= 3_600);
    }

    #[tokio::test]
    async fn test_peek_is_idempotent() {
        let store = InMemoryRateLimitStore::new();
        let now_ms = Utc::now().timestamp_millis();
        let key = BucketKey::current("acme", None, WindowType::Hour, now_ms);

        for _ in 0..3 {
            store.increment(&key).await.unwrap();
        }

        let first = store.peek(&key).await.unwrap();
        let second = store.peek(&key).await.unwrap();
        assert_eq!(first, 3);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_api_keys_have_separate_buckets() {
        let store = InMemoryRateLimitStore::new();
        let checker = checker(&store);
        let limits = limits(1);

        let now_ms = Utc::now().timestamp_millis();
        let key_a = BucketKey::current("acme", Some("key-a"), WindowType::Hour, now_ms);
        store.increment(&key_a).await.unwrap();

        let result_a = checker
            .check("acme", Some("key-a"), WindowType::Hour, &limits)
            .await;
        let result_b = checker
            .check("acme", Some("key-b"), WindowType::Hour, &limits)
            .await;
        assert!(!result_a.allowed);
        assert!(result_b.allowed, "separate key should have its own quota");
    }

    #[tokio::test]
    async fn test_tenants_have_separate_buckets() {
        let store = InMemoryRateLimitStore::new();
        let checker = checker(&store);
        let limits = limits(1);

        let now_ms = Utc::now().timestamp_millis();
        let key = BucketKey::current("acme", None, WindowType::Hour, now_ms);
        store.increment(&key).await.unwrap();

        assert!(!checker.check("acme", None, WindowType::Hour, &limits).await.allowed);
        assert!(checker.check("globex", None, WindowType::Hour, &limits).await.allowed);
    }

    #[tokio::test]
    async fn test_fail_open_on_store_error() {
        let store = InMemoryRateLimitStore::new();
        store.fail_counters(true);
        let checker = checker(&store);

        let result = checker.check("acme", None, WindowType::Hour, &limits(1)).await;
        assert!(result.allowed, "store outage must not block traffic");
        assert_eq!(result.limit, LimiterConfig::default().fail_open_limit);
        assert!(result.retry_after_secs.is_none());
    }

    #[tokio::test]
    async fn test_fail_open_on_store_timeout() {
        let store = InMemoryRateLimitStore::new();
        store.set_counter_latency(Some(Duration::from_millis(200)));

        let config = LimiterConfig {
            store_timeout: Duration::from_millis(10),
            ..LimiterConfig::default()
        };
        let checker = RateLimitChecker::new(Arc::new(store.clone()), Arc::new(config));

        let result = checker.check("acme", None, WindowType::Hour, &limits(1)).await;
        assert!(result.allowed, "slow store must not stall the request");
    }

    /// Launching exactly `limit` concurrent requests against a fresh bucket
    /// allows all of them; once their increments have landed, the next
    /// request is denied.
    #[tokio::test]
    async fn test_concurrent_burst_at_limit() {
        let store = InMemoryRateLimitStore::new();
        let limit = 30u64;
        let limits = Arc::new(limits(limit));

        let mut handles = Vec::new();
        for _ in 0..limit {
            let store = store.clone();
            let limits = Arc::clone(&limits);
            handles.push(tokio::spawn(async move {
                let checker = RateLimitChecker::new(
                    Arc::new(store.clone()),
                    Arc::new(LimiterConfig::default()),
                );
                let result = checker.check("acme", None, WindowType::Hour, &limits).await;

                let now_ms = Utc::now().timestamp_millis();
                let key = BucketKey::current("acme", None, WindowType::Hour, now_ms);
                store.increment(&key).await.unwrap();

                result.allowed
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap(), "burst within limit must be allowed");
        }

        let result = checker(&store)
            .check("acme", None, WindowType::Hour, &limits)
            .await;
        assert!(!result.allowed, "request after the burst must be denied");
    }

    #[tokio::test]
    async fn test_concurrent_increments_all_counted() {
        let store = InMemoryRateLimitStore::new();
        let now_ms = Utc::now().timestamp_millis();
        let key = BucketKey::current("acme", None, WindowType::Day, now_ms);

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move { store.increment(&key).await.unwrap() }));
        }

        let mut counts: Vec<u64> = Vec::new();
        for handle in handles {
            counts.push(handle.await.unwrap());
        }

        // add-and-return must never hand out the same count twice
        counts.sort_unstable();
        counts.dedup();
        assert_eq!(counts.len(), 50);
        assert_eq!(store.peek(&key).await.unwrap(), 50);
    }
}

#[cfg(test)]
mod recorder_tests {
    use crate::application::record_violation::ViolationRecorder;
    use crate::domain::entities::RateLimitViolation;
    use crate::domain::value_objects::{TenantContext, WindowType};
    use crate::infra::memory::InMemoryRateLimitStore;
    use std::sync::Arc;

    fn violation() -> RateLimitViolation {
        RateLimitViolation::new(
            &TenantContext::new("acme"),
            "GET",
            "/api/v1/data",
            WindowType::Minute,
            61,
            60,
            30,
            None,
            None,
        )
    }

    #[tokio::test]
    async fn test_violation_is_appended() {
        let store = InMemoryRateLimitStore::new();
        let recorder = ViolationRecorder::new(Arc::new(store.clone()));

        recorder.record(violation()).await;

        let recorded = store.violations();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].tenant_id, "acme");
    }

    #[tokio::test]
    async fn test_sink_failure_is_swallowed() {
        let store = InMemoryRateLimitStore::new();
        store.fail_audit(true);
        let recorder = ViolationRecorder::new(Arc::new(store.clone()));

        // Must not panic or propagate
        recorder.record(violation()).await;
        assert!(store.violations().is_empty());
    }
}

#[cfg(test)]
mod middleware_tests {
    use crate::application::config::LimiterConfig;
    use crate::application::tiers::TierCatalog;
    use crate::domain::value_objects::{RateLimitConfig, TenantContext, WindowType};
    use crate::infra::memory::InMemoryRateLimitStore;
    use crate::presentation::middleware::{RateLimitState, enforce_rate_limit, extract_client_ip};
    use axum::body::Body;
    use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
    use axum::routing::get;
    use axum::{Extension, Router, middleware};
    use std::time::Duration;
    use tower::ServiceExt;

    fn blocked_config(enforce: bool) -> RateLimitConfig {
        // A zero minute quota denies every request without needing to
        // pre-fill counters, which keeps these tests clear of window
        // boundaries entirely.
        RateLimitConfig {
            requests_per_minute: 0,
            requests_per_hour: 0,
            requests_per_day: 1_000_000,
            burst_allowance: 0,
            webhooks_per_minute: 10,
            webhooks_per_hour: 100,
            max_concurrent_requests: 10,
            enforce_hard_limits: enforce,
        }
    }

    fn app(store: InMemoryRateLimitStore, tenant: Option<TenantContext>) -> Router {
        let state = RateLimitState::new(store, TierCatalog::builtin(), LimiterConfig::default());

        let mut router = Router::new()
            .route("/api/v1/data", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(
                state,
                enforce_rate_limit::<InMemoryRateLimitStore>,
            ));

        // The extension layer stands in for the upstream auth collaborator
        if let Some(tenant) = tenant {
            router = router.layer(Extension(tenant));
        }

        router
    }

    fn request() -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri("/api/v1/data")
            .header("user-agent", "limit-test/1.0")
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::empty())
            .unwrap()
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met within 1s");
    }

    #[tokio::test]
    async fn test_allowed_request_gets_limit_headers() {
        let store = InMemoryRateLimitStore::new();
        // No override, no tier assignment: the free preset applies
        let app = app(store, Some(TenantContext::new("acme")));

        let response = app.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers();
        assert_eq!(headers.get("x-ratelimit-limit").unwrap(), "60");
        assert_eq!(headers.get("x-ratelimit-remaining").unwrap(), "60");
        assert!(headers.get("x-ratelimit-reset").is_some());
        assert!(headers.get("retry-after").is_none());
    }

    #[tokio::test]
    async fn test_denied_request_gets_429_with_body() {
        let store = InMemoryRateLimitStore::new();
        store.set_override("acme", blocked_config(true));
        let app = app(store, Some(TenantContext::new("acme")));

        let response = app.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let headers = response.headers();
        assert_eq!(headers.get("x-ratelimit-limit").unwrap(), "0");
        assert_eq!(headers.get("x-ratelimit-remaining").unwrap(), "0");
        let retry_after: i64 = headers
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap();
        assert!(retry_after >= 1 && retry_after <= 60);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Rate limit exceeded");
        assert_eq!(body["limit"], 0);
        assert_eq!(body["remaining"], 0);
        assert!(body["reset"].is_i64());
        assert!(
            body["message"]
                .as_str()
                .unwrap()
                .starts_with("Too many requests")
        );
    }

    #[tokio::test]
    async fn test_minute_window_binds_before_hour() {
        // Both the minute and hour quotas are violated; the recorded
        // violation must carry the minute window
        let store = InMemoryRateLimitStore::new();
        store.set_override("acme", blocked_config(true));
        let app = app(store.clone(), Some(TenantContext::new("acme")));

        let response = app.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        wait_for(|| !store.violations().is_empty()).await;
        let violations = store.violations();
        assert_eq!(violations[0].limit_type, WindowType::Minute);
    }

    #[tokio::test]
    async fn test_denied_request_records_violation() {
        let store = InMemoryRateLimitStore::new();
        store.set_override("acme", blocked_config(true));
        let app = app(
            store.clone(),
            Some(TenantContext::new("acme").with_api_key("key-1")),
        );

        let response = app.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        wait_for(|| !store.violations().is_empty()).await;
        let violations = store.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].tenant_id, "acme");
        assert_eq!(violations[0].api_key_id.as_deref(), Some("key-1"));
        assert_eq!(violations[0].endpoint, "/api/v1/data");
        assert_eq!(violations[0].method, "GET");
        assert_eq!(violations[0].client_ip, Some("203.0.113.9".parse().unwrap()));
        assert_eq!(violations[0].user_agent.as_deref(), Some("limit-test/1.0"));
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_change_response() {
        let store = InMemoryRateLimitStore::new();
        store.set_override("acme", blocked_config(true));
        store.fail_audit(true);
        let app = app(store, Some(TenantContext::new("acme")));

        let response = app.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_shadow_mode_forwards_and_records() {
        let store = InMemoryRateLimitStore::new();
        store.set_override("acme", blocked_config(false));
        let app = app(store.clone(), Some(TenantContext::new("acme")));

        let response = app.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        wait_for(|| !store.violations().is_empty()).await;
        assert_eq!(store.violations()[0].tenant_id, "acme");
    }

    #[tokio::test]
    async fn test_missing_tenant_context_is_401() {
        let store = InMemoryRateLimitStore::new();
        let app = app(store, None);

        let response = app.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get("x-ratelimit-limit").is_none());
    }

    #[tokio::test]
    async fn test_store_outage_fails_open() {
        let store = InMemoryRateLimitStore::new();
        store.fail_counters(true);

        // Distinct synthetic limit proves the fail-open path produced the
        // headers, not the free preset
        let config = LimiterConfig {
            fail_open_limit: 42,
            ..LimiterConfig::default()
        };
        let state = RateLimitState::new(store, TierCatalog::builtin(), config);
        let app = Router::new()
            .route("/api/v1/data", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(
                state,
                enforce_rate_limit::<InMemoryRateLimitStore>,
            ))
            .layer(Extension(TenantContext::new("acme")));

        let response = app.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("x-ratelimit-limit").unwrap(), "42");
    }

    #[tokio::test]
    async fn test_allowed_request_increments_all_windows() {
        use crate::domain::repository::CounterStore;
        use crate::domain::value_objects::BucketKey;

        let store = InMemoryRateLimitStore::new();
        let app = app(store.clone(), Some(TenantContext::new("acme")));

        // Keys are pinned to the request's window spans so polling below
        // stays on the same buckets even across a window boundary
        let now_ms = chrono::Utc::now().timestamp_millis();
        let keys: Vec<BucketKey> = WindowType::ALL
            .iter()
            .map(|&window| BucketKey::current("acme", None, window, now_ms))
            .collect();

        let response = app.oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Increments are fire-and-forget; wait for them to land
        let mut landed = false;
        for _ in 0..100 {
            let mut all_counted = true;
            for key in &keys {
                if store.peek(key).await.unwrap() != 1 {
                    all_counted = false;
                    break;
                }
            }
            if all_counted {
                landed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(landed, "increments did not land in all three windows");
    }

    #[test]
    fn test_extract_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("192.168.1.1, 10.0.0.1"),
        );

        let ip = extract_client_ip(&headers, Some("127.0.0.1".parse().unwrap()));
        assert_eq!(ip, Some("192.168.1.1".parse().unwrap()));
    }

    #[test]
    fn test_extract_client_ip_falls_back_to_direct() {
        let headers = HeaderMap::new();
        let direct = "127.0.0.1".parse().unwrap();
        assert_eq!(extract_client_ip(&headers, Some(direct)), Some(direct));
    }
}

#[cfg(test)]
mod dto_tests {
    use crate::presentation::dto::RateLimitedResponse;

    #[test]
    fn test_rejection_body_serialization() {
        let body = RateLimitedResponse::new(60, 1_700_000_060, 42);
        let json = serde_json::to_string(&body).unwrap();

        assert!(json.contains(r#""error":"Rate limit exceeded""#));
        assert!(json.contains(r#""limit":60"#));
        assert!(json.contains(r#""remaining":0"#));
        assert!(json.contains(r#""reset":1700000060"#));
        assert!(json.contains("try again in 42 seconds"));
    }
}

#[cfg(test)]
mod error_tests {
    use crate::error::RateLimitError;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn test_error_into_response_status_codes() {
        let test_cases: Vec<(RateLimitError, StatusCode)> = vec![
            (RateLimitError::TenantUnresolved, StatusCode::UNAUTHORIZED),
            (RateLimitError::StoreTimeout, StatusCode::SERVICE_UNAVAILABLE),
            (
                RateLimitError::Internal("test".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected_status) in test_cases {
            let response = error.into_response();
            assert_eq!(
                response.status(),
                expected_status,
                "Error should return correct status code"
            );
        }
    }

    #[test]
    fn test_error_display() {
        assert!(
            RateLimitError::TenantUnresolved
                .to_string()
                .contains("tenant")
        );
        assert!(RateLimitError::StoreTimeout.to_string().contains("timed out"));
    }

    #[test]
    fn test_error_converts_to_app_error() {
        let app_err: crate::AppError = RateLimitError::StoreTimeout.into();
        assert_eq!(app_err.status_code(), 503);
    }
}

#[cfg(test)]
mod memory_store_tests {
    use crate::domain::repository::CounterStore;
    use crate::domain::value_objects::{BucketKey, WindowType};
    use crate::infra::memory::InMemoryRateLimitStore;

    #[tokio::test]
    async fn test_eviction_drops_only_expired_buckets() {
        let store = InMemoryRateLimitStore::new();
        let now_ms = 1_700_000_000_123;

        let old = BucketKey::current("acme", None, WindowType::Minute, now_ms - 120_000);
        let current = BucketKey::current("acme", None, WindowType::Minute, now_ms);
        store.increment(&old).await.unwrap();
        store.increment(&current).await.unwrap();

        let evicted = store.evict_expired(now_ms);
        assert_eq!(evicted, 1);
        assert_eq!(store.peek(&current).await.unwrap(), 1);
        assert_eq!(store.peek(&old).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_counter_only_increases_within_window() {
        let store = InMemoryRateLimitStore::new();
        let key = BucketKey::current("acme", None, WindowType::Hour, 1_700_000_000_000);

        let mut last = 0;
        for _ in 0..10 {
            let count = store.increment(&key).await.unwrap();
            assert!(count > last);
            last = count;
        }
    }
}
