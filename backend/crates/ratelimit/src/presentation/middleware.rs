//! Rate Limit Middleware
//!
//! Runs the full check cycle for one request: resolve the tenant's quota,
//! fan out the three window checks, pick the binding verdict, then either
//! forward with `X-RateLimit-*` headers or reject with a 429. Each request
//! passes through exactly once; no state is revisited.

use crate::application::check_rate_limit::{RateLimitChecker, spawn_increments};
use crate::application::config::LimiterConfig;
use crate::application::record_violation::ViolationRecorder;
use crate::application::resolve_config::{ConfigCache, TenantConfigResolver};
use crate::application::tiers::TierCatalog;
use crate::domain::entities::RateLimitViolation;
use crate::domain::repository::{AuditSink, ConfigStore, CounterStore};
use crate::domain::services::binding_verdict;
use crate::domain::value_objects::{RateLimitResult, TenantContext, WindowType};
use crate::error::RateLimitError;
use crate::presentation::dto::RateLimitedResponse;
use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::IpAddr;
use std::sync::Arc;

/// Middleware state
#[derive(Clone)]
pub struct RateLimitState<R>
where
    R: CounterStore + ConfigStore + AuditSink + Clone + Send + Sync + 'static,
{
    pub repo: Arc<R>,
    pub catalog: Arc<TierCatalog>,
    pub config: Arc<LimiterConfig>,
    pub cache: Arc<ConfigCache>,
}

impl<R> RateLimitState<R>
where
    R: CounterStore + ConfigStore + AuditSink + Clone + Send + Sync + 'static,
{
    pub fn new(repo: R, catalog: TierCatalog, config: LimiterConfig) -> Self {
        let cache = Arc::new(ConfigCache::new(config.config_cache_ttl));
        Self {
            repo: Arc::new(repo),
            catalog: Arc::new(catalog),
            config: Arc::new(config),
            cache,
        }
    }
}

/// Middleware that enforces the tenant's request quotas
///
/// Expects a [`TenantContext`] in the request extensions, put there by the
/// upstream auth layer. A request without one cannot be metered and gets a
/// plain 401 - never a 429.
pub async fn enforce_rate_limit<R>(
    State(state): State<RateLimitState<R>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, Response>
where
    R: CounterStore + ConfigStore + AuditSink + Clone + Send + Sync + 'static,
{
    let Some(tenant) = req.extensions().get::<TenantContext>().cloned() else {
        return Err(RateLimitError::TenantUnresolved.into_response());
    };

    let resolver = TenantConfigResolver::new(
        state.repo.clone(),
        state.catalog.clone(),
        state.cache.clone(),
    );
    let limits = resolver.resolve(&tenant.tenant_id).await;

    // Fan-out/fan-in: the three window checks run concurrently and are
    // awaited together before any verdict is produced.
    let checker = RateLimitChecker::new(state.repo.clone(), state.config.clone());
    let api_key_id = tenant.api_key_id.as_deref();
    let (minute, hour, day) = tokio::join!(
        checker.check(&tenant.tenant_id, api_key_id, WindowType::Minute, &limits),
        checker.check(&tenant.tenant_id, api_key_id, WindowType::Hour, &limits),
        checker.check(&tenant.tenant_id, api_key_id, WindowType::Day, &limits),
    );

    // Priority order minute -> hour -> day: the tightest violated window
    // binds, so the client gets the shortest correct retry hint
    let results = [minute, hour, day];
    let verdict = binding_verdict(&results).cloned();

    match verdict {
        Some(verdict) if limits.enforce_hard_limits => {
            let violation = build_violation(&tenant, &req, &verdict);
            spawn_violation_record(state.repo.clone(), violation);
            Err(rejection_response(&verdict))
        }
        shadow_verdict => {
            if let Some(verdict) = shadow_verdict {
                tracing::info!(
                    tenant_id = %tenant.tenant_id,
                    window = %verdict.window,
                    observed = verdict.count,
                    limit = verdict.limit,
                    "Rate limit exceeded in shadow mode, forwarding"
                );
                let violation = build_violation(&tenant, &req, &verdict);
                spawn_violation_record(state.repo.clone(), violation);
            }

            spawn_increments(
                state.repo.clone(),
                state.config.clone(),
                tenant.tenant_id.clone(),
                tenant.api_key_id.clone(),
            );

            let mut response = next.run(req).await;
            apply_limit_headers(response.headers_mut(), &results[0]);
            Ok(response)
        }
    }
}

/// Attach the `X-RateLimit-*` header triple from a window result
pub fn apply_limit_headers(headers: &mut HeaderMap, result: &RateLimitResult) {
    headers.insert("x-ratelimit-limit", HeaderValue::from(result.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(result.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(result.reset_at));
}

/// 429 response for the binding verdict, headers and body per the public
/// contract
fn rejection_response(verdict: &RateLimitResult) -> Response {
    let retry_after_secs = verdict.retry_after_secs.unwrap_or(1);
    let body = RateLimitedResponse::new(verdict.limit, verdict.reset_at, retry_after_secs);

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    apply_limit_headers(response.headers_mut(), verdict);
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
    response
}

fn build_violation(
    tenant: &TenantContext,
    req: &Request<Body>,
    verdict: &RateLimitResult,
) -> RateLimitViolation {
    let direct_ip = req
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|info| info.0.ip());
    let client_ip = extract_client_ip(req.headers(), direct_ip);
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    RateLimitViolation::new(
        tenant,
        req.method().as_str(),
        req.uri().path(),
        verdict.window,
        verdict.count,
        verdict.limit,
        verdict.retry_after_secs.unwrap_or(1),
        client_ip,
        user_agent,
    )
}

/// Record a violation off the request path; the 429 never waits on the
/// audit store
fn spawn_violation_record<R>(repo: Arc<R>, violation: RateLimitViolation)
where
    R: AuditSink + Send + Sync + 'static,
{
    let recorder = ViolationRecorder::new(repo);
    tokio::spawn(async move {
        recorder.record(violation).await;
    });
}

/// Extract client IP address from headers
///
/// Checks X-Forwarded-For header first (for reverse proxy setups),
/// then falls back to direct connection IP.
pub fn extract_client_ip(headers: &HeaderMap, direct_ip: Option<IpAddr>) -> Option<IpAddr> {
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first_ip) = xff.split(',').next() {
            if let Ok(ip) = first_ip.trim().parse::<IpAddr>() {
                return Some(ip);
            }
        }
    }
    direct_ip
}
