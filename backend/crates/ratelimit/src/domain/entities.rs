//! Domain Entities
//!
//! Core business entities for the rate-limiting domain.

use crate::domain::value_objects::{BucketKey, TenantContext, WindowType};
use chrono::{DateTime, Utc};
use std::net::IpAddr;
use uuid::Uuid;

/// CounterBucket entity - one tenant's request count for one window span.
///
/// Created lazily by the first increment in a window. Once the window has
/// passed the bucket is never read again; the storage layer garbage-collects
/// old rows on its retention schedule.
#[derive(Debug, Clone)]
pub struct CounterBucket {
    pub key: BucketKey,
    pub count: u64,
}

impl CounterBucket {
    /// Create a fresh bucket for the window covering `now_ms`
    pub fn new(
        tenant_id: &str,
        api_key_id: Option<&str>,
        window: WindowType,
        now_ms: i64,
    ) -> Self {
        Self {
            key: BucketKey::current(tenant_id, api_key_id, window, now_ms),
            count: 0,
        }
    }

    /// Whether this bucket's window has passed
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.key.expires_at_ms()
    }
}

/// RateLimitViolation entity - append-only audit record for a denied
/// request.
#[derive(Debug, Clone)]
pub struct RateLimitViolation {
    pub id: Uuid,
    pub tenant_id: String,
    pub api_key_id: Option<String>,
    pub endpoint: String,
    pub method: String,
    /// Window whose quota was exceeded
    pub limit_type: WindowType,
    pub observed_count: u64,
    pub limit_value: u64,
    pub client_ip: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub retry_after_secs: i64,
    pub created_at: DateTime<Utc>,
}

impl RateLimitViolation {
    /// Create a violation record for a denied request
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant: &TenantContext,
        method: &str,
        endpoint: &str,
        limit_type: WindowType,
        observed_count: u64,
        limit_value: u64,
        retry_after_secs: i64,
        client_ip: Option<IpAddr>,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant.tenant_id.clone(),
            api_key_id: tenant.api_key_id.clone(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
            limit_type,
            observed_count,
            limit_value,
            client_ip,
            user_agent,
            retry_after_secs,
            created_at: Utc::now(),
        }
    }
}
