//! PostgreSQL Repository Implementations

use crate::domain::entities::RateLimitViolation;
use crate::domain::repository::{AuditSink, ConfigStore, CounterStore};
use crate::domain::value_objects::{BucketKey, RateLimitConfig};
use crate::error::LimiterResult;
use chrono::Utc;
use sqlx::PgPool;

/// Counter rows older than this are unreachable (two day-windows) and get
/// deleted by the retention sweep.
const COUNTER_RETENTION_MS: i64 = 2 * 86_400_000;

/// PostgreSQL-backed repository
#[derive(Clone)]
pub struct PgRateLimitRepository {
    pool: PgPool,
}

impl PgRateLimitRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delete counter rows for windows that can no longer be read
    pub async fn cleanup_expired(&self) -> LimiterResult<u64> {
        let now_ms = Utc::now().timestamp_millis();
        let cutoff_ms = now_ms - COUNTER_RETENTION_MS;

        let counters_deleted =
            sqlx::query("DELETE FROM rate_limit_counters WHERE window_start_ms < $1")
                .bind(cutoff_ms)
                .execute(&self.pool)
                .await?
                .rows_affected();

        tracing::info!(
            counters = counters_deleted,
            "Cleaned up expired rate limit counters"
        );

        Ok(counters_deleted)
    }
}

impl CounterStore for PgRateLimitRepository {
    async fn increment(&self, key: &BucketKey) -> LimiterResult<u64> {
        // Single atomic upsert. Two requests from the same tenant landing in
        // the same millisecond must both be counted, so this is never a
        // read-then-write pair.
        let row = sqlx::query_as::<_, (i64,)>(
            r#"
            INSERT INTO rate_limit_counters
                (tenant_id, api_key_id, window_type, window_start_ms, request_count)
            VALUES ($1, $2, $3, $4, 1)
            ON CONFLICT (tenant_id, api_key_id, window_type, window_start_ms)
            DO UPDATE SET request_count = rate_limit_counters.request_count + 1
            RETURNING request_count
            "#,
        )
        .bind(&key.tenant_id)
        .bind(key.api_key_id.as_deref().unwrap_or(""))
        .bind(key.window.as_str())
        .bind(key.window_start_ms)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0 as u64)
    }

    async fn peek(&self, key: &BucketKey) -> LimiterResult<u64> {
        let row = sqlx::query_as::<_, (i64,)>(
            r#"
            SELECT request_count FROM rate_limit_counters
            WHERE tenant_id = $1
              AND api_key_id = $2
              AND window_type = $3
              AND window_start_ms = $4
            "#,
        )
        .bind(&key.tenant_id)
        .bind(key.api_key_id.as_deref().unwrap_or(""))
        .bind(key.window.as_str())
        .bind(key.window_start_ms)
        .fetch_optional(&self.pool)
        .await?;

        // Buckets are created lazily; an absent row is an untouched window
        Ok(row.map(|(count,)| count as u64).unwrap_or(0))
    }
}

impl ConfigStore for PgRateLimitRepository {
    async fn get_override(&self, tenant_id: &str) -> LimiterResult<Option<RateLimitConfig>> {
        let row = sqlx::query_as::<_, OverrideRow>(
            r#"
            SELECT
                requests_per_minute,
                requests_per_hour,
                requests_per_day,
                burst_allowance,
                webhooks_per_minute,
                webhooks_per_hour,
                max_concurrent_requests,
                enforce_hard_limits
            FROM tenant_limit_overrides
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(OverrideRow::into_config))
    }

    async fn get_assigned_tier(&self, tenant_id: &str) -> LimiterResult<Option<String>> {
        let tier = sqlx::query_scalar::<_, String>(
            "SELECT tier_name FROM tenant_tier_assignments WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tier)
    }
}

impl AuditSink for PgRateLimitRepository {
    async fn append(&self, violation: &RateLimitViolation) -> LimiterResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rate_limit_violations (
                violation_id,
                tenant_id,
                api_key_id,
                endpoint,
                method,
                limit_type,
                observed_count,
                limit_value,
                client_ip,
                user_agent,
                retry_after_secs,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9::inet, $10, $11, $12)
            "#,
        )
        .bind(violation.id)
        .bind(&violation.tenant_id)
        .bind(violation.api_key_id.as_deref())
        .bind(&violation.endpoint)
        .bind(&violation.method)
        .bind(violation.limit_type.as_str())
        .bind(violation.observed_count as i64)
        .bind(violation.limit_value as i64)
        .bind(violation.client_ip.map(|ip| ip.to_string()))
        .bind(violation.user_agent.as_deref())
        .bind(violation.retry_after_secs)
        .bind(violation.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// Internal row types for sqlx mapping
#[derive(sqlx::FromRow)]
struct OverrideRow {
    requests_per_minute: i64,
    requests_per_hour: i64,
    requests_per_day: i64,
    burst_allowance: i64,
    webhooks_per_minute: i64,
    webhooks_per_hour: i64,
    max_concurrent_requests: i32,
    enforce_hard_limits: bool,
}

impl OverrideRow {
    fn into_config(self) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_minute: self.requests_per_minute as u64,
            requests_per_hour: self.requests_per_hour as u64,
            requests_per_day: self.requests_per_day as u64,
            burst_allowance: self.burst_allowance as u64,
            webhooks_per_minute: self.webhooks_per_minute as u64,
            webhooks_per_hour: self.webhooks_per_hour as u64,
            max_concurrent_requests: self.max_concurrent_requests as u32,
            enforce_hard_limits: self.enforce_hard_limits,
        }
    }
}
