//! Domain Value Objects
//!
//! Immutable value types for the rate-limiting domain.

use serde::{Deserialize, Serialize};

/// Quota window, with its own duration constants.
///
/// The variants are ordered by priority: the tightest window is checked
/// first, so a denied client always receives the shortest correct retry
/// hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    Minute,
    Hour,
    Day,
}

impl WindowType {
    /// All windows in verdict priority order (tightest first)
    pub const ALL: [WindowType; 3] = [WindowType::Minute, WindowType::Hour, WindowType::Day];

    /// Window size in seconds
    pub const fn size_secs(self) -> i64 {
        match self {
            WindowType::Minute => 60,
            WindowType::Hour => 3_600,
            WindowType::Day => 86_400,
        }
    }

    /// Window size in milliseconds
    pub const fn size_ms(self) -> i64 {
        self.size_secs() * 1_000
    }

    /// Start of the window containing `now_ms`, truncated to the window
    /// boundary
    pub const fn window_start_ms(self, now_ms: i64) -> i64 {
        (now_ms / self.size_ms()) * self.size_ms()
    }

    /// Storage string for this window
    pub const fn as_str(self) -> &'static str {
        match self {
            WindowType::Minute => "minute",
            WindowType::Hour => "hour",
            WindowType::Day => "day",
        }
    }
}

impl std::str::FromStr for WindowType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minute" => Ok(WindowType::Minute),
            "hour" => Ok(WindowType::Hour),
            "day" => Ok(WindowType::Day),
            other => Err(format!("unknown window type: {}", other)),
        }
    }
}

impl std::fmt::Display for WindowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity of one counter bucket: one tenant, one optional API key, one
/// window type, one window's time span.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub tenant_id: String,
    pub api_key_id: Option<String>,
    pub window: WindowType,
    pub window_start_ms: i64,
}

impl BucketKey {
    /// Key of the bucket covering `now_ms`
    pub fn current(
        tenant_id: &str,
        api_key_id: Option<&str>,
        window: WindowType,
        now_ms: i64,
    ) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            api_key_id: api_key_id.map(str::to_string),
            window,
            window_start_ms: window.window_start_ms(now_ms),
        }
    }

    /// First millisecond past this bucket's window
    pub fn expires_at_ms(&self) -> i64 {
        self.window_start_ms + self.window.size_ms()
    }
}

/// Effective per-tenant quota snapshot.
///
/// Produced by the config resolver and never mutated in place; a tier
/// change replaces the whole value. `webhooks_*` and
/// `max_concurrent_requests` are carried for the collaborators that consume
/// them (webhook dispatcher, connection limiter) - the request path here
/// enforces the three window quotas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_minute: u64,
    pub requests_per_hour: u64,
    pub requests_per_day: u64,
    /// Extra headroom on the minute window to absorb short spikes
    pub burst_allowance: u64,
    pub webhooks_per_minute: u64,
    pub webhooks_per_hour: u64,
    pub max_concurrent_requests: u32,
    /// When false the tenant runs in shadow mode: denials are recorded but
    /// requests are forwarded
    pub enforce_hard_limits: bool,
}

/// Request identity supplied by the upstream auth layer via request
/// extensions. Absence of this context is an authentication failure, not a
/// rate-limit concern.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub tenant_id: String,
    pub api_key_id: Option<String>,
    pub user_id: Option<String>,
}

impl TenantContext {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            api_key_id: None,
            user_id: None,
        }
    }

    pub fn with_api_key(mut self, api_key_id: impl Into<String>) -> Self {
        self.api_key_id = Some(api_key_id.into());
        self
    }
}

/// Verdict for a single window, computed fresh per check and never
/// persisted.
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    pub window: WindowType,
    pub allowed: bool,
    /// Effective limit for the window (burst included on the minute window)
    pub limit: u64,
    /// Count observed at check time; may lag in-flight increments
    pub count: u64,
    /// `limit - count`, clamped at zero
    pub remaining: u64,
    /// Unix seconds at which the window rolls over
    pub reset_at: i64,
    /// Seconds until the window rolls over; set only when denied
    pub retry_after_secs: Option<i64>,
}
