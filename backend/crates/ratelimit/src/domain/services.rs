//! Domain Services
//!
//! Pure quota arithmetic. Everything here is computational; the only
//! suspension points in the engine are the counter-store calls.

use crate::domain::value_objects::{RateLimitConfig, RateLimitResult, WindowType};

/// Effective limit for a window.
///
/// Burst allowance applies to the minute window only: burst capacity
/// absorbs short spikes, not sustained hourly or daily load.
pub fn effective_limit(config: &RateLimitConfig, window: WindowType) -> u64 {
    match window {
        WindowType::Minute => config.requests_per_minute + config.burst_allowance,
        WindowType::Hour => config.requests_per_hour,
        WindowType::Day => config.requests_per_day,
    }
}

/// Evaluate one window's verdict from an observed count.
///
/// Invariants upheld here:
/// - `remaining` is never negative (`saturating_sub`)
/// - `reset_at` lies within one window size of `now_ms`
/// - `retry_after_secs` is set only on denial and falls in
///   `1..=window size`
pub fn evaluate_window(
    window: WindowType,
    count: u64,
    limit: u64,
    now_ms: i64,
) -> RateLimitResult {
    let window_start_ms = window.window_start_ms(now_ms);
    let reset_at = (window_start_ms + window.size_ms()) / 1_000;
    let allowed = count < limit;
    let retry_after_secs = if allowed {
        None
    } else {
        Some((reset_at - now_ms / 1_000).max(1))
    };

    RateLimitResult {
        window,
        allowed,
        limit,
        count,
        remaining: limit.saturating_sub(count),
        reset_at,
        retry_after_secs,
    }
}

/// Verdict used when the counter store is unreachable.
///
/// Availability wins over strict enforcement: the request is allowed with a
/// conservative synthetic limit so clients still see a coherent header
/// surface while the backend recovers.
pub fn fail_open_result(window: WindowType, synthetic_limit: u64, now_ms: i64) -> RateLimitResult {
    let window_start_ms = window.window_start_ms(now_ms);
    RateLimitResult {
        window,
        allowed: true,
        limit: synthetic_limit,
        count: 0,
        remaining: synthetic_limit,
        reset_at: (window_start_ms + window.size_ms()) / 1_000,
        retry_after_secs: None,
    }
}

/// First denied result in window priority order, if any.
///
/// `results` must be ordered minute -> hour -> day so the tightest violated
/// window becomes the binding verdict.
pub fn binding_verdict(results: &[RateLimitResult]) -> Option<&RateLimitResult> {
    results.iter().find(|r| !r.allowed)
}
