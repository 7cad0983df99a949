//! API DTOs (Data Transfer Objects)

use serde::Serialize;

/// Body of a 429 rejection
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitedResponse {
    pub error: String,
    pub message: String,
    /// Effective limit of the violated window
    pub limit: u64,
    pub remaining: u64,
    /// Unix seconds at which the violated window rolls over
    pub reset: i64,
}

impl RateLimitedResponse {
    pub fn new(limit: u64, reset: i64, retry_after_secs: i64) -> Self {
        Self {
            error: "Rate limit exceeded".to_string(),
            message: format!(
                "Too many requests. Please try again in {} seconds.",
                retry_after_secs
            ),
            limit,
            remaining: 0,
            reset,
        }
    }
}
