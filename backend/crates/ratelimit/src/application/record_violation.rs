//! Record Violation Use Case
//!
//! Best-effort audit of denied requests. A failure to persist a violation
//! must never alter the already-decided 429 response or raise on the
//! request path.

use crate::domain::entities::RateLimitViolation;
use crate::domain::repository::AuditSink;
use std::sync::Arc;

/// Record Violation Use Case
pub struct ViolationRecorder<A>
where
    A: AuditSink,
{
    audit_sink: Arc<A>,
}

impl<A> ViolationRecorder<A>
where
    A: AuditSink,
{
    pub fn new(audit_sink: Arc<A>) -> Self {
        Self { audit_sink }
    }

    /// Append one violation record. Sink failures are logged and swallowed.
    pub async fn record(&self, violation: RateLimitViolation) {
        if let Err(e) = self.audit_sink.append(&violation).await {
            tracing::warn!(
                tenant_id = %violation.tenant_id,
                window = %violation.limit_type,
                error = %e,
                "Failed to record rate limit violation"
            );
        } else {
            tracing::debug!(
                tenant_id = %violation.tenant_id,
                window = %violation.limit_type,
                observed = violation.observed_count,
                limit = violation.limit_value,
                "Rate limit violation recorded"
            );
        }
    }
}
