//! Rate Limiter Error Types
//!
//! This module provides limiter-specific error variants that integrate
//! with the unified `kernel::error::AppError` system.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Limiter-specific result type alias
pub type LimiterResult<T> = Result<T, RateLimitError>;

/// Limiter-specific error variants
///
/// These map to appropriate HTTP status codes and convert to `AppError`
/// for unified error handling. Note that a denied request is not an error:
/// the 429 response is built by the middleware from the binding verdict.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// No tenant identity on the request; owned by the upstream auth layer
    #[error("No tenant context on request")]
    TenantUnresolved,

    /// Counter store did not answer within the configured bound
    #[error("Counter store timed out")]
    StoreTimeout,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RateLimitError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            RateLimitError::TenantUnresolved => StatusCode::UNAUTHORIZED,
            RateLimitError::StoreTimeout => StatusCode::SERVICE_UNAVAILABLE,
            RateLimitError::Database(_) | RateLimitError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            RateLimitError::TenantUnresolved => ErrorKind::Unauthorized,
            RateLimitError::StoreTimeout => ErrorKind::ServiceUnavailable,
            RateLimitError::Database(_) | RateLimitError::Internal(_) => {
                ErrorKind::InternalServerError
            }
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            RateLimitError::Database(e) => {
                tracing::error!(error = %e, "Rate limiter database error");
            }
            RateLimitError::StoreTimeout => {
                tracing::error!("Counter store timed out");
            }
            RateLimitError::Internal(msg) => {
                tracing::error!(message = %msg, "Rate limiter internal error");
            }
            RateLimitError::TenantUnresolved => {
                tracing::debug!("Request reached the limiter without tenant context");
            }
        }
    }
}

impl From<RateLimitError> for AppError {
    fn from(err: RateLimitError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        AppError::new(kind, message)
    }
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status_code();
        // Return empty body for security (don't leak details)
        (status, ()).into_response()
    }
}
