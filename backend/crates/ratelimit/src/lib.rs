//! Multi-Tenant API Rate Limiting
//!
//! Clean Architecture structure:
//! - `domain/` - Window math, entities, repository traits
//! - `application/` - Use cases (resolve config, check windows, record violations)
//! - `infra/` - Database implementations
//! - `presentation/` - HTTP middleware
//!
//! ## Enforcement Model
//! - Quotas are counted per tenant and per API key across three independent
//!   fixed windows (minute/hour/day); the tightest violated window binds
//! - Counter mutation is a single atomic upsert at the storage layer; the
//!   hot path takes no application-level locks
//! - The engine fails open: a degraded counter store allows traffic under a
//!   conservative synthetic limit instead of blocking it
//! - Denials are audited best-effort and never wait on the audit store

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::check_rate_limit::RateLimitChecker;
pub use application::config::LimiterConfig;
pub use application::resolve_config::TenantConfigResolver;
pub use application::tiers::TierCatalog;
pub use domain::value_objects::{RateLimitConfig, RateLimitResult, TenantContext, WindowType};
pub use error::{LimiterResult, RateLimitError};
pub use infra::postgres::PgRateLimitRepository;
pub use presentation::middleware::{RateLimitState, enforce_rate_limit};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult, OptionExt, ResultExt},
    kind::ErrorKind,
};

#[cfg(test)]
mod tests;
