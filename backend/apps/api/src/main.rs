//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

use axum::extract::Request;
use axum::http::{Method, header};
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::get;
use axum::{Extension, Json, Router, http, middleware};
use ratelimit::{
    LimiterConfig, PgRateLimitRepository, RateLimitState, TenantContext, TierCatalog,
    enforce_rate_limit,
};
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Re-export unified error types for use in handlers
pub use kernel::error::{
    app_error::{AppError, AppResult, OptionExt},
    kind::ErrorKind,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,ratelimit=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Database connection
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set in environment");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    // Startup cleanup: remove counter rows for windows that have passed
    // Errors here should not prevent server startup
    let repo = PgRateLimitRepository::new(pool.clone());
    match repo.cleanup_expired().await {
        Ok(counters) => {
            tracing::info!(counters_deleted = counters, "Counter cleanup completed");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Counter cleanup failed, continuing anyway");
        }
    }

    // Rate limiter configuration
    let limiter_config = LimiterConfig::from_env();
    let limiter_state = RateLimitState::new(repo, TierCatalog::builtin(), limiter_config);

    // CORS configuration
    let dashboard_origins = env::var("DASHBOARD_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:5173,http://127.0.0.1:5173".to_string());

    let allowed_origins: Vec<http::HeaderValue> = dashboard_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    // Build router. Metered routes sit under the rate limit middleware;
    // /health is registered outside it so probes are never throttled.
    let app = Router::new()
        .route("/api/v1/ping", get(ping))
        .route("/api/v1/whoami", get(whoami))
        .layer(middleware::from_fn_with_state(
            limiter_state,
            enforce_rate_limit::<PgRateLimitRepository>,
        ))
        .layer(middleware::from_fn(tenant_context_from_headers))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Attach a [`TenantContext`] from request headers.
///
/// Stands in for the real authentication service at its documented seam:
/// whatever resolves API credentials upstream is expected to insert a
/// `TenantContext` extension before the limiter runs. Requests without a
/// tenant header pass through untouched and the limiter answers 401.
async fn tenant_context_from_headers(mut req: Request, next: Next) -> Response {
    let tenant_id = req
        .headers()
        .get("x-tenant-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if let Some(tenant_id) = tenant_id {
        let mut context = TenantContext::new(tenant_id);
        if let Some(api_key_id) = req
            .headers()
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
        {
            context = context.with_api_key(api_key_id);
        }
        req.extensions_mut().insert(context);
    }

    next.run(req).await
}

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /api/v1/ping
async fn ping() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "pong": true }))
}

/// GET /api/v1/whoami
async fn whoami(tenant: Option<Extension<TenantContext>>) -> AppResult<Json<serde_json::Value>> {
    let Extension(tenant) =
        tenant.ok_or_app_err(ErrorKind::Unauthorized, "No tenant identity on request")?;

    Ok(Json(serde_json::json!({
        "tenantId": tenant.tenant_id,
        "apiKeyId": tenant.api_key_id,
    })))
}
