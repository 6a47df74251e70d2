//! Shopfront storefront library.
//!
//! The customer storefront and dashboard: catalog, cart, checkout, orders,
//! reviews, address book and live notifications, rendered server-side over
//! the backend's REST API and push socket. [`app`] assembles the full
//! router so the binary and the integration tests serve the same stack.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod realtime;
pub mod routes;
pub mod state;
pub mod toast;

use std::path::Path;

use axum::{
    Router,
    extract::State,
    http::{Request, Response, StatusCode},
    routing::get,
};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tower_sessions::SessionStore;
use tracing::Span;

use crate::middleware::{
    RateLimitConfigError, auth_rate_limiter, create_session_layer, csp_nonce_middleware,
    expire_session_middleware, request_id_middleware, security_headers_middleware,
};
use crate::state::AppState;

/// Build the application router.
///
/// Layers, outermost first: Sentry, request tracing, request id, security
/// headers, CSP nonce, session, session expiry.
///
/// # Errors
///
/// Returns an error if a rate limiter cannot be configured.
pub fn app<S>(state: AppState, store: S, static_dir: &Path) -> Result<Router, RateLimitConfigError>
where
    S: SessionStore + Clone,
{
    let session_layer = create_session_layer(store, state.config());

    let router = Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes()?)
        .nest("/auth", routes::auth_routes().layer(auth_rate_limiter()?))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(axum::middleware::from_fn(expire_session_middleware))
        .layer(session_layer)
        .layer(axum::middleware::from_fn(csp_nonce_middleware))
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(|response: &Response<_>, latency: std::time::Duration, span: &Span| {
                    span.record("status", response.status().as_u16());
                    span.record("latency_ms", u64::try_from(latency.as_millis()).unwrap_or(u64::MAX));
                    DefaultOnResponse::default().on_response(response, latency, span);
                }),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    Ok(router)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies the session database before returning OK.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
