//! Request ID middleware for tracing and Sentry correlation.
//!
//! An `x-request-id` from an upstream proxy is reused; otherwise a UUID v4
//! is generated. The id is recorded on the current span, tagged on the
//! Sentry scope and echoed in the response.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream id accepted as-is.
const MAX_UPSTREAM_ID_LEN: usize = 128;

fn request_id_for(upstream: Option<&str>) -> String {
    upstream
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_UPSTREAM_ID_LEN)
        .map_or_else(|| Uuid::new_v4().to_string(), String::from)
}

/// Middleware that ensures every request has a unique request ID.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = request_id_for(
        request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|h| h.to_str().ok()),
    );

    Span::current().record("request_id", &request_id);
    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_id_is_reused() {
        assert_eq!(request_id_for(Some("cf-ray-123")), "cf-ray-123");
    }

    #[test]
    fn test_missing_or_oversized_id_is_replaced() {
        let generated = request_id_for(None);
        assert!(Uuid::parse_str(&generated).is_ok());

        let huge = "x".repeat(MAX_UPSTREAM_ID_LEN + 1);
        assert_ne!(request_id_for(Some(&huge)), huge);
        assert_ne!(request_id_for(Some("   ")), "   ");
    }
}
