//! Rate limiting with governor and `tower_governor`.
//!
//! - `auth_rate_limiter`: login and registration (~10/min per IP)
//! - `action_rate_limiter`: cart, checkout and other state-changing posts
//!   (~100/min per IP)

use std::net::IpAddr;
use std::sync::Arc;

use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use thiserror::Error;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

// =============================================================================
// Client IP extraction
// =============================================================================

/// Headers consulted for the client address, in order of trust.
const CLIENT_IP_HEADERS: [&str; 3] = ["cf-connecting-ip", "x-real-ip", "fly-client-ip"];

/// Key extractor that reads the client IP from proxy headers.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

fn parse_ip(value: Option<&str>) -> Option<IpAddr> {
    value.and_then(|s| s.trim().parse::<IpAddr>().ok())
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let headers = req.headers();
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

        let from_proxy = CLIENT_IP_HEADERS
            .iter()
            .find_map(|name| parse_ip(header(name)))
            .or_else(|| parse_ip(header("x-forwarded-for").and_then(|s| s.split(',').next())));

        from_proxy
            .or_else(|| {
                req.extensions()
                    .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
                    .map(|info| info.0.ip())
            })
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

// =============================================================================
// Limiter configuration
// =============================================================================

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// A limiter was configured with a zero period or burst.
#[derive(Debug, Error)]
#[error("invalid rate limiter configuration: replenish every {period_secs}s, burst {burst}")]
pub struct RateLimitConfigError {
    period_secs: u64,
    burst: u32,
}

fn limiter(period_secs: u64, burst: u32) -> Result<RateLimiterLayer, RateLimitConfigError> {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(period_secs)
        .burst_size(burst)
        .finish()
        .ok_or(RateLimitConfigError { period_secs, burst })?;
    Ok(GovernorLayer::new(Arc::new(config)))
}

/// Login and registration: one token every 6 seconds, burst of 5.
///
/// # Errors
///
/// Never in practice; the constants are non-zero.
pub fn auth_rate_limiter() -> Result<RateLimiterLayer, RateLimitConfigError> {
    limiter(6, 5)
}

/// State-changing storefront actions: one token per second, burst of 50.
///
/// # Errors
///
/// Never in practice; the constants are non-zero.
pub fn action_rate_limiter() -> Result<RateLimiterLayer, RateLimitConfigError> {
    limiter(1, 50)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tower_governor::key_extractor::KeyExtractor;

    fn request(headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder().uri("/auth/login");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn test_cloudflare_header_wins() {
        let req = request(&[
            ("cf-connecting-ip", "203.0.113.7"),
            ("x-forwarded-for", "198.51.100.1, 10.0.0.1"),
        ]);
        let ip = ClientIpKeyExtractor.extract(&req).unwrap();
        assert_eq!(ip.to_string(), "203.0.113.7");
    }

    #[test]
    fn test_forwarded_for_first_hop() {
        let req = request(&[("x-forwarded-for", "198.51.100.1, 10.0.0.1")]);
        let ip = ClientIpKeyExtractor.extract(&req).unwrap();
        assert_eq!(ip.to_string(), "198.51.100.1");
    }

    #[test]
    fn test_no_address_is_rejected() {
        let req = request(&[("x-real-ip", "not-an-ip")]);
        assert!(ClientIpKeyExtractor.extract(&req).is_err());
    }

    #[test]
    fn test_limiters_build() {
        assert!(auth_rate_limiter().is_ok());
        assert!(action_rate_limiter().is_ok());
    }
}
