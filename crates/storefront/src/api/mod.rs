//! Client for the shop backend REST API.
//!
//! # Architecture
//!
//! - JSON over HTTP with `reqwest`; bearer token per call, taken from the
//!   visitor's session
//! - The backend is the source of truth; the storefront keeps no copy beyond
//!   a short-lived `moka` cache of catalog reads
//! - Endpoints are grouped by domain in submodules, each adding an
//!   `impl ApiClient` block
//!
//! # Example
//!
//! ```rust,ignore
//! let client = ApiClient::new(&config.backend)?;
//! let page = client.products(&query, 12).await?;
//! let orders = client.my_orders(&token).await?;
//! ```

mod addresses;
mod auth;
mod catalog;
mod notifications;
mod orders;
mod reviews;
pub mod types;
mod users;

use std::borrow::Cow;
use std::sync::Arc;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::config::BackendConfig;
use crate::models::BearerToken;

use catalog::{CacheKey, CacheValue};

/// Errors from backend calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure (connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not match the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Token missing, expired or revoked.
    #[error("Unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Any other non-success status, with the backend's message.
    #[error("Backend returned {status}: {message}")]
    Api { status: u16, message: String },
}

impl ApiError {
    /// Whether the failure is the shopper's to fix (bad input, conflict),
    /// as opposed to a backend or transport fault.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Api { status, .. } if *status >= 400 && *status < 500)
    }
}

/// Error body returned by the backend.
#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Encode a caller-supplied id as exactly one path segment.
///
/// Ids arrive percent-decoded from route paths, so `?`, `/` and `#` are
/// escaped and dot segments are refused.
fn segment(id: &str) -> Result<Cow<'_, str>, ApiError> {
    if id.is_empty() || id == "." || id == ".." {
        return Err(ApiError::NotFound(format!("No such resource: {id:?}")));
    }
    Ok(urlencoding::encode(id))
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the shop backend.
///
/// Cheap to clone; all clones share the connection pool and the catalog cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: String,
    cache: Cache<CacheKey, CacheValue>,
}

impl ApiClient {
    /// Create a client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built (TLS backend
    /// initialisation).
    pub fn new(config: &BackendConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("shopfront-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_url.as_str().trim_end_matches('/').to_string(),
                cache: catalog::build_cache(),
            }),
        })
    }

    fn cache(&self) -> &Cache<CacheKey, CacheValue> {
        &self.inner.cache
    }

    fn request(&self, method: Method, path: &str, token: Option<&BearerToken>) -> RequestBuilder {
        let url = format!("{}{path}", self.inner.base_url);
        let builder = self.inner.client.request(method, url);
        match token {
            Some(token) => builder.bearer_auth(token.expose()),
            None => builder,
        }
    }

    /// Send a request and decode a JSON body.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let text = self.send_raw(request).await?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %text.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            ApiError::Parse(e)
        })
    }

    /// Send a request and return the body text after status checks.
    async fn send_raw(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        debug!(status = %status, url = %response.url(), "Backend response");

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        let text = response.text().await?;
        if status.is_success() {
            return Ok(text);
        }

        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());

        match status {
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            StatusCode::NOT_FOUND => Err(ApiError::NotFound(message)),
            _ => {
                if status.is_server_error() {
                    tracing::error!(
                        status = %status,
                        body = %text.chars().take(500).collect::<String>(),
                        "Backend returned server error"
                    );
                }
                Err(ApiError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&BearerToken>,
    ) -> Result<T, ApiError> {
        self.send(self.request(Method::GET, path, token)).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&BearerToken>,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(self.request(Method::POST, path, token).json(body)).await
    }

    async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        token: &BearerToken,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(self.request(Method::PUT, path, Some(token)).json(body))
            .await
    }

    /// `PUT` without a body whose response is not needed.
    async fn put_empty(&self, path: &str, token: &BearerToken) -> Result<(), ApiError> {
        self.send_raw(self.request(Method::PUT, path, Some(token)))
            .await
            .map(drop)
    }

    async fn delete(&self, path: &str, token: &BearerToken) -> Result<(), ApiError> {
        self.send_raw(self.request(Method::DELETE, path, Some(token)))
            .await
            .map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(
            ApiError::Api {
                status: 400,
                message: "Invalid promo".to_string()
            }
            .is_client_error()
        );
        assert!(
            !ApiError::Api {
                status: 502,
                message: "Bad gateway".to_string()
            }
            .is_client_error()
        );
        assert!(!ApiError::Unauthorized.is_client_error());
    }

    #[test]
    fn test_segment_escapes_reserved_characters() {
        assert_eq!(segment("665f1c2ab9").ok().as_deref(), Some("665f1c2ab9"));
        assert_eq!(
            segment("read-all?/read").ok().as_deref(),
            Some("read-all%3F%2Fread")
        );
        assert_eq!(segment("a#b c").ok().as_deref(), Some("a%23b%20c"));
    }

    #[test]
    fn test_segment_refuses_dot_segments() {
        for id in ["", ".", ".."] {
            assert!(matches!(segment(id), Err(ApiError::NotFound(_))), "{id:?}");
        }
    }
}
