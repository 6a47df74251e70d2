//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string for the session store
//!   (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `STOREFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `BACKEND_API_URL` - Base URL of the shop REST API (e.g. `https://api.example.com/api`)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `BACKEND_SOCKET_URL` - Socket.IO server (default: origin of `BACKEND_API_URL`)
//! - `BACKEND_TIMEOUT_SECS` - REST request timeout (default: 10)
//! - `CATALOG_PAGE_SIZE` - Products per catalog page (default: 12)
//! - `PROMO_CODES` - Accepted promo codes, `CODE=percent,...` (default: `WELCOME10=10`)
//! - `SHIPPING_FLAT_FEE` - Shipping below the free threshold (default: 5.00)
//! - `SHIPPING_FREE_OVER` - Subtotal for free shipping (default: 50.00)
//! - `NOTIFICATION_POLL_SECS` - Unread-count polling interval (default: 30)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate, 0.0-1.0 (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate, 0.0-1.0 (default: 0.1)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use shopfront_core::Money;
use shopfront_core::pricing::{PromoBook, ShippingPolicy};
use thiserror::Error;
use url::Url;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Shop backend endpoints
    pub backend: BackendConfig,
    /// Catalog, pricing and notification settings
    pub shop: ShopConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Shop backend endpoints.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// REST API base, without trailing slash.
    pub api_url: Url,
    /// Socket.IO server origin.
    pub socket_url: Url,
    /// Per-request timeout for REST calls.
    pub timeout: Duration,
}

/// Catalog, pricing and notification settings.
#[derive(Debug, Clone)]
pub struct ShopConfig {
    pub page_size: u32,
    pub promos: PromoBook,
    pub shipping: ShippingPolicy,
    pub poll_interval: Duration,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            page_size: 12,
            promos: PromoBook::default(),
            shipping: ShippingPolicy::default(),
            poll_interval: Duration::from_secs(30),
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "3000")?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        let session_secret = get_validated_secret("STOREFRONT_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "STOREFRONT_SESSION_SECRET")?;

        let backend = BackendConfig::from_env()?;
        let shop = ShopConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            backend,
            shop,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl BackendConfig {
    /// Build from explicit URLs.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` when a URL does not parse or the
    /// API URL has no host.
    pub fn new(api_url: &str, socket_url: Option<&str>, timeout: Duration) -> Result<Self, ConfigError> {
        let api_url = Url::parse(api_url.trim_end_matches('/'))
            .map_err(|e| ConfigError::InvalidEnvVar("BACKEND_API_URL".to_string(), e.to_string()))?;
        if api_url.host_str().is_none() {
            return Err(ConfigError::InvalidEnvVar(
                "BACKEND_API_URL".to_string(),
                "must include a host".to_string(),
            ));
        }

        let socket_url = match socket_url {
            Some(raw) => Url::parse(raw).map_err(|e| {
                ConfigError::InvalidEnvVar("BACKEND_SOCKET_URL".to_string(), e.to_string())
            })?,
            None => origin_of(&api_url)?,
        };

        Ok(Self {
            api_url,
            socket_url,
            timeout,
        })
    }

    fn from_env() -> Result<Self, ConfigError> {
        let api_url = get_required_env("BACKEND_API_URL")?;
        let socket_url = get_optional_env("BACKEND_SOCKET_URL");
        let timeout = Duration::from_secs(parse_env("BACKEND_TIMEOUT_SECS", "10")?);
        Self::new(&api_url, socket_url.as_deref(), timeout)
    }
}

impl ShopConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let page_size: u32 = parse_env("CATALOG_PAGE_SIZE", "12")?;
        if page_size == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "CATALOG_PAGE_SIZE".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let promos = PromoBook::parse(&get_env_or_default("PROMO_CODES", "WELCOME10=10"))
            .map_err(|e| ConfigError::InvalidEnvVar("PROMO_CODES".to_string(), e.to_string()))?;

        let shipping = ShippingPolicy {
            flat_fee: Money::new(parse_env::<Decimal>("SHIPPING_FLAT_FEE", "5.00")?),
            free_over: Money::new(parse_env::<Decimal>("SHIPPING_FREE_OVER", "50.00")?),
        };

        Ok(Self {
            page_size,
            promos,
            shipping,
            poll_interval: Duration::from_secs(parse_env("NOTIFICATION_POLL_SECS", "30")?),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Scheme, host and port of `url`.
fn origin_of(url: &Url) -> Result<Url, ConfigError> {
    let mut origin = url.clone();
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);
    if origin.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            "BACKEND_API_URL".to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }
    Ok(origin)
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
