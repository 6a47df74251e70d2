//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, capture errors)
//! 2. `TraceLayer` (request span)
//! 3. Request ID
//! 4. Security headers (CSP built from the nonce)
//! 5. CSP nonce
//! 6. Session layer (tower-sessions with `PostgreSQL` store)
//! 7. Session expiry (clears credentials the backend rejected)
//!
//! Rate limiters wrap individual route groups.

pub mod auth;
pub mod csp;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    OptionalUser, RequireAdmin, RequireUser, clear_session_user, expire_session_middleware,
    set_session_user,
};
pub use csp::{CspNonce, csp_nonce_middleware};
pub use rate_limit::{RateLimitConfigError, action_rate_limiter, auth_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::{create_session_layer, create_session_store};
