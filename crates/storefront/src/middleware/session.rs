//! Session layer: `PostgreSQL`-backed sessions via tower-sessions.
//!
//! The session is the storefront's stand-in for browser local storage, so it
//! outlives logins: see `models::session::keys` for what it holds.

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha512};
use sqlx::PgPool;
use tower_sessions::cookie::{Key, SameSite, time::Duration};
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "shopfront_session";

/// Inactivity window before a session is dropped (30 days).
const SESSION_INACTIVITY_DAYS: i64 = 30;

/// Create the session store. Call `migrate()` on it before serving.
#[must_use]
pub fn create_session_store(pool: &PgPool) -> PostgresStore {
    PostgresStore::new(pool.clone())
}

/// Cookie signing key derived from the session secret.
#[must_use]
pub fn session_key(secret: &SecretString) -> Key {
    let digest = Sha512::digest(secret.expose_secret().as_bytes());
    Key::from(digest.as_slice())
}

/// Create the session layer around `store`. The session id cookie is signed.
#[must_use]
pub fn create_session_layer<S: SessionStore>(
    store: S,
    config: &StorefrontConfig,
) -> SessionManagerLayer<S, SignedCookie> {
    let is_secure = config.base_url.starts_with("https://");

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(Duration::days(SESSION_INACTIVITY_DAYS)))
        .with_secure(is_secure)
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(session_key(&config.session_secret))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_follows_the_secret() {
        let secret = SecretString::from("kP9$wQ2!zR7@mT4#vX8&nB1*cD5^fG3%");
        let other = SecretString::from("Zq4!rT8@uW2#yE6$iO0%pA3^sD7&fH1*");
        assert_eq!(session_key(&secret).master(), session_key(&secret).master());
        assert_ne!(session_key(&secret).master(), session_key(&other).master());
    }
}
