//! Session-related types.
//!
//! Everything the browser would otherwise keep in local storage lives in the
//! visitor's session: who is logged in, their backend token, the wishlist,
//! recently viewed products, the cart and the checkout draft.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shopfront_core::{Email, UserId, UserRole};
use tower_sessions::Session;

use crate::api::types::User;

/// Session-stored user identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub role: UserRole,
}

impl CurrentUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// First name for greetings.
    #[must_use]
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

impl TryFrom<User> for CurrentUser {
    type Error = shopfront_core::EmailError;

    fn try_from(user: User) -> Result<Self, Self::Error> {
        Ok(Self {
            id: user.id,
            name: user.name,
            email: Email::parse(&user.email)?,
            role: user.role,
        })
    }
}

/// Backend bearer token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BearerToken(String);

impl BearerToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token for the `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}

/// Session keys.
pub mod keys {
    /// Logged-in user (`CurrentUser`).
    pub const USER: &str = "user";

    /// Backend bearer token (`BearerToken`).
    pub const TOKEN: &str = "token";

    /// Wishlist (`Wishlist`).
    pub const WISHLIST: &str = "wishlist";

    /// Recently viewed products (`RecentlyViewed`).
    pub const RECENTLY_VIEWED: &str = "recentlyViewed";

    /// Cart (`Cart`).
    pub const CART: &str = "cart";

    /// Checkout wizard state (`CheckoutDraft`).
    pub const CHECKOUT: &str = "checkout";

    /// One-shot toast shown on the next page render.
    pub const FLASH: &str = "flash";
}

/// Read a session value, treating missing or undecodable values as the default.
pub async fn load_or_default<T>(session: &Session, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match session.get::<T>(key).await {
        Ok(value) => value.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(key, error = %e, "Discarding unreadable session value");
            T::default()
        }
    }
}

/// Read an optional session value; undecodable values count as absent.
pub async fn load<T: DeserializeOwned>(session: &Session, key: &str) -> Option<T> {
    session.get::<T>(key).await.ok().flatten()
}

/// Write a session value.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn store<T: Serialize + Sync>(
    session: &Session,
    key: &str,
    value: &T,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(key, value).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_debug_is_redacted() {
        let token = BearerToken::new("eyJhbGciOi.secret");
        assert_eq!(format!("{token:?}"), "BearerToken([REDACTED])");
        assert_eq!(token.expose(), "eyJhbGciOi.secret");
    }

    #[test]
    fn test_current_user_from_backend_user() {
        let user = User {
            id: UserId::new("u1"),
            name: "Grace Brewster Hopper".to_string(),
            email: " Grace@Example.com ".to_string(),
            phone: None,
            role: UserRole::Admin,
        };
        let current = CurrentUser::try_from(user).ok();
        let current = current.as_ref();
        assert_eq!(current.map(CurrentUser::first_name), Some("Grace"));
        assert_eq!(current.map(|u| u.email.as_str()), Some("grace@example.com"));
        assert_eq!(current.map(CurrentUser::is_admin), Some(true));
    }
}
