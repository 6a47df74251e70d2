//! Dashboard shell shared by every full page.
//!
//! [`Shell`] collects what the base layout needs (who is signed in, the cart
//! badge, the pending flash toast, the CSP nonce) so page handlers only add
//! their own data.

use axum::{extract::FromRequestParts, http::request::Parts};
use shopfront_core::cart::Cart;
use tower_sessions::Session;

use crate::middleware::CspNonce;
use crate::models::session::{load, load_or_default};
use crate::models::{CurrentUser, session_keys};
use crate::realtime::Room;
use crate::state::AppState;
use crate::toast::{Toast, take_flash};

/// Base layout context.
#[derive(Debug, Clone, Default)]
pub struct Shell {
    pub user_name: Option<String>,
    pub is_admin: bool,
    pub cart_count: u32,
    pub nonce: String,
    /// `HX-Trigger`-shaped JSON of a flash toast, replayed by app.js.
    pub flash: Option<String>,
    /// Unread-count polling interval, in seconds.
    pub poll_secs: u64,
}

impl Shell {
    #[must_use]
    pub const fn logged_in(&self) -> bool {
        self.user_name.is_some()
    }

    /// Where the bell loads its dropdown from.
    #[must_use]
    pub const fn notifications_href(&self) -> &'static str {
        if self.is_admin {
            "/admin/notifications"
        } else {
            "/notifications"
        }
    }
}

impl FromRequestParts<AppState> for Shell {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let nonce = parts
            .extensions
            .get::<CspNonce>()
            .map(|n| n.value().to_string())
            .unwrap_or_default();
        let poll_secs = state.config().shop.poll_interval.as_secs();

        let Some(session) = parts.extensions.get::<Session>() else {
            return Ok(Self {
                nonce,
                poll_secs,
                ..Self::default()
            });
        };

        let user = load::<CurrentUser>(session, session_keys::USER).await;
        let cart: Cart = load_or_default(session, session_keys::CART).await;
        let flash = take_flash(session).await.as_ref().map(Toast::trigger_json);

        Ok(Self {
            is_admin: user.as_ref().is_some_and(CurrentUser::is_admin),
            user_name: user.map(|u| u.first_name().to_string()),
            cart_count: cart.item_count(),
            nonce,
            flash,
            poll_secs,
        })
    }
}

/// Whether the request was made by HTMX (and wants a fragment back).
#[derive(Debug, Clone, Copy)]
pub struct HxRequest(pub bool);

impl<S> FromRequestParts<S> for HxRequest
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Boosted navigation wants the whole page.
        let htmx = parts.headers.contains_key("hx-request")
            && !parts.headers.contains_key("hx-boosted");
        Ok(Self(htmx))
    }
}

/// The notification room a user's bell follows.
#[must_use]
pub fn room_for(user: &CurrentUser) -> Room {
    if user.is_admin() {
        Room::Admin
    } else {
        Room::Customer(user.id.clone())
    }
}

/// Format a timestamp for listings.
#[must_use]
pub fn short_date(at: &chrono::DateTime<chrono::Utc>) -> String {
    at.format("%b %-d, %Y").to_string()
}

/// A star rating as glyphs, e.g. `★★★★☆`.
#[must_use]
pub fn star_glyphs(filled: u8, empty: u8) -> String {
    "\u{2605}".repeat(usize::from(filled)) + &"\u{2606}".repeat(usize::from(empty))
}
