//! Authentication extractors and session-expiry middleware.
//!
//! The logged-in user and their backend token both live in the session.
//! Handlers that call the backend on the shopper's behalf take
//! [`RequireUser`], which hands them both.

use axum::{
    extract::{FromRequestParts, Request},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::error::{SessionExpired, clear_sentry_user, set_sentry_user};
use crate::models::session::{load, store};
use crate::models::{BearerToken, CurrentUser, session_keys};

/// Extractor that requires a logged-in user.
///
/// HTML requests without a user are redirected to the login page; HTMX and
/// event-stream requests get a bare 401 since a redirect would be swapped
/// into the page.
///
/// # Example
///
/// ```rust,ignore
/// async fn orders(RequireUser(user, token): RequireUser) -> impl IntoResponse {
///     format!("Hello, {}!", user.first_name())
/// }
/// ```
pub struct RequireUser(pub CurrentUser, pub BearerToken);

/// Extractor that requires a logged-in admin.
pub struct RequireAdmin(pub CurrentUser, pub BearerToken);

/// Error returned when authentication is required but missing.
#[derive(Debug)]
pub enum AuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin,
    /// Unauthorized response (for HTMX and stream requests).
    Unauthorized,
    /// Logged in, but not an admin.
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/auth/login").into_response(),
            Self::Unauthorized => {
                (StatusCode::UNAUTHORIZED, [("hx-redirect", "/auth/login")]).into_response()
            }
            Self::Forbidden => (StatusCode::FORBIDDEN, "Admins only").into_response(),
        }
    }
}

/// Whether the request expects a fragment or a stream rather than a page.
fn wants_fragment(parts: &Parts) -> bool {
    parts.headers.contains_key("hx-request")
        || parts.uri.path().ends_with("/stream")
        || parts
            .headers
            .get("accept")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|accept| accept.contains("text/event-stream"))
}

async fn session_user(parts: &Parts) -> Option<(CurrentUser, BearerToken)> {
    let session = parts.extensions.get::<Session>()?;
    let user = load::<CurrentUser>(session, session_keys::USER).await?;
    let token = load::<BearerToken>(session, session_keys::TOKEN).await?;
    Some((user, token))
}

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let (user, token) = session_user(parts).await.ok_or_else(|| {
            if wants_fragment(parts) {
                AuthRejection::Unauthorized
            } else {
                AuthRejection::RedirectToLogin
            }
        })?;

        set_sentry_user(&user.id, Some(user.email.as_str()));
        tracing::Span::current().record("user_id", user.id.as_str());

        Ok(Self(user, token))
    }
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireUser(user, token) = RequireUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "Non-admin hit admin route");
            return Err(AuthRejection::Forbidden);
        }
        Ok(Self(user, token))
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireUser`, this does not reject the request if nobody is
/// logged in.
pub struct OptionalUser(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<Session>() {
            Some(session) => load::<CurrentUser>(session, session_keys::USER).await,
            None => None,
        };

        Ok(Self(user))
    }
}

/// Store the user and token after login or registration.
///
/// The session id is cycled first so a pre-login id cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_session_user(
    session: &Session,
    user: &CurrentUser,
    token: &BearerToken,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    store(session, session_keys::USER, user).await?;
    store(session, session_keys::TOKEN, token).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}

/// Forget the user and token (logout, expired token).
///
/// Cart, wishlist and recently viewed survive so a shopper who signs back in
/// finds them where they left them. The checkout draft does not.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_session_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove_value(session_keys::USER).await?;
    session.remove_value(session_keys::TOKEN).await?;
    session.remove_value(session_keys::CHECKOUT).await?;
    clear_sentry_user();
    Ok(())
}

/// Clear the session's credentials when a handler saw the backend reject
/// the token.
///
/// Must run inside the session layer.
pub async fn expire_session_middleware(request: Request, next: Next) -> Response {
    let session = request.extensions().get::<Session>().cloned();
    let response = next.run(request).await;

    if response.extensions().get::<SessionExpired>().is_some()
        && let Some(session) = session
    {
        tracing::info!("Backend rejected token, clearing session user");
        if let Err(e) = clear_session_user(&session).await {
            tracing::error!(error = %e, "Failed to clear expired session");
        }
    }

    response
}
