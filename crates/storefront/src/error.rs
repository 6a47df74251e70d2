//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Server-side faults are
//! captured to Sentry; everything the shopper can act on becomes an error
//! toast via the `HX-Trigger` header. Internals never reach the client.

use axum::{
    http::{HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
};
use shopfront_core::cart::CartError;
use shopfront_core::checkout::CheckoutError;
use shopfront_core::pricing::PromoError;
use shopfront_core::validation::ValidationError;
use thiserror::Error;

use crate::api::ApiError;
use crate::toast::Toast;

/// Response extension set when the backend rejected the session's token.
///
/// `expire_session_middleware` sees it on the way out and clears the user
/// and token from the session.
#[derive(Debug, Clone, Copy)]
pub struct SessionExpired;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Backend call failed.
    #[error("Backend error: {0}")]
    Api(#[from] ApiError),

    /// Session store failure.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Form input rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Cart operation rejected.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Checkout step rejected.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// Promo code rejected.
    #[error(transparent)]
    Promo(#[from] PromoError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Admin-only action attempted by a customer.
    #[error("Forbidden")]
    Forbidden,

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    const fn is_server_error(&self) -> bool {
        match self {
            Self::Session(_) | Self::Internal(_) => true,
            Self::Api(err) => matches!(
                err,
                ApiError::Http(_) | ApiError::Parse(_) | ApiError::Api { status: 500.., .. }
            ),
            _ => false,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Api(err) => match err {
                ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
                ApiError::NotFound(_) => StatusCode::NOT_FOUND,
                ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
                ApiError::Api { status, .. } if (400..500).contains(status) => {
                    StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST)
                }
                ApiError::Http(_) | ApiError::Parse(_) | ApiError::Api { .. } => {
                    StatusCode::BAD_GATEWAY
                }
            },
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Cart(CartError::UnknownItem) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Cart(_) | Self::Checkout(_) | Self::Promo(_) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    /// Shopper-facing message.
    fn public_message(&self) -> String {
        match self {
            Self::Session(_) | Self::Internal(_) => {
                "Something went wrong on our side. Please try again.".to_string()
            }
            Self::Api(err) => match err {
                ApiError::Unauthorized => "Your session has expired. Please sign in again.".to_string(),
                ApiError::NotFound(_) => "We couldn't find what you were looking for.".to_string(),
                ApiError::RateLimited(secs) => {
                    format!("Too many requests. Please wait {secs}s and try again.")
                }
                ApiError::Api { status, message } if (400..500).contains(status) => message.clone(),
                ApiError::Http(_) | ApiError::Parse(_) | ApiError::Api { .. } => {
                    "The shop is temporarily unavailable. Please try again.".to_string()
                }
            },
            Self::Validation(err) => err.message.clone(),
            Self::Cart(err) => err.to_string(),
            Self::Checkout(err) => match err {
                CheckoutError::Invalid(v) => v.message.clone(),
                other => capitalize(&other.to_string()),
            },
            Self::Promo(err) => capitalize(&err.to_string()),
            Self::NotFound(what) => format!("{what} not found"),
            Self::Forbidden => "You don't have access to that.".to_string(),
            Self::BadRequest(msg) => msg.clone(),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let status = self.status();
        let message = self.public_message();
        let toast = Toast::error(message.clone());

        if matches!(self, Self::Api(ApiError::Unauthorized)) {
            let mut response = (
                status,
                toast,
                [("hx-redirect", HeaderValue::from_static("/auth/login"))],
                Html(
                    "<!doctype html><meta http-equiv=\"refresh\" content=\"0;url=/auth/login\">\
                     <a href=\"/auth/login\">Sign in</a>",
                ),
            )
                .into_response();
            response.extensions_mut().insert(SessionExpired);
            return response;
        }

        (status, toast, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for shopper actions.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "65f0aa")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::toast::HX_TRIGGER;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(get_status(AppError::NotFound("Order".to_string())), StatusCode::NOT_FOUND);
        assert_eq!(get_status(AppError::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(
            get_status(AppError::Validation(ValidationError::new("city", "City is required"))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(get_status(AppError::Cart(CartError::ZeroQuantity)), StatusCode::BAD_REQUEST);
        assert_eq!(
            get_status(AppError::Api(ApiError::RateLimited(3))),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Api(ApiError::Api {
                status: 409,
                message: "Out of stock".to_string()
            })),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Api(ApiError::Api {
                status: 503,
                message: "db down".to_string()
            })),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_error_toast_hides_internals() {
        let response = AppError::Internal("pool exhausted".to_string()).into_response();
        let header = response.headers().get(HX_TRIGGER).unwrap().to_str().unwrap();
        assert!(header.contains("showToast"));
        assert!(!header.contains("pool exhausted"));
    }

    #[test]
    fn test_backend_message_is_shown_for_client_errors() {
        let err = AppError::Api(ApiError::Api {
            status: 400,
            message: "Product is out of stock".to_string(),
        });
        assert_eq!(err.public_message(), "Product is out of stock");
    }

    #[test]
    fn test_unauthorized_marks_session_expired() {
        let response = AppError::Api(ApiError::Unauthorized).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.extensions().get::<SessionExpired>().is_some());
        assert_eq!(response.headers().get("hx-redirect").unwrap(), "/auth/login");
    }

    #[test]
    fn test_checkout_message_is_capitalized() {
        let err = AppError::Checkout(CheckoutError::EmptyCart);
        assert_eq!(err.public_message(), "Your cart is empty");
    }
}
