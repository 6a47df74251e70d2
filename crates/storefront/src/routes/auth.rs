//! Authentication route handlers.
//!
//! Login and registration exchange credentials with the backend for a bearer
//! token, which is kept in the session next to the user. Failures redirect
//! back to the form with an `?error=` code.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use secrecy::SecretString;
use serde::Deserialize;
use shopfront_core::Email;
use shopfront_core::validation::ValidationError;
use tower_sessions::Session;
use tracing::instrument;

use super::shell::Shell;
use crate::api::ApiError;
use crate::api::types::{AuthResponse, Credentials, Registration};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{clear_session_user, set_session_user};
use crate::models::{BearerToken, CurrentUser};
use crate::state::AppState;
use crate::toast::{Toast, flash};

/// Shortest accepted password.
pub const MIN_PASSWORD_LEN: usize = 8;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// Query parameters for error display.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub shell: Shell,
    pub error: Option<&'static str>,
}

/// Registration page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub shell: Shell,
    pub error: Option<&'static str>,
}

/// Message for an `?error=` code.
fn error_message(code: &str) -> &'static str {
    match code {
        "credentials" => "Invalid email or password.",
        "password_mismatch" => "Passwords do not match.",
        "password_too_short" => "Password must be at least 8 characters.",
        "email" => "Please enter a valid email address.",
        "name" => "Please enter your name.",
        "email_taken" => "An account with this email already exists.",
        "session" => "We couldn't sign you in. Please try again.",
        _ => "Something went wrong. Please try again.",
    }
}

/// Check a new password and its confirmation.
///
/// # Errors
///
/// Returns a [`ValidationError`] when the password is too short or the two
/// entries differ.
pub fn validate_new_password(password: &str, confirm: &str) -> std::result::Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::new(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    if password != confirm {
        return Err(ValidationError::new("password_confirm", "Passwords do not match"));
    }
    Ok(())
}

/// Store the backend's answer in the session.
async fn sign_in(session: &Session, auth: AuthResponse) -> Result<CurrentUser> {
    let user = CurrentUser::try_from(auth.user)
        .map_err(|e| AppError::Internal(format!("backend returned invalid email: {e}")))?;
    set_session_user(session, &user, &BearerToken::new(auth.token)).await?;
    Ok(user)
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(shell: Shell, Query(query): Query<MessageQuery>) -> impl IntoResponse {
    LoginTemplate {
        shell,
        error: query.error.as_deref().map(error_message),
    }
}

/// Handle login form submission.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let credentials = Credentials {
        email: form.email.trim().to_lowercase(),
        password: SecretString::from(form.password),
    };

    let auth = match state.api().login(&credentials).await {
        Ok(auth) => auth,
        Err(ApiError::Unauthorized | ApiError::NotFound(_)) => {
            return Ok(Redirect::to("/auth/login?error=credentials").into_response());
        }
        Err(e) if e.is_client_error() => {
            tracing::info!(error = %e, "Login rejected");
            return Ok(Redirect::to("/auth/login?error=credentials").into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let user = sign_in(&session, auth).await?;
    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");
    add_breadcrumb("auth", "Logged in", None);

    flash(&session, &Toast::success(format!("Welcome back, {}!", user.first_name()))).await;
    Ok(Redirect::to("/dashboard").into_response())
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(shell: Shell, Query(query): Query<MessageQuery>) -> impl IntoResponse {
    RegisterTemplate {
        shell,
        error: query.error.as_deref().map(error_message),
    }
}

/// Handle registration form submission. New accounts are signed in at once.
#[instrument(skip(state, session, form))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    let name = form.name.trim().to_string();
    if name.is_empty() {
        return Ok(Redirect::to("/auth/register?error=name").into_response());
    }
    let Ok(email) = Email::parse(&form.email) else {
        return Ok(Redirect::to("/auth/register?error=email").into_response());
    };
    if let Err(e) = validate_new_password(&form.password, &form.password_confirm) {
        let code = if e.field == "password" {
            "password_too_short"
        } else {
            "password_mismatch"
        };
        return Ok(Redirect::to(&format!("/auth/register?error={code}")).into_response());
    }

    let registration = Registration {
        name,
        email: email.into_inner(),
        password: SecretString::from(form.password),
    };

    let auth = match state.api().register(&registration).await {
        Ok(auth) => auth,
        Err(ApiError::Api { status: 400 | 409, message })
            if message.contains("exists") || message.contains("taken") =>
        {
            return Ok(Redirect::to("/auth/register?error=email_taken").into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let user = sign_in(&session, auth).await?;
    tracing::info!(user_id = %user.id, "User registered");
    add_breadcrumb("auth", "Registered", None);

    flash(&session, &Toast::success(format!("Welcome, {}!", user.first_name()))).await;
    Ok(Redirect::to("/dashboard").into_response())
}

// =============================================================================
// Logout Route
// =============================================================================

/// Handle logout.
///
/// Forgets the user and token; the cart and local lists stay.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Response {
    if let Err(e) = clear_session_user(&session).await {
        tracing::error!(error = %e, "Failed to clear session");
    }
    flash(&session, &Toast::info("You have been signed out")).await;
    Redirect::to("/products").into_response()
}
