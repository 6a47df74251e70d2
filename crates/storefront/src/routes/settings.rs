//! Account settings route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{Form, extract::State, response::Redirect};
use secrecy::SecretString;
use serde::Deserialize;
use shopfront_core::Email;
use shopfront_core::validation::{ValidationError, non_blank, require};
use tower_sessions::Session;
use tracing::instrument;

use super::auth::validate_new_password;
use super::shell::Shell;
use crate::api::types::{PasswordChange, ProfileUpdate};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireUser;
use crate::models::session::store;
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;
use crate::toast::{Toast, flash};

/// Profile form data.
#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl ProfileForm {
    fn validate(self) -> std::result::Result<ProfileUpdate, ValidationError> {
        require("name", "Name", &self.name)?;
        let email = Email::parse(&self.email)
            .map_err(|e| ValidationError::new("email", format!("Invalid email: {e}")))?;
        Ok(ProfileUpdate {
            name: self.name.trim().to_string(),
            email: email.into_inner(),
            phone: non_blank(self.phone.as_deref()),
        })
    }
}

/// Password form data.
#[derive(Debug, Deserialize)]
pub struct PasswordForm {
    pub current_password: String,
    pub new_password: String,
    pub password_confirm: String,
}

/// Settings page template.
#[derive(Template, WebTemplate)]
#[template(path = "settings/show.html")]
pub struct SettingsTemplate {
    pub shell: Shell,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: String,
}

/// Display the settings page.
#[instrument(skip(state, shell, token))]
pub async fn show(
    State(state): State<AppState>,
    shell: Shell,
    RequireUser(_user, token): RequireUser,
) -> Result<SettingsTemplate> {
    let profile = state.api().profile(&token).await?;
    Ok(SettingsTemplate {
        shell,
        name: profile.name,
        email: profile.email,
        phone: profile.phone.unwrap_or_default(),
        role: profile.role.to_string(),
    })
}

/// Update name, email and phone. The session user is refreshed so the
/// greeting changes at once.
#[instrument(skip(state, session, token, form))]
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    RequireUser(_user, token): RequireUser,
    Form(form): Form<ProfileForm>,
) -> Result<Redirect> {
    let update = form.validate()?;
    let updated = state.api().update_profile(&token, &update).await?;

    let user = CurrentUser::try_from(updated)
        .map_err(|e| AppError::Internal(format!("backend returned invalid email: {e}")))?;
    store(&session, session_keys::USER, &user).await?;

    flash(&session, &Toast::success("Profile updated")).await;
    Ok(Redirect::to("/settings"))
}

/// Change the password.
#[instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    session: Session,
    RequireUser(_user, token): RequireUser,
    Form(form): Form<PasswordForm>,
) -> Result<Redirect> {
    validate_new_password(&form.new_password, &form.password_confirm)?;
    if form.current_password.is_empty() {
        return Err(ValidationError::new("current_password", "Enter your current password").into());
    }

    let change = PasswordChange {
        current_password: SecretString::from(form.current_password),
        new_password: SecretString::from(form.new_password),
    };
    state.api().change_password(&token, &change).await?;

    flash(&session, &Toast::success("Password changed")).await;
    Ok(Redirect::to("/settings"))
}
