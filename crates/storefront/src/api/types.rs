//! Request and response bodies specific to the REST API.
//!
//! Domain entities (products, orders, reviews, ...) live in `shopfront_core`;
//! this module only holds the envelopes around them.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use shopfront_core::{UserId, UserRole};

/// A backend user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", alias = "id")]
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: UserRole,
}

/// Response of `/auth/login` and `/auth/register`.
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

fn expose<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Body of `/auth/login`.
#[derive(Debug, Serialize)]
pub struct Credentials {
    pub email: String,
    #[serde(serialize_with = "expose")]
    pub password: SecretString,
}

/// Body of `/auth/register`.
#[derive(Debug, Serialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    #[serde(serialize_with = "expose")]
    pub password: SecretString,
}

/// Body of `PUT /users/profile`.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileUpdate {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Body of `PUT /users/password`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    #[serde(serialize_with = "expose")]
    pub current_password: SecretString,
    #[serde(serialize_with = "expose")]
    pub new_password: SecretString,
}

/// Response of `/notifications/unread-count`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct UnreadCount {
    pub count: usize,
}

/// Generic `{message}` acknowledgement.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}
