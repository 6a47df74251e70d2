//! Account profile and password.

use tracing::instrument;

use super::types::{MessageResponse, PasswordChange, ProfileUpdate, User};
use super::{ApiClient, ApiError};
use crate::models::BearerToken;

impl ApiClient {
    /// The signed-in user's profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip_all)]
    pub async fn profile(&self, token: &BearerToken) -> Result<User, ApiError> {
        self.get("/users/profile", Some(token)).await
    }

    /// Update name, email and phone.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or the backend rejects the
    /// input.
    #[instrument(skip_all)]
    pub async fn update_profile(
        &self,
        token: &BearerToken,
        update: &ProfileUpdate,
    ) -> Result<User, ApiError> {
        self.put("/users/profile", token, update).await
    }

    /// Change the password.
    ///
    /// # Errors
    ///
    /// Returns an error if the current password is wrong or the request fails.
    #[instrument(skip_all)]
    pub async fn change_password(
        &self,
        token: &BearerToken,
        change: &PasswordChange,
    ) -> Result<MessageResponse, ApiError> {
        self.put("/users/password", token, change).await
    }
}
