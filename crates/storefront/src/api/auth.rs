//! Login and registration.

use tracing::instrument;

use super::types::{AuthResponse, Credentials, Registration};
use super::{ApiClient, ApiError};

impl ApiClient {
    /// Exchange credentials for a token.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` (or the backend's 400) for bad
    /// credentials.
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        self.post("/auth/login", None, credentials).await
    }

    /// Create an account and sign in.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Api` with the backend's message when the email is
    /// taken or the input is rejected.
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: &Registration) -> Result<AuthResponse, ApiError> {
        self.post("/auth/register", None, registration).await
    }
}
