//! Address book.

use shopfront_core::AddressId;
use shopfront_core::address::{Address, AddressInput};
use tracing::instrument;

use super::{ApiClient, ApiError, segment};
use crate::models::BearerToken;

impl ApiClient {
    /// Saved addresses.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip_all)]
    pub async fn addresses(&self, token: &BearerToken) -> Result<Vec<Address>, ApiError> {
        self.get("/addresses", Some(token)).await
    }

    /// Save a new address.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the address.
    #[instrument(skip_all)]
    pub async fn create_address(
        &self,
        token: &BearerToken,
        input: &AddressInput,
    ) -> Result<Address, ApiError> {
        self.post("/addresses", Some(token), input).await
    }

    /// Replace an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the address.
    #[instrument(skip(self, token, input), fields(address_id = %id))]
    pub async fn update_address(
        &self,
        token: &BearerToken,
        id: &AddressId,
        input: &AddressInput,
    ) -> Result<Address, ApiError> {
        let path = format!("/addresses/{}", segment(id.as_str())?);
        self.put(&path, token, input).await
    }

    /// Delete an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token), fields(address_id = %id))]
    pub async fn delete_address(&self, token: &BearerToken, id: &AddressId) -> Result<(), ApiError> {
        let path = format!("/addresses/{}", segment(id.as_str())?);
        self.delete(&path, token).await
    }

    /// Make an address the default. The backend clears the flag on the others.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token), fields(address_id = %id))]
    pub async fn set_default_address(
        &self,
        token: &BearerToken,
        id: &AddressId,
    ) -> Result<(), ApiError> {
        let path = format!("/addresses/{}/default", segment(id.as_str())?);
        self.put_empty(&path, token).await
    }
}
