//! Product reviews.

use shopfront_core::review::{Review, ReviewInput};
use shopfront_core::{ProductId, ReviewId};
use tracing::instrument;

use super::{ApiClient, ApiError, segment};
use crate::models::BearerToken;

impl ApiClient {
    /// Approved reviews of a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn product_reviews(&self, id: &ProductId) -> Result<Vec<Review>, ApiError> {
        let path = format!("/reviews/product/{}", segment(id.as_str())?);
        self.get(&path, None).await
    }

    /// Reviews written by the signed-in user, any status.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip_all)]
    pub async fn my_reviews(&self, token: &BearerToken) -> Result<Vec<Review>, ApiError> {
        self.get("/reviews/my", Some(token)).await
    }

    /// Submit a review; it starts out pending moderation.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the review.
    #[instrument(skip_all, fields(product_id = %input.product))]
    pub async fn create_review(
        &self,
        token: &BearerToken,
        input: &ReviewInput,
    ) -> Result<Review, ApiError> {
        self.post("/reviews", Some(token), input).await
    }

    /// Edit a review.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the change.
    #[instrument(skip(self, token, input), fields(review_id = %id))]
    pub async fn update_review(
        &self,
        token: &BearerToken,
        id: &ReviewId,
        input: &ReviewInput,
    ) -> Result<Review, ApiError> {
        let path = format!("/reviews/{}", segment(id.as_str())?);
        self.put(&path, token, input).await
    }

    /// Delete a review.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token), fields(review_id = %id))]
    pub async fn delete_review(&self, token: &BearerToken, id: &ReviewId) -> Result<(), ApiError> {
        let path = format!("/reviews/{}", segment(id.as_str())?);
        self.delete(&path, token).await
    }
}
