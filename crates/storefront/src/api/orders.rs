//! Orders.

use shopfront_core::{OrderId, ProductId};
use shopfront_core::order::{NewOrder, Order};
use tracing::instrument;

use super::{ApiClient, ApiError, segment};
use crate::models::BearerToken;

impl ApiClient {
    /// Place an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the order (stock, totals) or
    /// the request fails.
    #[instrument(skip_all, fields(items = order.items.len(), total = %order.total_price))]
    pub async fn place_order(&self, token: &BearerToken, order: &NewOrder) -> Result<Order, ApiError> {
        let placed: Order = self.post("/orders", Some(token), order).await?;
        for item in &order.items {
            self.invalidate_product(&ProductId::new(item.product.as_str()))
                .await;
        }
        Ok(placed)
    }

    /// The signed-in user's orders.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip_all)]
    pub async fn my_orders(&self, token: &BearerToken) -> Result<Vec<Order>, ApiError> {
        self.get("/orders/my", Some(token)).await
    }

    /// A single order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` when the order does not exist or belongs
    /// to someone else.
    #[instrument(skip(self, token), fields(order_id = %id))]
    pub async fn order(&self, token: &BearerToken, id: &OrderId) -> Result<Order, ApiError> {
        let path = format!("/orders/{}", segment(id.as_str())?);
        self.get(&path, Some(token)).await
    }

    /// Cancel an order that has not shipped.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Api` when the backend refuses (already shipped).
    #[instrument(skip(self, token), fields(order_id = %id))]
    pub async fn cancel_order(&self, token: &BearerToken, id: &OrderId) -> Result<Order, ApiError> {
        let path = format!("/orders/{}/cancel", segment(id.as_str())?);
        self.put(&path, token, &serde_json::json!({})).await
    }
}
