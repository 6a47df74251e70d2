//! Notifications, for customers and admins alike. The backend scopes the
//! listing to the token's owner.

use shopfront_core::notification::Notification;
use shopfront_core::{ModerationAction, NotificationId};
use tracing::instrument;

use super::types::UnreadCount;
use super::{ApiClient, ApiError, segment};
use crate::models::BearerToken;

impl ApiClient {
    /// Recent notifications.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip_all)]
    pub async fn notifications(&self, token: &BearerToken) -> Result<Vec<Notification>, ApiError> {
        self.get("/notifications", Some(token)).await
    }

    /// Unread count, used by the polling fallback.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip_all)]
    pub async fn unread_count(&self, token: &BearerToken) -> Result<usize, ApiError> {
        let body: UnreadCount = self.get("/notifications/unread-count", Some(token)).await?;
        Ok(body.count)
    }

    /// Mark one notification read.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token), fields(notification_id = %id))]
    pub async fn mark_notification_read(
        &self,
        token: &BearerToken,
        id: &NotificationId,
    ) -> Result<(), ApiError> {
        let path = format!("/notifications/{}/read", segment(id.as_str())?);
        self.put_empty(&path, token).await
    }

    /// Mark every notification read.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip_all)]
    pub async fn mark_all_notifications_read(&self, token: &BearerToken) -> Result<(), ApiError> {
        self.put_empty("/notifications/read-all", token).await
    }

    /// Delete a notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token), fields(notification_id = %id))]
    pub async fn delete_notification(
        &self,
        token: &BearerToken,
        id: &NotificationId,
    ) -> Result<(), ApiError> {
        let path = format!("/notifications/{}", segment(id.as_str())?);
        self.delete(&path, token).await
    }

    /// Approve, decline or cancel the subject of an admin notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not an admin's or the action no
    /// longer applies.
    #[instrument(skip(self, token), fields(notification_id = %id, action = action.as_str()))]
    pub async fn moderate(
        &self,
        token: &BearerToken,
        id: &NotificationId,
        action: ModerationAction,
    ) -> Result<Notification, ApiError> {
        let path = format!("/notifications/{}/{}", segment(id.as_str())?, action.as_str());
        self.put(&path, token, &serde_json::json!({})).await
    }
}
