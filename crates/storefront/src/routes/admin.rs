//! Admin notification handlers.
//!
//! Admins follow the shared admin room and can approve, decline or cancel
//! what a notification refers to without leaving the dropdown.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use shopfront_core::{ModerationAction, NotificationId};
use tracing::instrument;

use super::notifications::{DropdownTemplate, current_feed, refresh_feed, room_stream};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAdmin;
use crate::realtime::Room;
use crate::state::AppState;
use crate::toast::Toast;

/// Admin notification dropdown (HTMX).
#[instrument(skip(state, token))]
pub async fn dropdown(
    State(state): State<AppState>,
    RequireAdmin(_admin, token): RequireAdmin,
) -> Result<DropdownTemplate> {
    let feed = refresh_feed(&state, &Room::Admin, &token).await?;
    Ok(DropdownTemplate::new(&feed, true))
}

/// Admin room stream (SSE).
#[instrument(skip(state, token))]
pub async fn stream(
    State(state): State<AppState>,
    RequireAdmin(_admin, token): RequireAdmin,
) -> impl IntoResponse {
    room_stream(state, Room::Admin, token)
}

/// Approve, decline or cancel from a notification.
#[instrument(skip(state, admin, token), fields(notification_id = %id, action = %action))]
pub async fn moderate(
    State(state): State<AppState>,
    RequireAdmin(admin, token): RequireAdmin,
    Path((id, action)): Path<(String, String)>,
) -> Result<Response> {
    let action: ModerationAction = action.parse().map_err(AppError::BadRequest)?;
    let id = NotificationId::new(id);

    let updated = state.api().moderate(&token, &id, action).await?;
    state.hub().update(&Room::Admin, updated.clone());
    tracing::info!(admin_id = %admin.id, action = action.as_str(), "Notification moderated");
    add_breadcrumb(
        "admin",
        "Notification moderated",
        Some(&[("notification_id", id.as_str()), ("action", action.as_str())]),
    );

    let mut feed = current_feed(&state, &Room::Admin, &token).await?;
    feed.update(updated);
    let toast = Toast::success(action_label(action));
    Ok((toast, DropdownTemplate::new(&feed, true)).into_response())
}

const fn action_label(action: ModerationAction) -> &'static str {
    match action {
        ModerationAction::Approve => "Approved",
        ModerationAction::Decline => "Declined",
        ModerationAction::Cancel => "Cancelled",
    }
}
