//! Notification bell route handlers.
//!
//! The dropdown and the unread badge are HTMX fragments. Live updates reach
//! the page over SSE from the [`NotificationHub`](crate::realtime::NotificationHub);
//! the badge is also polled, and each poll refreshes a live room's feed
//! from REST so a dropped socket only delays notifications.

use std::convert::Infallible;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::Stream;
use serde::Serialize;
use shopfront_core::NotificationId;
use shopfront_core::notification::{Notification, NotificationFeed};
use tracing::instrument;

use super::shell::{room_for, short_date};
use crate::error::Result;
use crate::filters;
use crate::middleware::RequireUser;
use crate::models::BearerToken;
use crate::realtime::{HubEvent, Room};
use crate::state::AppState;
use crate::toast::Toast;

// =============================================================================
// View Types
// =============================================================================

/// Dropdown entry display data.
#[derive(Debug, Clone)]
pub struct NotificationView {
    pub id: String,
    pub title: String,
    pub message: String,
    pub icon: &'static str,
    pub read: bool,
    pub date: String,
    pub href: Option<String>,
    pub awaiting_action: bool,
    pub action_status: Option<String>,
}

impl From<&Notification> for NotificationView {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id.to_string(),
            title: n.title.clone(),
            message: n.message.clone(),
            icon: n.kind.icon(),
            read: n.read,
            date: short_date(&n.created_at),
            href: n.href(),
            awaiting_action: n.awaiting_action(),
            action_status: n.action_status.clone(),
        }
    }
}

/// Notification dropdown fragment.
#[derive(Template, WebTemplate)]
#[template(path = "partials/notifications_dropdown.html")]
pub struct DropdownTemplate {
    pub items: Vec<NotificationView>,
    pub unread: usize,
    /// Show approve/decline/cancel buttons.
    pub admin: bool,
}

impl DropdownTemplate {
    pub(super) fn new(feed: &NotificationFeed, admin: bool) -> Self {
        Self {
            items: feed.items().iter().map(NotificationView::from).collect(),
            unread: feed.unread_count(),
            admin,
        }
    }
}

/// Unread badge fragment.
#[derive(Template, WebTemplate)]
#[template(path = "partials/notification_badge.html")]
pub struct BadgeTemplate {
    pub unread: usize,
}

/// One SSE message.
#[derive(Debug, Serialize)]
struct StreamFrame<'a> {
    unread: usize,
    live: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    notification: Option<PushedView<'a>>,
}

/// A freshly pushed notification, shown as a toast.
#[derive(Debug, Serialize)]
struct PushedView<'a> {
    title: &'a str,
    message: &'a str,
    href: Option<String>,
}

// =============================================================================
// Feed Loading
// =============================================================================

/// Fetch the feed from REST and hand it to the room, if anyone follows it.
pub(super) async fn refresh_feed(
    state: &AppState,
    room: &Room,
    token: &BearerToken,
) -> Result<NotificationFeed> {
    let list = state.api().notifications(token).await?;
    state.hub().seed(room, list.clone());
    Ok(NotificationFeed::from_list(list))
}

/// The room's feed when it has one, else a REST refresh.
pub(super) async fn current_feed(
    state: &AppState,
    room: &Room,
    token: &BearerToken,
) -> Result<NotificationFeed> {
    match state.hub().feed(room) {
        Some(feed) if !feed.is_empty() => Ok(feed),
        _ => refresh_feed(state, room, token).await,
    }
}

/// Server-sent stream of a room's unread count and pushes.
///
/// Opening the stream subscribes to the room; closing the tab drops the
/// subscription.
pub(super) fn room_stream(
    state: AppState,
    room: Room,
    token: BearerToken,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let mut subscription = state.hub().subscribe(room, &token);

    let stream = async_stream::stream! {
        if subscription.feed().is_empty() {
            if let Err(e) = refresh_feed(&state, subscription.room(), &token).await {
                tracing::warn!(error = %e, room = %subscription.room(), "Failed to seed notification feed");
            }
        }
        let live = state.hub().is_live(subscription.room());
        yield Ok(frame(&subscription.feed(), None, live));

        while let Some(event) = subscription.recv().await {
            let live = match &event {
                HubEvent::Connection(live) => *live,
                _ => state.hub().is_live(subscription.room()),
            };
            let pushed = match &event {
                HubEvent::Pushed(n) => Some(n),
                _ => None,
            };
            yield Ok(frame(&subscription.feed(), pushed, live));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn frame(feed: &NotificationFeed, pushed: Option<&Notification>, live: bool) -> Event {
    let frame = StreamFrame {
        unread: feed.unread_count(),
        live,
        notification: pushed.map(|n| PushedView {
            title: &n.title,
            message: &n.message,
            href: n.href(),
        }),
    };
    let json = serde_json::to_string(&frame).unwrap_or_else(|_| r#"{"unread":0,"live":false}"#.to_string());
    Event::default().event("notifications").data(json)
}

// =============================================================================
// Handlers
// =============================================================================

/// Notification dropdown (HTMX).
#[instrument(skip(state, user, token))]
pub async fn dropdown(
    State(state): State<AppState>,
    RequireUser(user, token): RequireUser,
) -> Result<DropdownTemplate> {
    let feed = refresh_feed(&state, &room_for(&user), &token).await?;
    Ok(DropdownTemplate::new(&feed, user.is_admin()))
}

/// Unread badge (HTMX polling fallback).
///
/// While a stream follows the room the poll refreshes the room's feed, which
/// also pushes the fresh count to every open stream.
#[instrument(skip(state, user, token))]
pub async fn unread_count(
    State(state): State<AppState>,
    RequireUser(user, token): RequireUser,
) -> Result<BadgeTemplate> {
    let room = room_for(&user);
    let unread = if state.hub().subscriber_count(&room) > 0 {
        refresh_feed(&state, &room, &token).await?.unread_count()
    } else {
        state.api().unread_count(&token).await?
    };
    Ok(BadgeTemplate { unread })
}

/// Live notification stream (SSE).
#[instrument(skip(state, user, token))]
pub async fn stream(
    State(state): State<AppState>,
    RequireUser(user, token): RequireUser,
) -> impl IntoResponse {
    let room = room_for(&user);
    room_stream(state, room, token)
}

/// Mark one notification read.
#[instrument(skip(state, user, token), fields(notification_id = %id))]
pub async fn mark_read(
    State(state): State<AppState>,
    RequireUser(user, token): RequireUser,
    Path(id): Path<String>,
) -> Result<DropdownTemplate> {
    let id = NotificationId::new(id);
    let room = room_for(&user);
    state.api().mark_notification_read(&token, &id).await?;
    state.hub().mark_read(&room, &id);

    let feed = current_feed(&state, &room, &token).await?;
    Ok(DropdownTemplate::new(&feed, user.is_admin()))
}

/// Mark everything read.
#[instrument(skip(state, user, token))]
pub async fn mark_all_read(
    State(state): State<AppState>,
    RequireUser(user, token): RequireUser,
) -> Result<DropdownTemplate> {
    let room = room_for(&user);
    state.api().mark_all_notifications_read(&token).await?;
    state.hub().mark_all_read(&room);

    let mut feed = current_feed(&state, &room, &token).await?;
    feed.mark_all_read();
    Ok(DropdownTemplate::new(&feed, user.is_admin()))
}

/// Delete a notification.
#[instrument(skip(state, user, token), fields(notification_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireUser(user, token): RequireUser,
    Path(id): Path<String>,
) -> Result<Response> {
    let id = NotificationId::new(id);
    let room = room_for(&user);
    state.api().delete_notification(&token, &id).await?;
    state.hub().remove(&room, &id);

    let mut feed = current_feed(&state, &room, &token).await?;
    feed.remove(&id);
    Ok((
        Toast::info("Notification removed"),
        DropdownTemplate::new(&feed, user.is_admin()),
    )
        .into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use shopfront_core::{NotificationKind, OrderId};

    fn notification(id: &str, read: bool) -> Notification {
        Notification {
            id: NotificationId::new(id),
            kind: NotificationKind::OrderStatus,
            title: "Order shipped".to_string(),
            message: "Your order is on its way".to_string(),
            read,
            created_at: Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap(),
            order_id: Some(OrderId::new("o1")),
            review_id: None,
            action_status: None,
        }
    }

    #[test]
    fn test_dropdown_counts_unread() {
        let feed = NotificationFeed::from_list(vec![notification("n1", false), notification("n2", true)]);
        let dropdown = DropdownTemplate::new(&feed, false);
        assert_eq!(dropdown.unread, 1);
        assert_eq!(dropdown.items.len(), 2);
        assert_eq!(dropdown.items[0].href.as_deref(), Some("/orders/o1"));
        assert_eq!(dropdown.items[0].icon, "package");
        assert!(!dropdown.items[0].awaiting_action);
    }

    #[test]
    fn test_frame_carries_pushed_notification() {
        let pushed = notification("n1", false);
        let feed = NotificationFeed::from_list(vec![pushed.clone()]);
        let frame = StreamFrame {
            unread: feed.unread_count(),
            live: true,
            notification: Some(PushedView {
                title: &pushed.title,
                message: &pushed.message,
                href: pushed.href(),
            }),
        };
        let json: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["unread"], 1);
        assert_eq!(json["live"], true);
        assert_eq!(json["notification"]["title"], "Order shipped");

        let quiet = StreamFrame {
            unread: 0,
            live: false,
            notification: None,
        };
        let json = serde_json::to_value(&quiet).unwrap();
        assert!(json.get("notification").is_none());
    }
}
