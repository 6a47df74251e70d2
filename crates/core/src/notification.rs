//! Notifications and the in-memory feed behind the dropdowns.
//!
//! The feed is fed from two sides: a REST refresh replaces it wholesale, and
//! socket pushes merge into whatever is current. Both paths converge on the
//! same rules: newest first, one entry per id, at most [`FEED_CAP`] entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{NotificationId, NotificationKind, OrderId, ReviewId};

/// Maximum entries kept in a feed.
pub const FEED_CAP: usize = 50;

/// A backend notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "_id", alias = "id")]
    pub id: NotificationId,
    #[serde(default, rename = "type", alias = "kind")]
    pub kind: NotificationKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, alias = "isRead")]
    pub read: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, alias = "order")]
    pub order_id: Option<OrderId>,
    #[serde(default, alias = "review")]
    pub review_id: Option<ReviewId>,
    /// Outcome of an admin action (`approved`, `declined`, `cancelled`), if
    /// one was taken.
    #[serde(default)]
    pub action_status: Option<String>,
}

impl Notification {
    /// Whether an admin can still act on it.
    #[must_use]
    pub fn awaiting_action(&self) -> bool {
        self.kind.is_actionable() && self.action_status.is_none()
    }

    /// Link target for the dropdown entry.
    #[must_use]
    pub fn href(&self) -> Option<String> {
        if let Some(order) = &self.order_id {
            return Some(format!("/orders/{order}"));
        }
        self.review_id.as_ref().map(|_| "/reviews".to_string())
    }
}

/// Newest-first, deduplicated, capped list of notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationFeed {
    items: Vec<Notification>,
}

impl NotificationFeed {
    /// Build from a backend listing.
    #[must_use]
    pub fn from_list(list: Vec<Notification>) -> Self {
        let mut feed = Self::default();
        feed.replace(list);
        feed
    }

    /// Replace the feed with a fresh listing.
    pub fn replace(&mut self, mut list: Vec<Notification>) {
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let mut seen = std::collections::HashSet::new();
        list.retain(|n| seen.insert(n.id.clone()));
        list.truncate(FEED_CAP);
        self.items = list;
    }

    /// Merge a pushed notification. An existing entry with the same id is
    /// replaced by the pushed copy. Returns `true` when the entry is new.
    pub fn push(&mut self, notification: Notification) -> bool {
        let existed = self.remove(&notification.id).is_some();
        let index = self
            .items
            .iter()
            .position(|n| n.created_at <= notification.created_at)
            .unwrap_or(self.items.len());
        self.items.insert(index, notification);
        self.items.truncate(FEED_CAP);
        !existed
    }

    /// Mark one entry read. Returns whether it changed.
    pub fn mark_read(&mut self, id: &NotificationId) -> bool {
        self.items
            .iter_mut()
            .find(|n| &n.id == id && !n.read)
            .is_some_and(|n| {
                n.read = true;
                true
            })
    }

    /// Mark every entry read.
    pub fn mark_all_read(&mut self) {
        for n in &mut self.items {
            n.read = true;
        }
    }

    /// Remove an entry.
    pub fn remove(&mut self, id: &NotificationId) -> Option<Notification> {
        let index = self.items.iter().position(|n| &n.id == id)?;
        Some(self.items.remove(index))
    }

    /// Replace an entry in place (e.g. after an admin action).
    pub fn update(&mut self, notification: Notification) {
        if let Some(slot) = self.items.iter_mut().find(|n| n.id == notification.id) {
            *slot = notification;
        }
    }

    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.read).count()
    }

    #[must_use]
    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
