//! Per-room notification fan-out.
//!
//! One [`RoomState`] per live room: the current feed, a broadcast channel to
//! every open stream, and the stop switch of the upstream socket task. The
//! first subscriber starts the task, dropping the last [`Subscription`]
//! stops it and forgets the room. Each incarnation of a room gets a fresh
//! generation, and a socket task only ever writes to its own.
//!
//! The mutex is never held across an await.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use shopfront_core::notification::{Notification, NotificationFeed};
use shopfront_core::{NotificationId, UserId};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};
use url::Url;

use super::socket::{self, SocketTarget};
use crate::models::BearerToken;

/// Buffered events per room before slow streams start lagging.
const CHANNEL_CAPACITY: usize = 64;

/// A notification channel on the backend socket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
    /// One customer's own notifications.
    Customer(UserId),
    /// The shared admin room.
    Admin,
}

impl std::fmt::Display for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer(id) => write!(f, "customer:{id}"),
            Self::Admin => f.write_str("admin"),
        }
    }
}

/// What subscribers are told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    /// A notification arrived over the socket.
    Pushed(Notification),
    /// The feed changed some other way (refresh, read, removal).
    Changed,
    /// The upstream socket connected or dropped.
    Connection(bool),
}

struct RoomState {
    generation: u64,
    tx: broadcast::Sender<HubEvent>,
    feed: NotificationFeed,
    subscribers: usize,
    stop: Option<watch::Sender<bool>>,
    live: bool,
}

impl RoomState {
    fn new(generation: u64) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            generation,
            tx,
            feed: NotificationFeed::default(),
            subscribers: 0,
            stop: None,
            live: false,
        }
    }

    fn notify(&self, event: HubEvent) {
        // No receivers just means every stream has already gone away.
        let _ = self.tx.send(event);
    }
}

struct HubInner {
    socket_url: Url,
    rooms: Mutex<HashMap<Room, RoomState>>,
    generations: AtomicU64,
}

impl HubInner {
    fn lock(&self) -> MutexGuard<'_, HashMap<Room, RoomState>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against a room's state, if the room is live.
    fn with_room<T>(&self, room: &Room, f: impl FnOnce(&mut RoomState) -> T) -> Option<T> {
        self.lock().get_mut(room).map(f)
    }

    /// Like [`Self::with_room`], but only for the given incarnation of the
    /// room.
    fn with_generation<T>(
        &self,
        room: &Room,
        generation: u64,
        f: impl FnOnce(&mut RoomState) -> T,
    ) -> Option<T> {
        self.lock()
            .get_mut(room)
            .filter(|state| state.generation == generation)
            .map(f)
    }

    fn release(&self, room: &Room) {
        let mut rooms = self.lock();
        let Some(state) = rooms.get_mut(room) else {
            return;
        };
        state.subscribers = state.subscribers.saturating_sub(1);
        if state.subscribers == 0 {
            if let Some(stop) = state.stop.take() {
                let _ = stop.send(true);
            }
            rooms.remove(room);
            info!(%room, "Last subscriber left, closing notification socket");
        }
    }
}

// =============================================================================
// NotificationHub
// =============================================================================

/// Shared registry of live notification rooms.
#[derive(Clone)]
pub struct NotificationHub {
    inner: Arc<HubInner>,
}

impl NotificationHub {
    /// Create a hub that opens sockets against `socket_url`.
    #[must_use]
    pub fn new(socket_url: Url) -> Self {
        Self {
            inner: Arc::new(HubInner {
                socket_url,
                rooms: Mutex::new(HashMap::new()),
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// Join a room. The first subscriber starts the upstream socket,
    /// authenticated with `token`.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn subscribe(&self, room: Room, token: &BearerToken) -> Subscription {
        let mut rooms = self.inner.lock();
        let state = rooms.entry(room.clone()).or_insert_with(|| {
            RoomState::new(self.inner.generations.fetch_add(1, Ordering::Relaxed))
        });
        state.subscribers += 1;
        let rx = state.tx.subscribe();

        if state.stop.is_none() {
            let (stop_tx, stop_rx) = watch::channel(false);
            state.stop = Some(stop_tx);
            let target = SocketTarget {
                base_url: self.inner.socket_url.clone(),
                token: token.clone(),
                room: room.clone(),
            };
            let publisher = Publisher {
                hub: Arc::downgrade(&self.inner),
                room: room.clone(),
                generation: state.generation,
            };
            tokio::spawn(socket::run(target, publisher, stop_rx));
            info!(%room, "Opening notification socket");
        }
        drop(rooms);

        Subscription {
            hub: Arc::clone(&self.inner),
            room,
            rx,
        }
    }

    /// Replace a live room's feed with a REST listing. Returns `false` when
    /// nobody is subscribed to the room.
    pub fn seed(&self, room: &Room, list: Vec<Notification>) -> bool {
        self.inner
            .with_room(room, |state| {
                state.feed.replace(list);
                state.notify(HubEvent::Changed);
            })
            .is_some()
    }

    /// Merge a notification into a live room's feed.
    pub fn publish(&self, room: &Room, notification: Notification) -> bool {
        self.inner
            .with_room(room, |state| push_into(room, state, notification))
            .is_some()
    }

    /// Snapshot of a live room's feed.
    #[must_use]
    pub fn feed(&self, room: &Room) -> Option<NotificationFeed> {
        self.inner.with_room(room, |state| state.feed.clone())
    }

    /// Mirror a read receipt the backend accepted.
    pub fn mark_read(&self, room: &Room, id: &NotificationId) {
        self.inner.with_room(room, |state| {
            if state.feed.mark_read(id) {
                state.notify(HubEvent::Changed);
            }
        });
    }

    /// Mirror "mark all read".
    pub fn mark_all_read(&self, room: &Room) {
        self.inner.with_room(room, |state| {
            state.feed.mark_all_read();
            state.notify(HubEvent::Changed);
        });
    }

    /// Mirror a deletion.
    pub fn remove(&self, room: &Room, id: &NotificationId) {
        self.inner.with_room(room, |state| {
            if state.feed.remove(id).is_some() {
                state.notify(HubEvent::Changed);
            }
        });
    }

    /// Mirror an admin action's updated notification.
    pub fn update(&self, room: &Room, notification: Notification) {
        self.inner.with_room(room, |state| {
            state.feed.update(notification);
            state.notify(HubEvent::Changed);
        });
    }

    /// Whether the room's upstream socket is connected and joined.
    #[must_use]
    pub fn is_live(&self, room: &Room) -> bool {
        self.inner.with_room(room, |state| state.live).unwrap_or(false)
    }

    #[must_use]
    pub fn subscriber_count(&self, room: &Room) -> usize {
        self.inner
            .with_room(room, |state| state.subscribers)
            .unwrap_or(0)
    }
}

fn push_into(room: &Room, state: &mut RoomState, notification: Notification) {
    let is_new = state.feed.push(notification.clone());
    debug!(%room, id = %notification.id, is_new, "Notification pushed");
    state.notify(HubEvent::Pushed(notification));
}

// =============================================================================
// Subscription / Publisher
// =============================================================================

/// A stream's membership in a room. Dropping it leaves the room.
pub struct Subscription {
    hub: Arc<HubInner>,
    room: Room,
    rx: broadcast::Receiver<HubEvent>,
}

impl Subscription {
    #[must_use]
    pub const fn room(&self) -> &Room {
        &self.room
    }

    /// Next event. A stream that fell behind gets [`HubEvent::Changed`] so
    /// it re-reads the feed instead of replaying what it missed.
    pub async fn recv(&mut self) -> Option<HubEvent> {
        match self.rx.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(room = %self.room, skipped, "Notification stream lagged");
                Some(HubEvent::Changed)
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    /// Current feed of the room.
    #[must_use]
    pub fn feed(&self) -> NotificationFeed {
        self.hub
            .with_room(&self.room, |state| state.feed.clone())
            .unwrap_or_default()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.release(&self.room);
    }
}

/// Handle the socket task writes through. Holds the hub weakly so a task
/// never keeps a dropped hub alive, and is bound to the room generation that
/// spawned the task.
pub struct Publisher {
    hub: Weak<HubInner>,
    room: Room,
    generation: u64,
}

impl Publisher {
    #[must_use]
    pub const fn room(&self) -> &Room {
        &self.room
    }

    /// Merge a pushed notification. Returns `false` once the room is gone
    /// or has been re-created.
    pub fn publish(&self, notification: Notification) -> bool {
        self.hub.upgrade().is_some_and(|hub| {
            hub.with_generation(&self.room, self.generation, |state| {
                push_into(&self.room, state, notification);
            })
            .is_some()
        })
    }

    /// Record the connection state. Returns `false` once the room is gone
    /// or has been re-created.
    pub fn set_live(&self, live: bool) -> bool {
        self.hub.upgrade().is_some_and(|hub| {
            hub.with_generation(&self.room, self.generation, |state| {
                if state.live != live {
                    state.live = live;
                    state.notify(HubEvent::Connection(live));
                }
            })
            .is_some()
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn hub() -> NotificationHub {
        // Nothing listens here; the socket task just keeps backing off.
        NotificationHub::new(Url::parse("http://127.0.0.1:9").unwrap())
    }

    fn notification(id: &str, minute: u32) -> Notification {
        Notification {
            id: NotificationId::new(id),
            kind: shopfront_core::NotificationKind::OrderStatus,
            title: "Order update".to_string(),
            message: format!("update {id}"),
            read: false,
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, minute, 0).unwrap(),
            order_id: None,
            review_id: None,
            action_status: None,
        }
    }

    fn customer() -> Room {
        Room::Customer(UserId::new("u1"))
    }

    /// A publisher bound to the room's current generation.
    fn publisher_for(hub: &NotificationHub, room: &Room) -> Publisher {
        Publisher {
            hub: Arc::downgrade(&hub.inner),
            room: room.clone(),
            generation: hub.inner.with_room(room, |state| state.generation).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_rooms_exist_only_while_subscribed() {
        let hub = hub();
        let room = customer();
        assert!(!hub.seed(&room, vec![notification("n1", 0)]));

        let first = hub.subscribe(room.clone(), &BearerToken::new("t"));
        let second = hub.subscribe(room.clone(), &BearerToken::new("t"));
        assert_eq!(hub.subscriber_count(&room), 2);

        drop(first);
        assert_eq!(hub.subscriber_count(&room), 1);
        drop(second);
        assert_eq!(hub.subscriber_count(&room), 0);
        assert!(hub.feed(&room).is_none());
    }

    #[tokio::test]
    async fn test_push_dedupes_and_broadcasts() {
        let hub = hub();
        let room = customer();
        let mut sub = hub.subscribe(room.clone(), &BearerToken::new("t"));

        assert!(hub.seed(&room, vec![notification("n1", 0), notification("n2", 1)]));
        assert_eq!(sub.recv().await, Some(HubEvent::Changed));

        let mut again = notification("n2", 1);
        again.message = "pushed copy".to_string();
        assert!(hub.publish(&room, again.clone()));
        assert_eq!(sub.recv().await, Some(HubEvent::Pushed(again)));

        let feed = sub.feed();
        assert_eq!(feed.items().len(), 2);
        assert_eq!(feed.unread_count(), 2);
        assert_eq!(feed.items()[0].message, "pushed copy");
    }

    #[tokio::test]
    async fn test_read_and_remove_are_mirrored() {
        let hub = hub();
        let room = Room::Admin;
        let sub = hub.subscribe(room.clone(), &BearerToken::new("t"));
        hub.seed(&room, vec![notification("a", 0), notification("b", 1)]);

        hub.mark_read(&room, &NotificationId::new("a"));
        assert_eq!(sub.feed().unread_count(), 1);

        hub.remove(&room, &NotificationId::new("b"));
        assert_eq!(sub.feed().unread_count(), 0);
        assert_eq!(sub.feed().items().len(), 1);

        hub.publish(&room, notification("c", 2));
        hub.mark_all_read(&room);
        assert_eq!(sub.feed().unread_count(), 0);
    }

    #[tokio::test]
    async fn test_publisher_outlives_room() {
        let hub = hub();
        let room = customer();
        let sub = hub.subscribe(room.clone(), &BearerToken::new("t"));
        let publisher = publisher_for(&hub, &room);

        assert!(publisher.set_live(true));
        assert!(hub.is_live(&room));
        assert!(publisher.publish(notification("n1", 0)));

        drop(sub);
        assert!(!publisher.publish(notification("n2", 1)));
        assert!(!publisher.set_live(false));
    }

    #[tokio::test]
    async fn test_stale_publisher_cannot_touch_resubscribed_room() {
        let hub = hub();
        let room = customer();

        let first = hub.subscribe(room.clone(), &BearerToken::new("t"));
        let stale = publisher_for(&hub, &room);
        drop(first);

        let mut second = hub.subscribe(room.clone(), &BearerToken::new("t"));
        let current = publisher_for(&hub, &room);
        assert!(current.set_live(true));
        assert_eq!(second.recv().await, Some(HubEvent::Connection(true)));

        // The old task's final writes go nowhere.
        assert!(!stale.set_live(false));
        assert!(!stale.publish(notification("n1", 0)));
        assert!(hub.is_live(&room));
        assert!(second.feed().items().is_empty());

        assert!(current.publish(notification("n2", 1)));
        assert_eq!(
            second.recv().await,
            Some(HubEvent::Pushed(notification("n2", 1)))
        );
    }

    #[test]
    fn test_room_display() {
        assert_eq!(customer().to_string(), "customer:u1");
        assert_eq!(Room::Admin.to_string(), "admin");
    }
}
