//! Socket event names and payload mapping.

use chrono::{DateTime, Utc};
use serde_json::Value;
use shopfront_core::notification::Notification;
use shopfront_core::{NotificationId, NotificationKind, OrderId, ReviewId};

use super::hub::Room;

/// Pushed to a customer's room.
pub const CUSTOMER_NOTIFICATION: &str = "customerNotification";
/// Pushed to the admin room when an order is placed.
pub const NEW_ORDER: &str = "newOrder";
/// Pushed to the admin room when a review awaits moderation.
pub const REVIEW_SUBMITTED: &str = "reviewSubmitted";
/// Any other admin notification.
pub const ADMIN_NOTIFICATION: &str = "adminNotification";

/// Emitted after connecting, with the user id.
pub const JOIN_CUSTOMER: &str = "joinCustomer";
/// Emitted after connecting as an admin.
pub const JOIN_ADMIN: &str = "joinAdmin";

/// Whether a room cares about an event.
#[must_use]
pub fn is_consumed(room: &Room, event: &str) -> bool {
    match room {
        Room::Customer(_) => event == CUSTOMER_NOTIFICATION,
        Room::Admin => matches!(event, NEW_ORDER | REVIEW_SUBMITTED | ADMIN_NOTIFICATION),
    }
}

/// Turn an event payload into a notification.
///
/// The payload is either the notification itself, or an object holding one
/// under `notification`. A decoded notification with neither title nor
/// message is some other record (an order, say). Anything else gets a
/// notification synthesised from the event name and whatever ids the
/// payload carries.
#[must_use]
pub fn to_notification(event: &str, args: &[Value], now: DateTime<Utc>) -> Notification {
    let payload = args.first().cloned().unwrap_or(Value::Null);

    let candidate = payload.get("notification").cloned().unwrap_or_else(|| payload.clone());
    if let Ok(notification) = serde_json::from_value::<Notification>(candidate)
        && !(notification.title.is_empty() && notification.message.is_empty())
    {
        return notification;
    }

    synthesize(event, &payload, now)
}

fn str_field<'a>(payload: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

fn synthesize(event: &str, payload: &Value, now: DateTime<Utc>) -> Notification {
    let (kind, title) = match event {
        NEW_ORDER => (NotificationKind::OrderPlaced, "New order"),
        REVIEW_SUBMITTED => (NotificationKind::ReviewSubmitted, "New review to moderate"),
        _ => (NotificationKind::General, "Notification"),
    };

    // A bare order or review document carries its own id under `_id`.
    let (order_keys, review_keys): (&[&str], &[&str]) = match event {
        NEW_ORDER => (&["orderId", "order", "_id"], &["reviewId", "review"]),
        REVIEW_SUBMITTED => (&["orderId", "order"], &["reviewId", "review", "_id"]),
        _ => (&["orderId", "order"], &["reviewId", "review"]),
    };
    let order_id = str_field(payload, order_keys).map(OrderId::new);
    let review_id = str_field(payload, review_keys).map(ReviewId::new);

    let message = str_field(payload, &["message"])
        .map(str::to_owned)
        .or_else(|| payload.as_str().map(str::to_owned))
        .unwrap_or_else(|| match (&order_id, &review_id) {
            (Some(order), _) => format!("Order {order} needs attention"),
            (None, Some(_)) => "A review is waiting for approval".to_string(),
            (None, None) => "You have a new notification".to_string(),
        });

    let reference = order_id
        .as_ref()
        .map(OrderId::as_str)
        .or_else(|| review_id.as_ref().map(ReviewId::as_str))
        .map_or_else(|| now.timestamp_millis().to_string(), str::to_owned);

    Notification {
        id: NotificationId::new(format!("{event}-{reference}")),
        kind,
        title: str_field(payload, &["title"]).unwrap_or(title).to_string(),
        message,
        read: false,
        created_at: now,
        order_id,
        review_id,
        action_status: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shopfront_core::UserId;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_750_000_000, 0).unwrap_or_default()
    }

    #[test]
    fn test_room_event_filter() {
        let customer = Room::Customer(UserId::new("u1"));
        assert!(is_consumed(&customer, CUSTOMER_NOTIFICATION));
        assert!(!is_consumed(&customer, NEW_ORDER));
        assert!(is_consumed(&Room::Admin, NEW_ORDER));
        assert!(is_consumed(&Room::Admin, REVIEW_SUBMITTED));
        assert!(is_consumed(&Room::Admin, ADMIN_NOTIFICATION));
        assert!(!is_consumed(&Room::Admin, CUSTOMER_NOTIFICATION));
    }

    #[test]
    fn test_payload_is_notification() {
        let args = [json!({
            "_id": "n1",
            "type": "order_status",
            "title": "Order shipped",
            "message": "Your order is on its way",
            "isRead": false,
            "createdAt": "2025-06-01T10:00:00Z",
            "order": "o1"
        })];
        let n = to_notification(CUSTOMER_NOTIFICATION, &args, now());
        assert_eq!(n.id.as_str(), "n1");
        assert_eq!(n.kind, NotificationKind::OrderStatus);
        assert_eq!(n.order_id.as_ref().map(OrderId::as_str), Some("o1"));
    }

    #[test]
    fn test_wrapped_notification() {
        let args = [json!({
            "notification": {"_id": "n2", "type": "review_submitted", "title": "Review"},
            "review": {"rating": 5}
        })];
        let n = to_notification(REVIEW_SUBMITTED, &args, now());
        assert_eq!(n.id.as_str(), "n2");
        assert_eq!(n.kind, NotificationKind::ReviewSubmitted);
    }

    #[test]
    fn test_synthetic_new_order() {
        let args = [json!({"orderId": "o42", "totalPrice": 19.99})];
        let n = to_notification(NEW_ORDER, &args, now());
        assert_eq!(n.id.as_str(), "newOrder-o42");
        assert_eq!(n.kind, NotificationKind::OrderPlaced);
        assert_eq!(n.title, "New order");
        assert!(!n.read);
        assert!(n.awaiting_action());
    }

    #[test]
    fn test_synthetic_without_payload() {
        let n = to_notification(ADMIN_NOTIFICATION, &[], now());
        assert_eq!(n.kind, NotificationKind::General);
        assert_eq!(n.message, "You have a new notification");
        assert_eq!(n.id.as_str(), format!("adminNotification-{}", now().timestamp_millis()));
    }

    #[test]
    fn test_bare_order_is_not_a_notification() {
        let args = [json!({"_id": "o7", "orderId": "o7", "totalPrice": 12})];
        let n = to_notification(NEW_ORDER, &args, now());
        assert_eq!(n.id.as_str(), "newOrder-o7");
        assert_eq!(n.title, "New order");
    }

    #[test]
    fn test_order_document_id_links_the_order() {
        let args = [json!({"_id": "o8", "user": "u1", "totalPrice": 41, "status": "pending"})];
        let n = to_notification(NEW_ORDER, &args, now());
        assert_eq!(n.id.as_str(), "newOrder-o8");
        assert_eq!(n.order_id.as_ref().map(OrderId::as_str), Some("o8"));
        assert!(n.review_id.is_none());
        assert_eq!(n.message, "Order o8 needs attention");
    }

    #[test]
    fn test_review_document_id_links_the_review() {
        let args = [json!({"_id": "r3", "product": "p1", "rating": 4})];
        let n = to_notification(REVIEW_SUBMITTED, &args, now());
        assert_eq!(n.id.as_str(), "reviewSubmitted-r3");
        assert_eq!(n.review_id.as_ref().map(ReviewId::as_str), Some("r3"));
        assert!(n.order_id.is_none());
    }
}
