//! Status enums for orders, reviews, users, payments and notifications.
//!
//! Wire spellings are whatever the backend uses (lower snake case). Unknown
//! notification kinds fall back to [`NotificationKind::General`] so a new
//! backend event never breaks the dropdown.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Orders still moving through fulfillment.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Processing | Self::Shipped)
    }

    /// Orders the customer may still cancel.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Position on the tracking timeline (cancelled orders have none).
    #[must_use]
    pub const fn progress_step(self) -> Option<usize> {
        match self {
            Self::Pending => Some(0),
            Self::Processing => Some(1),
            Self::Shipped => Some(2),
            Self::Delivered => Some(3),
            Self::Cancelled => None,
        }
    }
}

/// Moderation status of a product review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    Declined,
}

impl ReviewStatus {
    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Awaiting approval",
            Self::Approved => "Published",
            Self::Declined => "Declined",
        }
    }
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Customer,
    Admin,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// How an order is paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CashOnDelivery,
    Card,
}

impl PaymentMethod {
    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CashOnDelivery => "Cash on delivery",
            Self::Card => "Credit / debit card",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash_on_delivery" | "cod" => Ok(Self::CashOnDelivery),
            "card" => Ok(Self::Card),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderPlaced,
    OrderStatus,
    OrderCancelled,
    CancelRequest,
    ReviewSubmitted,
    ReviewApproved,
    ReviewDeclined,
    #[default]
    #[serde(other)]
    General,
}

impl NotificationKind {
    /// Whether an admin can approve, decline or cancel from this notification.
    #[must_use]
    pub const fn is_actionable(self) -> bool {
        matches!(self, Self::ReviewSubmitted | Self::CancelRequest | Self::OrderPlaced)
    }

    /// Short icon name used by the dropdown template.
    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::OrderPlaced | Self::OrderStatus => "package",
            Self::OrderCancelled | Self::CancelRequest => "x-circle",
            Self::ReviewSubmitted | Self::ReviewApproved | Self::ReviewDeclined => "star",
            Self::General => "bell",
        }
    }
}

/// Admin moderation action taken from a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationAction {
    Approve,
    Decline,
    Cancel,
}

impl ModerationAction {
    /// Path segment used by the backend and the admin routes.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Decline => "decline",
            Self::Cancel => "cancel",
        }
    }
}

impl std::str::FromStr for ModerationAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Self::Approve),
            "decline" => Ok(Self::Decline),
            "cancel" => Ok(Self::Cancel),
            _ => Err(format!("invalid moderation action: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_rules() {
        assert!(OrderStatus::Pending.is_cancellable());
        assert!(OrderStatus::Processing.is_cancellable());
        assert!(!OrderStatus::Shipped.is_cancellable());
        assert!(OrderStatus::Shipped.is_active());
        assert!(!OrderStatus::Delivered.is_active());
        assert!(!OrderStatus::Cancelled.is_active());
        assert_eq!(OrderStatus::Cancelled.progress_step(), None);
    }

    #[test]
    fn test_unknown_notification_kind_is_general() {
        let kind: NotificationKind = serde_json::from_str("\"flash_sale\"").unwrap();
        assert_eq!(kind, NotificationKind::General);
        let kind: NotificationKind = serde_json::from_str("\"review_submitted\"").unwrap();
        assert!(kind.is_actionable());
    }

    #[test]
    fn test_moderation_action_parse() {
        assert_eq!("decline".parse::<ModerationAction>(), Ok(ModerationAction::Decline));
        assert!("delete".parse::<ModerationAction>().is_err());
    }

    #[test]
    fn test_payment_method_wire_name() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::CashOnDelivery).unwrap(),
            "\"cash_on_delivery\""
        );
        assert_eq!("card".parse::<PaymentMethod>(), Ok(PaymentMethod::Card));
    }
}
