//! Orders as returned by the backend, and the payload that creates one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::ShippingAddress;
use crate::cart::Cart;
use crate::catalog::ProductRef;
use crate::checkout::{CardSummary, PlaceableCheckout};
use crate::pricing::OrderTotals;
use crate::types::{Money, OrderId, OrderStatus, PaymentMethod};

/// A line on a placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product: ProductRef,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    pub price: Money,
    pub quantity: u32,
}

impl OrderItem {
    /// Price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.price * self.quantity
    }
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id", alias = "id")]
    pub id: OrderId,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(alias = "orderItems")]
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub status: OrderStatus,
    pub items_price: Money,
    #[serde(default)]
    pub discount: Money,
    #[serde(default)]
    pub shipping_price: Money,
    pub total_price: Money,
    #[serde(default)]
    pub promo_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Whether the customer may still cancel.
    #[must_use]
    pub const fn can_cancel(&self) -> bool {
        self.status.is_cancellable()
    }

    /// Number shown to the shopper: the backend's order number, else the
    /// last eight characters of the id.
    #[must_use]
    pub fn display_number(&self) -> String {
        self.order_number.clone().unwrap_or_else(|| {
            let id = self.id.as_str();
            let start = id.len().saturating_sub(8);
            id.get(start..).unwrap_or(id).to_uppercase()
        })
    }

    /// Total units ordered.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// Split orders into active and past lists, newest first.
#[must_use]
pub fn partition_orders(mut orders: Vec<Order>) -> (Vec<Order>, Vec<Order>) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders.into_iter().partition(|order| order.status.is_active())
}

/// Replace an order in a list with its updated copy (e.g. after cancelling).
pub fn apply_update(orders: &mut [Order], updated: Order) -> bool {
    match orders.iter_mut().find(|order| order.id == updated.id) {
        Some(slot) => {
            *slot = updated;
            true
        }
        None => false,
    }
}

/// A line in the order payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderItem {
    pub product: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub price: Money,
    pub quantity: u32,
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub items: Vec<NewOrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_details: Option<CardSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promo_code: Option<String>,
    pub items_price: Money,
    pub discount: Money,
    pub shipping_price: Money,
    pub total_price: Money,
}

impl NewOrder {
    /// Assemble the payload from the cart and a completed checkout.
    #[must_use]
    pub fn assemble(cart: &Cart, checkout: PlaceableCheckout, totals: OrderTotals) -> Self {
        let (payment_method, payment_details) = checkout.payment.into_parts();
        Self {
            items: cart
                .items()
                .iter()
                .map(|line| NewOrderItem {
                    product: line.product_id.to_string(),
                    name: line.name.clone(),
                    image: line.image.clone(),
                    price: line.unit_price,
                    quantity: line.quantity,
                })
                .collect(),
            shipping_address: checkout.address,
            payment_method,
            payment_details,
            promo_code: checkout.promo.map(|p| p.code),
            items_price: totals.subtotal,
            discount: totals.discount,
            shipping_price: totals.shipping,
            total_price: totals.total,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::types::ProductId;

    fn order(id: &str, status: OrderStatus, day: u32) -> Order {
        Order {
            id: OrderId::new(id),
            order_number: None,
            items: vec![OrderItem {
                product: ProductRef::Id(ProductId::new(format!("p-{id}"))),
                name: "Lamp".to_string(),
                image: None,
                price: Money::from_cents(2000),
                quantity: 2,
            }],
            shipping_address: ShippingAddress {
                full_name: "Grace Hopper".to_string(),
                street: "1 Navy Way".to_string(),
                city: "Arlington".to_string(),
                state: Some("VA".to_string()),
                postal_code: "22202".to_string(),
                country: "US".to_string(),
                phone: None,
            },
            payment_method: PaymentMethod::CashOnDelivery,
            status,
            items_price: Money::from_cents(4000),
            discount: Money::ZERO,
            shipping_price: Money::from_cents(500),
            total_price: Money::from_cents(4500),
            promo_code: None,
            created_at: Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_partition_newest_first() {
        let (active, past) = partition_orders(vec![
            order("a", OrderStatus::Pending, 1),
            order("b", OrderStatus::Delivered, 2),
            order("c", OrderStatus::Shipped, 3),
            order("d", OrderStatus::Cancelled, 4),
        ]);
        let ids = |list: &[Order]| list.iter().map(|o| o.id.to_string()).collect::<Vec<_>>();
        assert_eq!(ids(&active), vec!["c", "a"]);
        assert_eq!(ids(&past), vec!["d", "b"]);
    }

    #[test]
    fn test_cancelling_removes_from_active() {
        let mut orders = vec![
            order("a", OrderStatus::Pending, 1),
            order("b", OrderStatus::Processing, 2),
        ];
        let mut cancelled = order("a", OrderStatus::Cancelled, 1);
        cancelled.items.clear();
        assert!(apply_update(&mut orders, cancelled));

        let (active, past) = partition_orders(orders);
        assert!(active.iter().all(|o| o.id.as_str() != "a"));
        assert_eq!(past.len(), 1);
    }

    #[test]
    fn test_display_number() {
        let mut o = order("65f0aa11bb22cc33", OrderStatus::Pending, 1);
        assert_eq!(o.display_number(), "BB22CC33");
        o.order_number = Some("ORD-1001".to_string());
        assert_eq!(o.display_number(), "ORD-1001");
        assert_eq!(o.item_count(), 2);
        assert!(o.can_cancel());
    }

    #[test]
    fn test_order_wire_format() {
        let json = r#"{
            "_id": "o1",
            "orderItems": [{"product": {"_id": "p1", "name": "Lamp"}, "name": "Lamp", "price": 20, "quantity": 1}],
            "shippingAddress": {"fullName": "A", "street": "S", "city": "C", "postalCode": "1", "country": "X"},
            "paymentMethod": "card",
            "status": "shipped",
            "itemsPrice": 20, "shippingPrice": 5, "totalPrice": 25,
            "createdAt": "2024-05-01T10:00:00Z"
        }"#;
        let order: Order = serde_json::from_str(json).unwrap();
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.discount, Money::ZERO);
        assert_eq!(order.items[0].product.id().as_str(), "p1");
        assert!(!order.can_cancel());
    }
}
