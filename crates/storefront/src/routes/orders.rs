//! Order tracking route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use shopfront_core::order::{Order, OrderItem, apply_update, partition_orders};
use shopfront_core::{OrderId, OrderStatus};
use tower_sessions::Session;
use tracing::instrument;

use super::shell::{Shell, short_date};
use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::RequireUser;
use crate::state::AppState;
use crate::toast::{Toast, flash};

/// Timeline stages, in order.
const TIMELINE: [OrderStatus; 4] = [
    OrderStatus::Pending,
    OrderStatus::Processing,
    OrderStatus::Shipped,
    OrderStatus::Delivered,
];

// =============================================================================
// View Types
// =============================================================================

const fn status_key(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "pending",
        OrderStatus::Processing => "processing",
        OrderStatus::Shipped => "shipped",
        OrderStatus::Delivered => "delivered",
        OrderStatus::Cancelled => "cancelled",
    }
}

/// Order row display data.
#[derive(Debug, Clone)]
pub struct OrderView {
    pub id: String,
    pub number: String,
    pub date: String,
    pub status: &'static str,
    pub status_label: &'static str,
    pub item_count: u32,
    pub total: String,
    pub can_cancel: bool,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.to_string(),
            number: order.display_number(),
            date: short_date(&order.created_at),
            status: status_key(order.status),
            status_label: order.status.label(),
            item_count: order.item_count(),
            total: order.total_price.to_string(),
            can_cancel: order.can_cancel(),
        }
    }
}

/// Order line display data.
#[derive(Debug, Clone)]
pub struct OrderItemView {
    pub product_id: String,
    pub name: String,
    pub image: Option<String>,
    pub price: String,
    pub quantity: u32,
    pub line_price: String,
}

impl From<&OrderItem> for OrderItemView {
    fn from(item: &OrderItem) -> Self {
        Self {
            product_id: item.product.id().to_string(),
            name: item.name.clone(),
            image: item.image.clone(),
            price: item.price.to_string(),
            quantity: item.quantity,
            line_price: item.line_total().to_string(),
        }
    }
}

/// Timeline stage.
#[derive(Debug, Clone)]
pub struct TimelineStep {
    pub label: &'static str,
    pub done: bool,
    pub current: bool,
}

fn timeline(status: OrderStatus) -> Vec<TimelineStep> {
    let reached = status.progress_step();
    TIMELINE
        .iter()
        .enumerate()
        .map(|(i, stage)| TimelineStep {
            label: stage.label(),
            done: reached.is_some_and(|r| i <= r),
            current: reached == Some(i),
        })
        .collect()
}

// =============================================================================
// Templates
// =============================================================================

/// Orders page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersIndexTemplate {
    pub shell: Shell,
    pub lists: OrderListsTemplate,
}

/// Active and past order lists (for HTMX after a cancel).
#[derive(Template, WebTemplate)]
#[template(path = "partials/order_lists.html")]
pub struct OrderListsTemplate {
    pub active: Vec<OrderView>,
    pub past: Vec<OrderView>,
}

impl OrderListsTemplate {
    fn new(orders: Vec<Order>) -> Self {
        let (active, past) = partition_orders(orders);
        Self {
            active: active.iter().map(OrderView::from).collect(),
            past: past.iter().map(OrderView::from).collect(),
        }
    }
}

/// Order detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub shell: Shell,
    pub order: OrderView,
    pub items: Vec<OrderItemView>,
    pub timeline: Vec<TimelineStep>,
    pub ship_to_name: String,
    pub ship_to: String,
    pub payment: &'static str,
    pub subtotal: String,
    pub discount: Option<String>,
    pub promo_code: Option<String>,
    pub shipping: String,
}

/// Where a cancel was requested from.
#[derive(Debug, Deserialize)]
pub struct CancelForm {
    /// `list` re-renders the order lists; anything else redirects to the order.
    #[serde(default)]
    pub from: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display active and past orders.
#[instrument(skip(state, shell, token))]
pub async fn index(
    State(state): State<AppState>,
    shell: Shell,
    RequireUser(_user, token): RequireUser,
) -> Result<OrdersIndexTemplate> {
    let orders = state.api().my_orders(&token).await?;
    Ok(OrdersIndexTemplate {
        shell,
        lists: OrderListsTemplate::new(orders),
    })
}

/// Display one order.
#[instrument(skip(state, shell, token), fields(order_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    shell: Shell,
    RequireUser(_user, token): RequireUser,
    Path(id): Path<String>,
) -> Result<OrderShowTemplate> {
    let order = state.api().order(&token, &OrderId::new(id)).await?;
    let address = &order.shipping_address;

    Ok(OrderShowTemplate {
        shell,
        items: order.items.iter().map(OrderItemView::from).collect(),
        timeline: timeline(order.status),
        ship_to_name: address.full_name.clone(),
        ship_to: address.one_line(),
        payment: order.payment_method.label(),
        subtotal: order.items_price.to_string(),
        discount: (!order.discount.is_zero()).then(|| format!("-{}", order.discount)),
        promo_code: order.promo_code.clone(),
        shipping: if order.shipping_price.is_zero() {
            "Free".to_string()
        } else {
            order.shipping_price.to_string()
        },
        order: OrderView::from(&order),
    })
}

/// Cancel an order.
///
/// From the order list the lists are re-rendered, with the cancelled order
/// moved to past orders; from the detail page the shopper is redirected back.
#[instrument(skip(state, session, token, form), fields(order_id = %id))]
pub async fn cancel(
    State(state): State<AppState>,
    session: Session,
    RequireUser(_user, token): RequireUser,
    Path(id): Path<String>,
    Form(form): Form<CancelForm>,
) -> Result<Response> {
    let id = OrderId::new(id);
    let updated = state.api().cancel_order(&token, &id).await?;
    add_breadcrumb("orders", "Order cancelled", Some(&[("order_id", id.as_str())]));
    let toast = Toast::success(format!("Order #{} cancelled", updated.display_number()));

    if form.from.as_deref() == Some("list") {
        let mut orders = state.api().my_orders(&token).await?;
        // The listing may predate the cancel on a lagging replica.
        if !apply_update(&mut orders, updated.clone()) {
            orders.push(updated);
        }
        return Ok((toast, OrderListsTemplate::new(orders)).into_response());
    }

    flash(&session, &toast).await;
    Ok(Redirect::to(&format!("/orders/{id}")).into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use shopfront_core::address::ShippingAddress;
    use shopfront_core::{Money, PaymentMethod};

    fn order(id: &str, status: OrderStatus, day: u32) -> Order {
        Order {
            id: OrderId::new(id),
            order_number: None,
            items: Vec::new(),
            shipping_address: ShippingAddress {
                full_name: "Ada".to_string(),
                street: "1 Main St".to_string(),
                city: "Springfield".to_string(),
                state: None,
                postal_code: "12345".to_string(),
                country: "US".to_string(),
                phone: None,
            },
            payment_method: PaymentMethod::CashOnDelivery,
            status,
            items_price: Money::from_cents(1000),
            discount: Money::ZERO,
            shipping_price: Money::ZERO,
            total_price: Money::from_cents(1000),
            promo_code: None,
            created_at: chrono::Utc.with_ymd_and_hms(2025, 5, day, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_timeline_progress() {
        let steps = timeline(OrderStatus::Shipped);
        assert_eq!(steps.iter().filter(|s| s.done).count(), 3);
        assert!(steps[2].current);
        assert!(!steps[3].done);

        assert!(timeline(OrderStatus::Cancelled).iter().all(|s| !s.done));
    }

    #[test]
    fn test_cancelled_order_leaves_active_list() {
        let mut orders = vec![
            order("o1", OrderStatus::Pending, 1),
            order("o2", OrderStatus::Processing, 2),
        ];
        let lists = OrderListsTemplate::new(orders.clone());
        assert_eq!(lists.active.len(), 2);

        assert!(apply_update(&mut orders, order("o1", OrderStatus::Cancelled, 1)));
        let lists = OrderListsTemplate::new(orders);
        assert_eq!(lists.active.len(), 1);
        assert_eq!(lists.active[0].id, "o2");
        assert_eq!(lists.past[0].status, "cancelled");
        assert!(!lists.past[0].can_cancel);
    }
}
