//! Cart route handlers.
//!
//! The cart lives in the session until checkout turns it into an order.
//! Mutations answer HTMX with the re-rendered line items and raise
//! `cart-updated` so the nav badge refreshes itself from `/cart/count`.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use shopfront_core::ProductId;
use shopfront_core::cart::{Cart, CartItem};
use shopfront_core::pricing::ShippingPolicy;
use tower_sessions::Session;
use tracing::instrument;

use super::shell::Shell;
use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::models::session::{load_or_default, store};
use crate::models::session_keys;
use crate::state::AppState;
use crate::toast::Toast;

/// Event raised whenever the cart changes.
pub const CART_UPDATED: &str = "cart-updated";

// =============================================================================
// View Types
// =============================================================================

/// Cart line display data for templates.
#[derive(Debug, Clone)]
pub struct CartItemView {
    pub product_id: String,
    pub name: String,
    pub image: Option<String>,
    pub price: String,
    pub quantity: u32,
    pub line_price: String,
    /// Upper bound for the quantity input, when stock is tracked.
    pub max: Option<u32>,
}

impl From<&CartItem> for CartItemView {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id.to_string(),
            name: item.name.clone(),
            image: item.image.clone(),
            price: item.unit_price.to_string(),
            quantity: item.quantity,
            line_price: item.line_total().to_string(),
            max: item.stock,
        }
    }
}

/// Cart display data for templates.
#[derive(Debug, Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub item_count: u32,
    /// "Spend $X more for free shipping", when it applies.
    pub free_shipping_gap: Option<String>,
}

impl CartView {
    #[must_use]
    pub fn new(cart: &Cart, shipping: &ShippingPolicy) -> Self {
        let subtotal = cart.subtotal();
        Self {
            items: cart.items().iter().map(CartItemView::from).collect(),
            subtotal: subtotal.to_string(),
            item_count: cart.item_count(),
            free_shipping_gap: if cart.is_empty() {
                None
            } else {
                shipping.remaining_for_free(subtotal).map(|m| m.to_string())
            },
        }
    }
}

// =============================================================================
// Forms
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: String,
    pub quantity: Option<u32>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: String,
    pub quantity: u32,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub shell: Shell,
    pub cart: CartView,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

// =============================================================================
// Session Helpers
// =============================================================================

async fn load_cart(session: &Session) -> Cart {
    load_or_default(session, session_keys::CART).await
}

async fn save_cart(session: &Session, cart: &Cart) -> Result<()> {
    store(session, session_keys::CART, cart).await?;
    Ok(())
}

fn items_fragment(state: &AppState, cart: &Cart, toast: Toast) -> Response {
    let cart = CartView::new(cart, &state.config().shop.shipping);
    (toast.with_event(CART_UPDATED), CartItemsTemplate { cart }).into_response()
}

// =============================================================================
// Handlers
// =============================================================================

/// Display cart page.
#[instrument(skip(state, session, shell))]
pub async fn show(State(state): State<AppState>, session: Session, shell: Shell) -> CartShowTemplate {
    let cart = load_cart(&session).await;
    CartShowTemplate {
        shell,
        cart: CartView::new(&cart, &state.config().shop.shipping),
    }
}

/// Add a product to the cart (HTMX).
///
/// The product is fetched fresh so the cart holds the current price and
/// stock. The response body is empty; the badge refreshes on `cart-updated`.
#[instrument(skip(state, session, form), fields(product_id = %form.product_id))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let id = ProductId::new(form.product_id);
    let product = state.api().product(&id).await?;

    let mut cart = load_cart(&session).await;
    let requested = form.quantity.unwrap_or(1);
    let before = cart
        .items()
        .iter()
        .find(|line| line.product_id == id)
        .map_or(0, |line| line.quantity);
    let in_cart = cart.add(CartItem::from_product(&product, requested))?;
    save_cart(&session, &cart).await?;

    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("product_id", id.as_str()), ("quantity", &requested.to_string())]),
    );

    let toast = added_toast(&product.name, before.saturating_add(requested), in_cart);
    Ok((toast.with_event(CART_UPDATED), "").into_response())
}

/// Toast for an add. Only a quantity that was actually capped at stock says so.
fn added_toast(name: &str, wanted: u32, in_cart: u32) -> Toast {
    if in_cart < wanted {
        Toast::info(format!("{name} added to cart (only {in_cart} available)"))
    } else {
        Toast::success(format!("{name} added to cart"))
    }
}

/// Update cart item quantity (HTMX). Zero removes the line.
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response> {
    let mut cart = load_cart(&session).await;
    let quantity = cart.set_quantity(&ProductId::new(form.product_id), form.quantity)?;
    save_cart(&session, &cart).await?;

    let toast = if quantity == 0 {
        Toast::info("Item removed")
    } else {
        Toast::info("Cart updated")
    };
    Ok(items_fragment(&state, &cart, toast))
}

/// Remove item from cart (HTMX).
#[instrument(skip(state, session))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response> {
    let mut cart = load_cart(&session).await;
    let removed = cart.remove(&ProductId::new(form.product_id))?;
    save_cart(&session, &cart).await?;

    Ok(items_fragment(
        &state,
        &cart,
        Toast::info(format!("Removed {}", removed.name)),
    ))
}

/// Empty the cart (HTMX).
#[instrument(skip(state, session))]
pub async fn clear(State(state): State<AppState>, session: Session) -> Result<Response> {
    let mut cart = load_cart(&session).await;
    cart.clear();
    save_cart(&session, &cart).await?;

    Ok(items_fragment(&state, &cart, Toast::info("Cart cleared")))
}

/// Get cart count badge (HTMX).
#[instrument(skip(session))]
pub async fn count(session: Session) -> CartCountTemplate {
    CartCountTemplate {
        count: load_cart(&session).await.item_count(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shopfront_core::Money;
    use crate::toast::ToastLevel;

    fn item(id: &str, cents: i64, quantity: u32) -> CartItem {
        CartItem {
            product_id: ProductId::new(id),
            name: format!("Item {id}"),
            image: None,
            unit_price: Money::new(Decimal::new(cents, 2)),
            quantity,
            stock: Some(10),
        }
    }

    fn policy() -> ShippingPolicy {
        ShippingPolicy {
            flat_fee: Money::new(Decimal::new(500, 2)),
            free_over: Money::new(Decimal::new(5000, 2)),
        }
    }

    #[test]
    fn test_added_toast_reports_only_real_caps() {
        let exact = added_toast("Canvas Tote", 2, 2);
        assert_eq!(exact.level, ToastLevel::Success);
        assert_eq!(exact.message, "Canvas Tote added to cart");

        let capped = added_toast("Canvas Tote", 3, 2);
        assert_eq!(capped.level, ToastLevel::Info);
        assert_eq!(capped.message, "Canvas Tote added to cart (only 2 available)");
    }

    #[test]
    fn test_cart_view_totals() {
        let mut cart = Cart::new();
        cart.add(item("a", 1250, 2)).unwrap();
        cart.add(item("b", 500, 1)).unwrap();

        let view = CartView::new(&cart, &policy());
        assert_eq!(view.item_count, 3);
        assert_eq!(view.subtotal, "$30.00");
        assert_eq!(view.items[0].line_price, "$25.00");
        assert_eq!(view.items[0].max, Some(10));
        assert_eq!(view.free_shipping_gap.as_deref(), Some("$20.00"));
    }

    #[test]
    fn test_empty_cart_has_no_shipping_hint() {
        let view = CartView::new(&Cart::new(), &policy());
        assert!(view.items.is_empty());
        assert!(view.free_shipping_gap.is_none());
        assert_eq!(view.subtotal, "$0.00");
    }
}
