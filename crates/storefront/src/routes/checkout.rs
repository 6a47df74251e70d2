//! Checkout wizard route handlers.
//!
//! The draft (`CheckoutDraft`) lives in the session. Step forms post back
//! here and redirect to `GET /checkout`, which renders whichever step the
//! draft is on. Promo changes re-render only the order summary.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use shopfront_core::address::{Address, AddressInput, ShippingAddress, preferred};
use shopfront_core::cart::Cart;
use shopfront_core::checkout::{CardDetails, CheckoutDraft, CheckoutError, CheckoutStep, PaymentChoice};
use shopfront_core::order::NewOrder;
use shopfront_core::pricing::{OrderTotals, PromoCode};
use shopfront_core::validation::non_blank;
use shopfront_core::{AddressId, PaymentMethod};
use tower_sessions::Session;
use tracing::instrument;

use super::cart::{CART_UPDATED, CartItemView};
use super::shell::Shell;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::RequireUser;
use crate::models::session::{load_or_default, store};
use crate::models::session_keys;
use crate::state::AppState;
use crate::toast::{Toast, flash};

// =============================================================================
// View Types
// =============================================================================

/// Progress bar entry.
#[derive(Debug, Clone)]
pub struct StepView {
    pub key: &'static str,
    pub number: usize,
    pub label: &'static str,
    pub current: bool,
    pub reachable: bool,
}

/// Saved address option on the address step.
#[derive(Debug, Clone)]
pub struct AddressOptionView {
    pub id: String,
    pub full_name: String,
    pub one_line: String,
    pub is_default: bool,
    pub selected: bool,
}

/// New-address form values.
#[derive(Debug, Clone, Default)]
pub struct AddressFormView {
    pub full_name: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: String,
}

impl AddressFormView {
    fn from_shipping(address: &ShippingAddress) -> Self {
        Self {
            full_name: address.full_name.clone(),
            street: address.street.clone(),
            city: address.city.clone(),
            state: address.state.clone().unwrap_or_default(),
            postal_code: address.postal_code.clone(),
            country: address.country.clone(),
            phone: address.phone.clone().unwrap_or_default(),
        }
    }
}

/// Order summary display data.
#[derive(Debug, Clone)]
pub struct SummaryView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub discount: Option<String>,
    pub shipping: String,
    pub total: String,
    pub promo: Option<String>,
}

impl SummaryView {
    fn new(cart: &Cart, promo: Option<&PromoCode>, totals: &OrderTotals) -> Self {
        Self {
            items: cart.items().iter().map(CartItemView::from).collect(),
            subtotal: totals.subtotal.to_string(),
            discount: (!totals.discount.is_zero()).then(|| format!("-{}", totals.discount)),
            shipping: if totals.shipping.is_zero() {
                "Free".to_string()
            } else {
                totals.shipping.to_string()
            },
            total: totals.total.to_string(),
            promo: promo.map(PromoCode::label),
        }
    }
}

// =============================================================================
// Forms
// =============================================================================

/// `?step=` on the checkout page.
#[derive(Debug, Deserialize)]
pub struct StepQuery {
    pub step: Option<CheckoutStep>,
}

/// Address step form data.
#[derive(Debug, Deserialize)]
pub struct AddressForm {
    /// Chosen saved address; blank means "use the fields below".
    #[serde(default)]
    pub address_id: Option<String>,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// Also save the new address to the address book.
    #[serde(default)]
    pub save: bool,
}

impl AddressForm {
    fn into_input(self) -> AddressInput {
        AddressInput {
            full_name: self.full_name,
            street: self.street,
            city: self.city,
            state: self.state,
            postal_code: self.postal_code,
            country: self.country,
            phone: self.phone,
            is_default: false,
        }
    }
}

/// Payment step form data.
#[derive(Debug, Deserialize)]
pub struct PaymentForm {
    pub method: String,
    #[serde(flatten)]
    pub card: CardDetails,
}

/// Promo code form data.
#[derive(Debug, Deserialize)]
pub struct PromoForm {
    pub code: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub shell: Shell,
    pub step: &'static str,
    pub steps: Vec<StepView>,
    pub saved_addresses: Vec<AddressOptionView>,
    pub address_form: AddressFormView,
    pub shipping_to: Option<String>,
    pub payment_method: Option<&'static str>,
    pub payment_summary: Option<String>,
    pub summary: CheckoutSummaryTemplate,
}

/// Order summary fragment (for HTMX promo changes).
#[derive(Template, WebTemplate)]
#[template(path = "partials/checkout_summary.html")]
pub struct CheckoutSummaryTemplate {
    pub summary: SummaryView,
}

// =============================================================================
// Helpers
// =============================================================================

const fn step_key(step: CheckoutStep) -> &'static str {
    match step {
        CheckoutStep::Address => "address",
        CheckoutStep::Payment => "payment",
        CheckoutStep::Review => "review",
    }
}

fn step_views(draft: &CheckoutDraft) -> Vec<StepView> {
    CheckoutStep::ALL
        .iter()
        .map(|step| StepView {
            key: step_key(*step),
            number: step.number(),
            label: step.label(),
            current: *step == draft.step,
            reachable: draft.can_visit(*step),
        })
        .collect()
}

const fn payment_key(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::CashOnDelivery => "cash_on_delivery",
        PaymentMethod::Card => "card",
    }
}

async fn load_draft(session: &Session) -> CheckoutDraft {
    load_or_default(session, session_keys::CHECKOUT).await
}

async fn save_draft(session: &Session, draft: &CheckoutDraft) -> Result<()> {
    store(session, session_keys::CHECKOUT, draft).await?;
    Ok(())
}

fn summary(state: &AppState, cart: &Cart, draft: &CheckoutDraft) -> CheckoutSummaryTemplate {
    let totals = OrderTotals::compute(cart.subtotal(), draft.promo.as_ref(), &state.config().shop.shipping);
    CheckoutSummaryTemplate {
        summary: SummaryView::new(cart, draft.promo.as_ref(), &totals),
    }
}

fn address_options(addresses: &[Address], draft: &CheckoutDraft) -> Vec<AddressOptionView> {
    let fallback = preferred(addresses).map(|a| &a.id);
    let selected = draft.address_id.as_ref().or(if draft.address.is_none() {
        fallback
    } else {
        None
    });

    addresses
        .iter()
        .map(|a| AddressOptionView {
            id: a.id.to_string(),
            full_name: a.full_name.clone(),
            one_line: a.to_shipping().one_line(),
            is_default: a.is_default,
            selected: selected == Some(&a.id),
        })
        .collect()
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the current wizard step.
///
/// An empty cart sends the shopper back to the cart. `?step=` jumps to an
/// earlier (or already unlocked) step.
#[instrument(skip(state, session, shell, user, token))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    shell: Shell,
    RequireUser(user, token): RequireUser,
    Query(query): Query<StepQuery>,
) -> Result<Response> {
    let cart: Cart = load_or_default(&session, session_keys::CART).await;
    if cart.is_empty() {
        flash(&session, &Toast::info("Your cart is empty")).await;
        return Ok(Redirect::to("/cart").into_response());
    }

    let mut draft = load_draft(&session).await;
    if let Some(step) = query.step {
        // A locked step falls back to wherever the shopper actually is.
        if let Err(e) = draft.goto(step) {
            flash(&session, &Toast::info(format!("Please {e}."))).await;
            return Ok(Redirect::to("/checkout").into_response());
        }
        save_draft(&session, &draft).await?;
    }

    // Saved addresses only matter on the address step.
    let saved = if draft.step == CheckoutStep::Address {
        state.api().addresses(&token).await?
    } else {
        Vec::new()
    };

    let address_form = draft
        .address
        .as_ref()
        .filter(|_| draft.address_id.is_none())
        .map(AddressFormView::from_shipping)
        .unwrap_or_else(|| AddressFormView {
            full_name: user.name.clone(),
            ..AddressFormView::default()
        });

    Ok(CheckoutTemplate {
        shell,
        step: step_key(draft.step),
        steps: step_views(&draft),
        saved_addresses: address_options(&saved, &draft),
        address_form,
        shipping_to: draft.address.as_ref().map(ShippingAddress::one_line),
        payment_method: draft.payment.as_ref().map(|p| payment_key(p.method())),
        payment_summary: draft.payment.as_ref().map(PaymentChoice::describe),
        summary: summary(&state, &cart, &draft),
    }
    .into_response())
}

/// Submit the address step.
#[instrument(skip(state, session, token, form))]
pub async fn address(
    State(state): State<AppState>,
    session: Session,
    RequireUser(_user, token): RequireUser,
    Form(form): Form<AddressForm>,
) -> Result<Redirect> {
    let mut draft = load_draft(&session).await;

    match non_blank(form.address_id.as_deref()) {
        Some(id) => {
            let id = AddressId::new(id);
            let addresses = state.api().addresses(&token).await?;
            let saved = addresses
                .iter()
                .find(|a| a.id == id)
                .ok_or_else(|| AppError::NotFound("Address".to_string()))?;
            draft.submit_address(saved.to_shipping(), Some(id));
        }
        None => {
            let save = form.save;
            let input = form.into_input().validate().map_err(CheckoutError::from)?;
            let address_id = if save {
                let created = state.api().create_address(&token, &input).await?;
                add_breadcrumb("checkout", "Saved new address", None);
                Some(created.id)
            } else {
                None
            };
            draft.submit_address(input.to_shipping(), address_id);
        }
    }

    save_draft(&session, &draft).await?;
    Ok(Redirect::to("/checkout"))
}

/// Submit the payment step.
#[instrument(skip(session, form), fields(method = %form.method))]
pub async fn payment(
    session: Session,
    RequireUser(_user, _token): RequireUser,
    Form(form): Form<PaymentForm>,
) -> Result<Redirect> {
    let method: PaymentMethod = form.method.parse().map_err(AppError::BadRequest)?;
    let choice = match method {
        PaymentMethod::CashOnDelivery => PaymentChoice::CashOnDelivery,
        PaymentMethod::Card => {
            let today = chrono::Utc::now().date_naive();
            PaymentChoice::Card(form.card.validate(today).map_err(CheckoutError::from)?)
        }
    };

    let mut draft = load_draft(&session).await;
    draft.submit_payment(choice)?;
    save_draft(&session, &draft).await?;
    Ok(Redirect::to("/checkout"))
}

/// Apply a promo code (HTMX). Returns the re-rendered summary.
#[instrument(skip(state, session, form))]
pub async fn apply_promo(
    State(state): State<AppState>,
    session: Session,
    RequireUser(_user, _token): RequireUser,
    Form(form): Form<PromoForm>,
) -> Result<Response> {
    let promo = state.config().shop.promos.lookup(&form.code)?;
    let message = format!("{} applied", promo.label());

    let mut draft = load_draft(&session).await;
    draft.apply_promo(promo);
    save_draft(&session, &draft).await?;

    let cart: Cart = load_or_default(&session, session_keys::CART).await;
    Ok((Toast::success(message), summary(&state, &cart, &draft)).into_response())
}

/// Remove the promo code (HTMX).
#[instrument(skip(state, session))]
pub async fn remove_promo(
    State(state): State<AppState>,
    session: Session,
    RequireUser(_user, _token): RequireUser,
) -> Result<Response> {
    let mut draft = load_draft(&session).await;
    draft.remove_promo();
    save_draft(&session, &draft).await?;

    let cart: Cart = load_or_default(&session, session_keys::CART).await;
    Ok((Toast::info("Promo code removed"), summary(&state, &cart, &draft)).into_response())
}

/// Go back one step.
#[instrument(skip(session))]
pub async fn back(session: Session, RequireUser(_user, _token): RequireUser) -> Result<Redirect> {
    let mut draft = load_draft(&session).await;
    draft.back();
    save_draft(&session, &draft).await?;
    Ok(Redirect::to("/checkout"))
}

/// Place the order.
///
/// Totals are recomputed from the session cart; on success the cart and the
/// draft are cleared and the shopper lands on the new order.
#[instrument(skip(state, session, user, token), fields(user_id = %user.id))]
pub async fn place(
    State(state): State<AppState>,
    session: Session,
    RequireUser(user, token): RequireUser,
) -> Result<Response> {
    let mut cart: Cart = load_or_default(&session, session_keys::CART).await;
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart.into());
    }

    let draft = load_draft(&session).await;
    let placeable = draft.ready()?;
    let totals = OrderTotals::compute(
        cart.subtotal(),
        placeable.promo.as_ref(),
        &state.config().shop.shipping,
    );
    let payload = NewOrder::assemble(&cart, placeable, totals);

    let order = state.api().place_order(&token, &payload).await?;
    tracing::info!(order_id = %order.id, total = %order.total_price, "Order placed");
    add_breadcrumb("checkout", "Order placed", Some(&[("order_id", order.id.as_str())]));

    cart.clear();
    store(&session, session_keys::CART, &cart).await?;
    session.remove_value(session_keys::CHECKOUT).await?;

    flash(
        &session,
        &Toast::success(format!("Order #{} placed. Thank you!", order.display_number()))
            .with_event(CART_UPDATED),
    )
    .await;

    Ok(Redirect::to(&format!("/orders/{}", order.id)).into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use shopfront_core::cart::CartItem;
    use shopfront_core::pricing::ShippingPolicy;
    use shopfront_core::{Money, ProductId};

    fn shipping() -> ShippingAddress {
        ShippingAddress {
            full_name: "Ada Lovelace".to_string(),
            street: "12 St James's Square".to_string(),
            city: "London".to_string(),
            state: None,
            postal_code: "SW1Y 4JH".to_string(),
            country: "UK".to_string(),
            phone: None,
        }
    }

    fn address(id: &str, is_default: bool) -> Address {
        Address {
            id: AddressId::new(id),
            full_name: "Ada Lovelace".to_string(),
            street: "12 St James's Square".to_string(),
            city: "London".to_string(),
            state: None,
            postal_code: "SW1Y 4JH".to_string(),
            country: "UK".to_string(),
            phone: None,
            is_default,
        }
    }

    #[test]
    fn test_step_views_unlock_in_order() {
        let mut draft = CheckoutDraft::default();
        let views = step_views(&draft);
        assert!(views[0].current && views[0].reachable);
        assert!(!views[1].reachable && !views[2].reachable);

        draft.submit_address(shipping(), None);
        let views = step_views(&draft);
        assert!(views[1].current && views[1].reachable);
        assert!(!views[2].reachable);
        assert_eq!(views[2].key, "review");
    }

    #[test]
    fn test_default_address_is_preselected() {
        let addresses = vec![address("a1", false), address("a2", true)];
        let options = address_options(&addresses, &CheckoutDraft::default());
        assert!(!options[0].selected);
        assert!(options[1].selected);

        let mut draft = CheckoutDraft::default();
        draft.submit_address(shipping(), Some(AddressId::new("a1")));
        let options = address_options(&addresses, &draft);
        assert!(options[0].selected);
        assert!(!options[1].selected);
    }

    #[test]
    fn test_summary_with_promo() {
        let mut cart = Cart::new();
        cart.add(CartItem {
            product_id: ProductId::new("p1"),
            name: "Lamp".to_string(),
            image: None,
            unit_price: Money::from_cents(2000),
            quantity: 2,
            stock: None,
        })
        .unwrap();
        let promo = PromoCode::new("SAVE10", rust_decimal::Decimal::from(10)).unwrap();
        let totals = OrderTotals::compute(cart.subtotal(), Some(&promo), &ShippingPolicy::default());
        let view = SummaryView::new(&cart, Some(&promo), &totals);

        assert_eq!(view.subtotal, "$40.00");
        assert_eq!(view.discount.as_deref(), Some("-$4.00"));
        assert_eq!(view.shipping, "$5.00");
        assert_eq!(view.total, "$41.00");
        assert_eq!(view.promo.as_deref(), Some("SAVE10 (10% off)"));
    }
}
