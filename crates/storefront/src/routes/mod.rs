//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                          - Redirect to /products
//! GET  /health                    - Health check
//! GET  /dashboard                 - Customer overview (auth)
//!
//! # Catalog
//! GET  /products                  - Product listing (grid fragment for HTMX)
//! GET  /products/{id}             - Product detail, records recently viewed
//! GET  /wishlist                  - Wishlist page
//! POST /wishlist/toggle           - Add/remove (returns button or list fragment)
//!
//! # Cart (HTMX fragments)
//! GET  /cart                      - Cart page
//! POST /cart/add                  - Add to cart (returns empty, triggers cart-updated)
//! POST /cart/update               - Update quantity (returns cart_items fragment)
//! POST /cart/remove               - Remove item (returns cart_items fragment)
//! POST /cart/clear                - Empty the cart (returns cart_items fragment)
//! GET  /cart/count                - Cart count badge (fragment)
//!
//! # Checkout (auth)
//! GET  /checkout                  - Current wizard step (?step= to revisit)
//! POST /checkout/address          - Choose or enter the shipping address
//! POST /checkout/payment          - Choose the payment method
//! POST /checkout/promo            - Apply a promo code (summary fragment)
//! POST /checkout/promo/remove     - Remove the promo code (summary fragment)
//! POST /checkout/back             - Previous step
//! POST /checkout/place            - Place the order
//!
//! # Account (auth)
//! GET  /orders                    - Active and past orders
//! GET  /orders/{id}               - Order detail
//! POST /orders/{id}/cancel        - Cancel a pending/processing order
//! GET  /addresses                 - Address book
//! GET  /addresses/new             - New address form
//! POST /addresses                 - Create address
//! GET  /addresses/{id}/edit       - Edit address form
//! POST /addresses/{id}            - Update address
//! POST /addresses/{id}/delete     - Delete address (fragment)
//! POST /addresses/{id}/default    - Make default (fragment)
//! GET  /reviews                   - My reviews and products to review
//! POST /reviews                   - Submit a review
//! POST /reviews/{id}              - Edit a review
//! POST /reviews/{id}/delete       - Delete a review
//! GET  /settings                  - Profile and password
//! POST /settings/profile          - Update profile
//! POST /settings/password         - Change password
//!
//! # Notifications (auth)
//! GET  /notifications             - Dropdown fragment
//! GET  /notifications/unread-count - Unread badge (polling fallback)
//! GET  /notifications/stream      - SSE stream
//! POST /notifications/{id}/read   - Mark read (dropdown fragment)
//! POST /notifications/read-all    - Mark all read (dropdown fragment)
//! POST /notifications/{id}/delete - Delete (dropdown fragment)
//!
//! # Admin (admin role)
//! GET  /admin/notifications       - Admin dropdown with actions
//! GET  /admin/notifications/stream - Admin SSE stream
//! POST /admin/notifications/{id}/{action} - approve | decline | cancel
//!
//! # Auth
//! GET  /auth/login                - Login page
//! POST /auth/login                - Login action
//! GET  /auth/register             - Register page
//! POST /auth/register             - Register action
//! POST /auth/logout               - Logout action
//! ```

pub mod addresses;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod dashboard;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod settings;
pub mod shell;
pub mod wishlist;

use axum::{
    Router,
    response::Redirect,
    routing::{get, post},
};

use crate::middleware::{RateLimitConfigError, action_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the wishlist routes router.
pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(wishlist::show))
        .route("/toggle", post(wishlist::toggle))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .route("/count", get(cart::count))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show))
        .route("/address", post(checkout::address))
        .route("/payment", post(checkout::payment))
        .route("/promo", post(checkout::apply_promo))
        .route("/promo/remove", post(checkout::remove_promo))
        .route("/back", post(checkout::back))
        .route("/place", post(checkout::place))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", post(orders::cancel))
}

/// Create the address book routes router.
pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(addresses::index).post(addresses::create))
        .route("/new", get(addresses::new))
        .route("/{id}", post(addresses::update))
        .route("/{id}/edit", get(addresses::edit))
        .route("/{id}/delete", post(addresses::delete))
        .route("/{id}/default", post(addresses::set_default))
}

/// Create the review routes router.
pub fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(reviews::index).post(reviews::create))
        .route("/{id}", post(reviews::update))
        .route("/{id}/delete", post(reviews::delete))
}

/// Create the settings routes router.
pub fn settings_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(settings::show))
        .route("/profile", post(settings::update_profile))
        .route("/password", post(settings::change_password))
}

/// Create the notification routes router.
pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(notifications::dropdown))
        .route("/unread-count", get(notifications::unread_count))
        .route("/stream", get(notifications::stream))
        .route("/read-all", post(notifications::mark_all_read))
        .route("/{id}/read", post(notifications::mark_read))
        .route("/{id}/delete", post(notifications::delete))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(admin::dropdown))
        .route("/notifications/stream", get(admin::stream))
        .route("/notifications/{id}/{action}", post(admin::moderate))
}

/// Create all page routes for the storefront (auth routes are mounted
/// separately behind their own limiter).
///
/// # Errors
///
/// Returns an error if a rate limiter cannot be configured.
pub fn routes() -> Result<Router<AppState>, RateLimitConfigError> {
    let limited = Router::new()
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/wishlist", wishlist_routes())
        .nest("/reviews", review_routes())
        .layer(action_rate_limiter()?);

    Ok(Router::new()
        .route("/", get(|| async { Redirect::to("/products") }))
        .route("/dashboard", get(dashboard::index))
        .nest("/products", product_routes())
        .nest("/orders", order_routes())
        .nest("/addresses", address_routes())
        .nest("/settings", settings_routes())
        .nest("/notifications", notification_routes())
        .nest("/admin", admin_routes())
        .merge(limited))
}
