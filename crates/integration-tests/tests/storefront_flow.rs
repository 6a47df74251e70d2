//! End-to-end tests for the storefront router.
//!
//! The full middleware stack is served on an ephemeral port, talking to the
//! fake backend. Sessions live in memory, so cart, checkout draft and login
//! behave exactly as in production without a database.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use shopfront_integration_tests::{FakeBackend, TestStorefront, location, storefront_config};

async fn storefront() -> (FakeBackend, TestStorefront) {
    let backend = FakeBackend::spawn().await;
    let storefront = TestStorefront::spawn(storefront_config(&backend, None)).await;
    (backend, storefront)
}

/// Cart badge fetched with an explicit cookie, outside the test client's jar.
async fn count_with(url: &str, cookie: &str) -> String {
    reqwest::Client::new()
        .get(url)
        .header(reqwest::header::COOKIE, cookie)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap()
}

fn trigger(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("hx-trigger")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

// =============================================================================
// Health and Headers
// =============================================================================

#[tokio::test]
async fn test_health_and_security_headers() {
    let (_backend, storefront) = storefront().await;

    let response = storefront.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert!(response.headers().contains_key("content-security-policy"));
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_root_redirects_to_catalog() {
    let (_backend, storefront) = storefront().await;

    let response = storefront.get("/").await;
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), Some("/products"));
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn test_catalog_and_product_pages_render() {
    let (backend, storefront) = storefront().await;

    let response = storefront.get("/products?search=mug&sort=price_desc").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.unwrap();
    assert!(body.contains("Trail Mug"));
    assert!(body.contains("Canvas Tote"));

    let sent = backend.product_queries();
    assert_eq!(sent.last().unwrap()["search"], "mug");
    assert_eq!(sent.last().unwrap()["sort"], "price_desc");

    let body = storefront.get("/products/p2").await.text().await.unwrap();
    assert!(body.contains("Canvas Tote"));
    assert!(body.contains("Only 2 left"));

    let response = storefront.get("/products/missing").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_login_failure_redirects_back_with_error() {
    let (_backend, storefront) = storefront().await;

    let response = storefront
        .post_form(
            "/auth/login",
            &[("email", "ada@example.com"), ("password", "wrong-password")],
        )
        .await;
    assert_eq!(location(&response), Some("/auth/login?error=credentials"));

    let body = storefront
        .get("/auth/login?error=credentials")
        .await
        .text()
        .await
        .unwrap();
    assert!(body.contains("Invalid email or password."));
}

#[tokio::test]
async fn test_protected_pages_require_login() {
    let (_backend, storefront) = storefront().await;

    let response = storefront.get("/checkout").await;
    assert_eq!(location(&response), Some("/auth/login"));

    let response = storefront.htmx_post("/notifications/read-all", &[]).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get("hx-redirect").unwrap(),
        "/auth/login"
    );
}

// =============================================================================
// Cart and Checkout
// =============================================================================

#[tokio::test]
async fn test_cart_survives_login_and_checkout_places_order() {
    let (backend, storefront) = storefront().await;

    // The cart is kept in the session, before and after login.
    let response = storefront
        .htmx_post("/cart/add", &[("product_id", "p1"), ("quantity", "2")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(trigger(&response).contains("cart-updated"));

    storefront.login().await;
    let badge = storefront.get("/cart/count").await.text().await.unwrap();
    assert!(badge.contains(">2<"));

    let response = storefront
        .post_form(
            "/checkout/address",
            &[
                ("full_name", "Ada Lovelace"),
                ("street", "12 St James's Square"),
                ("city", "London"),
                ("postal_code", "SW1Y 4JH"),
                ("country", "United Kingdom"),
            ],
        )
        .await;
    assert_eq!(location(&response), Some("/checkout"));

    let response = storefront
        .post_form("/checkout/payment", &[("method", "cash_on_delivery")])
        .await;
    assert_eq!(location(&response), Some("/checkout"));

    let response = storefront
        .htmx_post("/checkout/promo", &[("code", "welcome10")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(trigger(&response).contains("applied"));

    let response = storefront.post_form("/checkout/place", &[]).await;
    assert_eq!(location(&response), Some("/orders/order-1"));

    let orders = backend.orders();
    assert_eq!(orders.len(), 1);
    let order = &orders[0];
    assert_eq!(order["items"][0]["product"], "p1");
    assert_eq!(order["items"][0]["quantity"], 2);
    assert_eq!(order["paymentMethod"], "cash_on_delivery");
    assert_eq!(order["promoCode"], "WELCOME10");
    assert_eq!(order["shippingAddress"]["city"], "London");
    assert_eq!(order["itemsPrice"].as_f64(), Some(40.0));
    assert_eq!(order["discount"].as_f64(), Some(4.0));
    assert_eq!(order["shippingPrice"].as_f64(), Some(5.0));
    assert_eq!(order["totalPrice"].as_f64(), Some(41.0));

    // The cart is emptied and the order page renders.
    let badge = storefront.get("/cart/count").await.text().await.unwrap();
    assert!(!badge.contains("badge"));
    let response = storefront.get("/orders/order-1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().contains("Trail Mug"));
}

#[tokio::test]
async fn test_checkout_rejects_unknown_promo_and_premature_place() {
    let (backend, storefront) = storefront().await;
    storefront
        .htmx_post("/cart/add", &[("product_id", "p2")])
        .await;
    storefront.login().await;

    let response = storefront
        .htmx_post("/checkout/promo", &[("code", "NOPE")])
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // No address or payment yet.
    let response = storefront.post_form("/checkout/place", &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(backend.orders().is_empty());
}

#[tokio::test]
async fn test_cart_caps_quantity_at_stock() {
    let (_backend, storefront) = storefront().await;

    let response = storefront
        .htmx_post("/cart/add", &[("product_id", "p2"), ("quantity", "2")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!trigger(&response).contains("available"));

    let response = storefront
        .htmx_post("/cart/add", &[("product_id", "p2"), ("quantity", "1")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(trigger(&response).contains("only 2 available"));

    let badge = storefront.get("/cart/count").await.text().await.unwrap();
    assert!(badge.contains(">2<"));

    let response = storefront
        .htmx_post("/cart/add", &[("product_id", "p1"), ("quantity", "0")])
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Notifications
// =============================================================================

#[tokio::test]
async fn test_notification_badge_and_read_receipts() {
    let (backend, storefront) = storefront().await;
    backend.add_notification("n1", "Order shipped", false);
    backend.add_notification("n2", "Order delivered", false);
    storefront.login().await;

    let badge = storefront
        .get("/notifications/unread-count")
        .await
        .text()
        .await
        .unwrap();
    assert!(badge.contains(r#"data-unread="2""#));

    let response = storefront.htmx_post("/notifications/n1/read", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(backend.is_read("n1"), Some(true));

    let response = storefront.htmx_post("/notifications/read-all", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(backend.is_read("n2"), Some(true));
}

#[tokio::test]
async fn test_route_id_stays_a_single_backend_segment() {
    let (backend, storefront) = storefront().await;
    backend.add_notification("n1", "Order shipped", false);
    backend.add_notification("n2", "Order delivered", false);
    storefront.login().await;

    // Decodes to `read-all?`, which must not reach the read-all endpoint.
    let response = storefront
        .htmx_post("/notifications/read-all%3F/read", &[])
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(backend.is_read("n1"), Some(false));
    assert_eq!(backend.is_read("n2"), Some(false));

    let response = storefront.get("/products/p1%3Fx").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_locked_checkout_step_redirects_to_current_step() {
    let (_backend, storefront) = storefront().await;
    storefront
        .htmx_post("/cart/add", &[("product_id", "p1")])
        .await;
    storefront.login().await;

    let response = storefront.get("/checkout?step=review").await;
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), Some("/checkout"));

    let body = storefront.get("/checkout").await.text().await.unwrap();
    assert!(body.contains("Please complete the"));
}

#[tokio::test]
async fn test_session_cookie_is_signed() {
    let (_backend, storefront) = storefront().await;

    let response = storefront
        .htmx_post("/cart/add", &[("product_id", "p1")])
        .await;
    let cookie = response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("shopfront_session="))
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let url = storefront.url("/cart/count");
    assert!(count_with(&url, &cookie).await.contains(">1<"));

    // Flip the last character of the value; the signature no longer matches.
    let mut tampered = cookie.clone();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'A' { 'B' } else { 'A' });
    assert!(!count_with(&url, &tampered).await.contains(">1<"));
}
