//! Integration tests for the backend REST client.
//!
//! The client runs against the in-process fake backend, so these cover the
//! real HTTP path: URL building, bearer auth, status mapping and the catalog
//! cache.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use secrecy::SecretString;
use shopfront_core::catalog::{CatalogParams, CatalogQuery, CategoryRef};
use shopfront_core::{Money, NotificationId, ProductId};
use shopfront_integration_tests::{FakeBackend, TEST_EMAIL, TEST_PASSWORD, TEST_TOKEN};
use shopfront_storefront::api::types::{Credentials, Registration};
use shopfront_storefront::api::{ApiClient, ApiError};
use shopfront_storefront::config::BackendConfig;
use shopfront_storefront::models::BearerToken;

fn client(backend: &FakeBackend) -> ApiClient {
    let config = BackendConfig::new(&backend.api_url(), None, Duration::from_secs(5)).unwrap();
    ApiClient::new(&config).unwrap()
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_login_returns_token_and_user() {
    let backend = FakeBackend::spawn().await;
    let api = client(&backend);

    let auth = api
        .login(&Credentials {
            email: TEST_EMAIL.to_string(),
            password: SecretString::from(TEST_PASSWORD),
        })
        .await
        .unwrap();

    assert_eq!(auth.token, TEST_TOKEN);
    assert_eq!(auth.user.id.as_str(), "u1");
    assert_eq!(auth.user.name, "Ada Lovelace");
}

#[tokio::test]
async fn test_login_with_wrong_password_is_unauthorized() {
    let backend = FakeBackend::spawn().await;
    let api = client(&backend);

    let result = api
        .login(&Credentials {
            email: TEST_EMAIL.to_string(),
            password: SecretString::from("not-the-password"),
        })
        .await;

    assert!(matches!(result, Err(ApiError::Unauthorized)));
}

#[tokio::test]
async fn test_register_duplicate_carries_backend_message() {
    let backend = FakeBackend::spawn().await;
    let api = client(&backend);

    let result = api
        .register(&Registration {
            name: "Ada".to_string(),
            email: TEST_EMAIL.to_string(),
            password: SecretString::from(TEST_PASSWORD),
        })
        .await;

    match result {
        Err(err @ ApiError::Api { status: 400, .. }) => {
            assert!(err.is_client_error());
            assert!(err.to_string().contains("User already exists"));
        }
        other => panic!("expected a 400, got {other:?}"),
    }
}

#[tokio::test]
async fn test_authenticated_call_without_valid_token_is_unauthorized() {
    let backend = FakeBackend::spawn().await;
    let api = client(&backend);

    let result = api.my_orders(&BearerToken::new("expired")).await;
    assert!(matches!(result, Err(ApiError::Unauthorized)));

    let orders = api.my_orders(&BearerToken::new(TEST_TOKEN)).await.unwrap();
    assert!(orders.is_empty());
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn test_products_sends_normalized_query() {
    let backend = FakeBackend::spawn().await;
    let api = client(&backend);

    let query = CatalogQuery::from_params(&CatalogParams {
        search: Some("  mug ".to_string()),
        category: Some("kitchen".to_string()),
        min_price: Some("30".to_string()),
        max_price: Some("10".to_string()),
        sort: Some("price_asc".to_string()),
        page: Some(2),
    });

    let page = api.products(&query, 12).await.unwrap();
    assert_eq!(page.products.len(), 2);
    assert_eq!(page.total, 2);

    let sent = backend.product_queries();
    assert_eq!(sent.len(), 1);
    let sent = &sent[0];
    assert_eq!(sent["search"], "mug");
    assert_eq!(sent["category"], "kitchen");
    assert_eq!(sent["minPrice"], "10");
    assert_eq!(sent["maxPrice"], "30");
    assert_eq!(sent["sort"], "price_asc");
    assert_eq!(sent["page"], "2");
    assert_eq!(sent["limit"], "12");
}

#[tokio::test]
async fn test_product_decodes_backend_shapes() {
    let backend = FakeBackend::spawn().await;
    let api = client(&backend);

    let mug = api.product(&ProductId::new("p1")).await.unwrap();
    assert_eq!(mug.stock, Some(10));
    assert!(matches!(mug.category, Some(CategoryRef::Populated(_))));

    let tote = api.product(&ProductId::new("p2")).await.unwrap();
    assert_eq!(tote.effective_price(), Money::from_cents(2400));
    assert!(tote.on_sale());
    assert_eq!(tote.category.as_ref().map(CategoryRef::name), Some("Bags"));
}

#[tokio::test]
async fn test_product_reads_are_cached_until_invalidated() {
    let backend = FakeBackend::spawn().await;
    let api = client(&backend);
    let id = ProductId::new("p1");

    api.product(&id).await.unwrap();
    api.product(&id).await.unwrap();
    assert_eq!(backend.product_fetches(), 1);

    api.invalidate_product(&id).await;
    api.product(&id).await.unwrap();
    assert_eq!(backend.product_fetches(), 2);
}

#[tokio::test]
async fn test_error_statuses_map_to_api_errors() {
    let backend = FakeBackend::spawn().await;
    let api = client(&backend);

    match api.product(&ProductId::new("missing")).await {
        Err(ApiError::NotFound(message)) => assert_eq!(message, "Product not found"),
        other => panic!("expected NotFound, got {other:?}"),
    }

    assert!(matches!(
        api.product(&ProductId::new("busy")).await,
        Err(ApiError::RateLimited(7))
    ));

    match api.product(&ProductId::new("broken")).await {
        Err(err @ ApiError::Api { status: 500, .. }) => {
            assert!(!err.is_client_error());
            assert!(err.to_string().contains("Database unavailable"));
        }
        other => panic!("expected a 500, got {other:?}"),
    }
}

// =============================================================================
// Notifications
// =============================================================================

#[tokio::test]
async fn test_notification_read_receipts() {
    let backend = FakeBackend::spawn().await;
    backend.add_notification("n1", "Order shipped", false);
    backend.add_notification("n2", "Order delivered", false);
    let api = client(&backend);
    let token = BearerToken::new(TEST_TOKEN);

    assert_eq!(api.notifications(&token).await.unwrap().len(), 2);
    assert_eq!(api.unread_count(&token).await.unwrap(), 2);

    api.mark_notification_read(&token, &NotificationId::new("n1"))
        .await
        .unwrap();
    assert_eq!(backend.is_read("n1"), Some(true));
    assert_eq!(api.unread_count(&token).await.unwrap(), 1);

    api.mark_all_notifications_read(&token).await.unwrap();
    assert_eq!(api.unread_count(&token).await.unwrap(), 0);

    api.delete_notification(&token, &NotificationId::new("n2"))
        .await
        .unwrap();
    assert_eq!(api.notifications(&token).await.unwrap().len(), 1);
}
