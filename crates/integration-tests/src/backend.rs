//! In-memory stand-in for the shop backend's REST API.
//!
//! Serves the endpoints the storefront calls, with two products, one
//! customer and whatever orders and notifications a test creates. Requests
//! are recorded so tests can assert on what the storefront sent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde_json::{Value, json};

use crate::{TEST_EMAIL, TEST_PASSWORD, TEST_TOKEN};

/// Timestamp stamped on everything the fake backend creates.
const CREATED_AT: &str = "2026-01-05T10:00:00Z";

#[derive(Default)]
struct Recorded {
    product_queries: Vec<HashMap<String, String>>,
    orders: Vec<Value>,
    notifications: Vec<Value>,
}

#[derive(Default)]
struct BackendState {
    recorded: Mutex<Recorded>,
    product_fetches: AtomicUsize,
}

impl BackendState {
    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A running fake backend.
pub struct FakeBackend {
    base: String,
    state: Arc<BackendState>,
}

impl FakeBackend {
    /// Start the backend on an ephemeral port.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn spawn() -> Self {
        let state = Arc::new(BackendState::default());
        let api = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/register", post(register))
            .route("/products", get(products))
            .route("/products/{id}", get(product))
            .route("/categories", get(categories))
            .route("/reviews/product/{id}", get(empty_list))
            .route("/reviews/my", get(empty_list))
            .route("/addresses", get(empty_list))
            .route("/orders", post(place_order))
            .route("/orders/my", get(my_orders))
            .route("/orders/{id}", get(order))
            .route("/users/profile", get(profile))
            .route("/notifications", get(notifications))
            .route("/notifications/unread-count", get(unread_count))
            .route("/notifications/read-all", put(read_all))
            .route("/notifications/{id}/read", put(read_one))
            .route("/notifications/{id}", axum::routing::delete(delete_notification))
            .with_state(Arc::clone(&state));
        let app = Router::new().nest("/api", api);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake backend");
        let addr = listener.local_addr().expect("fake backend address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake backend server");
        });

        Self {
            base: format!("http://{addr}"),
            state,
        }
    }

    /// REST API base URL.
    #[must_use]
    pub fn api_url(&self) -> String {
        format!("{}/api", self.base)
    }

    /// Add a notification for the test customer.
    pub fn add_notification(&self, id: &str, title: &str, read: bool) {
        self.state.lock().notifications.push(json!({
            "_id": id,
            "type": "order_status",
            "title": title,
            "message": format!("{title} (details)"),
            "read": read,
            "createdAt": CREATED_AT,
        }));
    }

    /// Orders placed so far, as the storefront sent them.
    #[must_use]
    pub fn orders(&self) -> Vec<Value> {
        self.state.lock().orders.clone()
    }

    /// Query strings of every `/products` listing call.
    #[must_use]
    pub fn product_queries(&self) -> Vec<HashMap<String, String>> {
        self.state.lock().product_queries.clone()
    }

    /// Number of single-product fetches that reached the backend.
    #[must_use]
    pub fn product_fetches(&self) -> usize {
        self.state.product_fetches.load(Ordering::SeqCst)
    }

    /// Whether a notification is marked read.
    #[must_use]
    pub fn is_read(&self, id: &str) -> Option<bool> {
        self.state
            .lock()
            .notifications
            .iter()
            .find(|n| n["_id"] == id)
            .and_then(|n| n["read"].as_bool())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn customer() -> Value {
    json!({
        "_id": "u1",
        "name": "Ada Lovelace",
        "email": TEST_EMAIL,
        "role": "customer",
    })
}

fn catalog() -> Vec<Value> {
    vec![
        json!({
            "_id": "p1",
            "name": "Trail Mug",
            "description": "Enamel mug for the campsite.",
            "price": 20,
            "category": { "_id": "c1", "name": "Kitchen", "slug": "kitchen" },
            "images": ["/img/mug.jpg"],
            "countInStock": 10,
            "rating": 4.5,
            "numReviews": 2,
        }),
        json!({
            "_id": "p2",
            "name": "Canvas Tote",
            "price": 30,
            "discountPrice": 24,
            "category": "Bags",
            "countInStock": 2,
        }),
    ]
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TEST_TOKEN}"))
}

// =============================================================================
// Handlers
// =============================================================================

async fn login(Json(body): Json<Value>) -> Response {
    if body["email"] == TEST_EMAIL && body["password"] == TEST_PASSWORD {
        Json(json!({ "token": TEST_TOKEN, "user": customer() })).into_response()
    } else {
        error(StatusCode::UNAUTHORIZED, "Invalid email or password")
    }
}

async fn register(Json(body): Json<Value>) -> Response {
    if body["email"] == TEST_EMAIL {
        return error(StatusCode::BAD_REQUEST, "User already exists");
    }
    Json(json!({
        "token": "tok-new",
        "user": { "_id": "u2", "name": body["name"], "email": body["email"] },
    }))
    .into_response()
}

async fn products(
    State(state): State<Arc<BackendState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    state.lock().product_queries.push(query);
    let products = catalog();
    let total = products.len();
    Json(json!({ "products": products, "page": 1, "pages": 1, "total": total }))
}

async fn product(State(state): State<Arc<BackendState>>, Path(id): Path<String>) -> Response {
    state.product_fetches.fetch_add(1, Ordering::SeqCst);
    match id.as_str() {
        "busy" => (StatusCode::TOO_MANY_REQUESTS, [(header::RETRY_AFTER, "7")]).into_response(),
        "broken" => error(StatusCode::INTERNAL_SERVER_ERROR, "Database unavailable"),
        _ => catalog()
            .into_iter()
            .find(|p| p["_id"] == id.as_str())
            .map_or_else(
                || error(StatusCode::NOT_FOUND, "Product not found"),
                |p| Json(p).into_response(),
            ),
    }
}

async fn categories() -> Json<Value> {
    Json(json!([
        { "_id": "c1", "name": "Kitchen", "slug": "kitchen" },
        { "_id": "c2", "name": "Bags" },
    ]))
}

async fn empty_list() -> Json<Value> {
    Json(json!([]))
}

async fn place_order(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Not authorized");
    }
    let mut recorded = state.lock();
    recorded.orders.push(body.clone());
    let id = format!("order-{}", recorded.orders.len());
    if let Some(fields) = body.as_object_mut() {
        fields.insert("_id".to_string(), json!(id));
        fields.insert("status".to_string(), json!("pending"));
        fields.insert("createdAt".to_string(), json!(CREATED_AT));
    }
    (StatusCode::CREATED, Json(body)).into_response()
}

fn placed_orders(recorded: &Recorded) -> Vec<Value> {
    recorded
        .orders
        .iter()
        .enumerate()
        .map(|(index, body)| {
            let mut order = body.clone();
            if let Some(fields) = order.as_object_mut() {
                fields.insert("_id".to_string(), json!(format!("order-{}", index + 1)));
                fields.insert("status".to_string(), json!("pending"));
                fields.insert("createdAt".to_string(), json!(CREATED_AT));
            }
            order
        })
        .collect()
}

async fn my_orders(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Not authorized");
    }
    Json(placed_orders(&state.lock())).into_response()
}

async fn order(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Not authorized");
    }
    placed_orders(&state.lock())
        .into_iter()
        .find(|o| o["_id"] == id.as_str())
        .map_or_else(
            || error(StatusCode::NOT_FOUND, "Order not found"),
            |o| Json(o).into_response(),
        )
}

async fn profile(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Not authorized");
    }
    Json(customer()).into_response()
}

async fn notifications(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Not authorized");
    }
    Json(state.lock().notifications.clone()).into_response()
}

async fn unread_count(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Not authorized");
    }
    let count = state
        .lock()
        .notifications
        .iter()
        .filter(|n| n["read"] == false)
        .count();
    Json(json!({ "count": count })).into_response()
}

async fn read_one(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Not authorized");
    }
    let mut recorded = state.lock();
    let Some(entry) = recorded.notifications.iter_mut().find(|n| n["_id"] == id.as_str()) else {
        return error(StatusCode::NOT_FOUND, "Notification not found");
    };
    entry["read"] = json!(true);
    Json(entry.clone()).into_response()
}

async fn read_all(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Not authorized");
    }
    for entry in &mut state.lock().notifications {
        entry["read"] = json!(true);
    }
    Json(json!({ "message": "All notifications marked as read" })).into_response()
}

async fn delete_notification(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Not authorized");
    }
    state.lock().notifications.retain(|n| n["_id"] != id.as_str());
    Json(json!({ "message": "Notification removed" })).into_response()
}
