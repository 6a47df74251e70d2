//! Customer dashboard handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use shopfront_core::local::{RecentlyViewed, Wishlist};
use shopfront_core::order::partition_orders;
use shopfront_core::review::reviewable_products;
use tower_sessions::Session;
use tracing::instrument;

use super::orders::OrderView;
use super::products::SnapshotView;
use super::reviews::ReviewableView;
use super::shell::Shell;
use crate::error::Result;
use crate::filters;
use crate::middleware::RequireUser;
use crate::models::session::load_or_default;
use crate::models::session_keys;
use crate::state::AppState;

/// Active orders shown on the overview.
const RECENT_ORDERS: usize = 3;

/// Dashboard page template.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard/index.html")]
pub struct DashboardTemplate {
    pub shell: Shell,
    pub name: String,
    pub active_count: usize,
    pub unread: usize,
    pub recent_orders: Vec<OrderView>,
    pub wishlist: Vec<SnapshotView>,
    pub recently_viewed: Vec<SnapshotView>,
    pub to_review: Vec<ReviewableView>,
}

/// Display the overview.
#[instrument(skip(state, session, shell, user, token))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    shell: Shell,
    RequireUser(user, token): RequireUser,
) -> Result<DashboardTemplate> {
    let (orders, reviews, unread) = tokio::try_join!(
        state.api().my_orders(&token),
        state.api().my_reviews(&token),
        state.api().unread_count(&token)
    )?;

    let to_review = reviewable_products(&orders, &reviews);
    let (active, _past) = partition_orders(orders);

    let wishlist: Wishlist = load_or_default(&session, session_keys::WISHLIST).await;
    let recent: RecentlyViewed = load_or_default(&session, session_keys::RECENTLY_VIEWED).await;

    Ok(DashboardTemplate {
        shell,
        name: user.first_name().to_string(),
        active_count: active.len(),
        unread,
        recent_orders: active.iter().take(RECENT_ORDERS).map(OrderView::from).collect(),
        wishlist: wishlist.items().iter().map(SnapshotView::from).collect(),
        recently_viewed: recent.items().iter().map(SnapshotView::from).collect(),
        to_review: to_review.iter().map(ReviewableView::from).collect(),
    })
}
