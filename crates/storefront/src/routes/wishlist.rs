//! Wishlist route handlers.
//!
//! The wishlist is a session list of product snapshots, so it renders
//! without a backend call.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use shopfront_core::ProductId;
use shopfront_core::local::{ProductSnapshot, Wishlist};
use tower_sessions::Session;
use tracing::instrument;

use super::products::SnapshotView;
use super::shell::Shell;
use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::models::session::{load_or_default, store};
use crate::models::session_keys;
use crate::state::AppState;
use crate::toast::Toast;

/// Toggle form data.
#[derive(Debug, Deserialize)]
pub struct ToggleForm {
    pub product_id: String,
    /// Render the wishlist page body instead of the heart button.
    #[serde(default)]
    pub from_list: bool,
}

/// Wishlist page template.
#[derive(Template, WebTemplate)]
#[template(path = "wishlist/show.html")]
pub struct WishlistTemplate {
    pub shell: Shell,
    pub items: Vec<SnapshotView>,
}

/// Wishlist list fragment (for HTMX removal from the wishlist page).
#[derive(Template, WebTemplate)]
#[template(path = "partials/wishlist_items.html")]
pub struct WishlistItemsTemplate {
    pub items: Vec<SnapshotView>,
}

/// Heart button fragment.
#[derive(Template, WebTemplate)]
#[template(path = "partials/wishlist_button.html")]
pub struct WishlistButtonTemplate {
    pub product_id: String,
    pub wishlisted: bool,
}

/// Display the wishlist.
#[instrument(skip(session, shell))]
pub async fn show(session: Session, shell: Shell) -> WishlistTemplate {
    let wishlist: Wishlist = load_or_default(&session, session_keys::WISHLIST).await;
    WishlistTemplate {
        shell,
        items: wishlist.items().iter().map(SnapshotView::from).collect(),
    }
}

/// Add or remove a product (HTMX).
#[instrument(skip(state, session, form), fields(product_id = %form.product_id))]
pub async fn toggle(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ToggleForm>,
) -> Result<Response> {
    let id = ProductId::new(form.product_id);
    let mut wishlist: Wishlist = load_or_default(&session, session_keys::WISHLIST).await;

    // Removal needs no product lookup; the snapshot is already here.
    let added = if wishlist.remove(&id) {
        false
    } else {
        let product = state.api().product(&id).await?;
        wishlist.toggle(ProductSnapshot::from(&product))
    };
    store(&session, session_keys::WISHLIST, &wishlist).await?;

    add_breadcrumb(
        "wishlist",
        if added { "Added to wishlist" } else { "Removed from wishlist" },
        Some(&[("product_id", id.as_str())]),
    );

    let toast = if added {
        Toast::success("Saved to your wishlist")
    } else {
        Toast::info("Removed from your wishlist")
    };

    if form.from_list {
        let items = wishlist.items().iter().map(SnapshotView::from).collect();
        return Ok((toast, WishlistItemsTemplate { items }).into_response());
    }

    Ok((
        toast,
        WishlistButtonTemplate {
            product_id: id.into_inner(),
            wishlisted: added,
        },
    )
        .into_response())
}
