//! Product route handlers.
//!
//! The catalog listing re-renders just the results grid for HTMX filter
//! changes; the detail page records the product in the visitor's recently
//! viewed list.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use shopfront_core::ProductId;
use shopfront_core::catalog::{CatalogParams, CatalogQuery, PageWindow, Product, SortOrder};
use shopfront_core::local::{ProductSnapshot, RecentlyViewed, Wishlist};
use shopfront_core::review::{Review, average_rating};
use tower_sessions::Session;
use tracing::instrument;

use super::shell::{HxRequest, Shell, star_glyphs};
use crate::error::Result;
use crate::filters;
use crate::models::session::{load_or_default, store};
use crate::models::session_keys;
use crate::state::AppState;

/// Pages shown either side of the current one in the pagination bar.
const PAGE_WINDOW_WIDTH: u32 = 2;

/// At or below this many units the detail page warns about stock.
const LOW_STOCK: u32 = 5;

// =============================================================================
// View Types
// =============================================================================

/// Product card display data for templates.
#[derive(Debug, Clone)]
pub struct ProductCardView {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    pub price: String,
    pub compare_at_price: Option<String>,
    pub category: Option<String>,
    pub rating: String,
    pub num_reviews: u32,
    pub in_stock: bool,
    pub wishlisted: bool,
}

impl ProductCardView {
    fn new(product: &Product, wishlist: &Wishlist) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            image: product.primary_image().map(str::to_owned),
            price: product.effective_price().to_string(),
            compare_at_price: product.on_sale().then(|| product.price.to_string()),
            category: product.category.as_ref().map(|c| c.name().to_string()),
            rating: format!("{:.1}", product.rating),
            num_reviews: product.num_reviews,
            in_stock: product.in_stock(),
            wishlisted: wishlist.contains(&product.id),
        }
    }
}

/// Compact card for wishlist and recently viewed rails.
#[derive(Debug, Clone)]
pub struct SnapshotView {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    pub price: String,
}

impl From<&ProductSnapshot> for SnapshotView {
    fn from(snapshot: &ProductSnapshot) -> Self {
        Self {
            id: snapshot.id.to_string(),
            name: snapshot.name.clone(),
            image: snapshot.image.clone(),
            price: snapshot.price.to_string(),
        }
    }
}

/// Review display data.
#[derive(Debug, Clone)]
pub struct ReviewView {
    pub id: String,
    pub author: String,
    pub filled: u8,
    pub empty: u8,
    /// Filled and empty star glyphs.
    pub stars: String,
    pub comment: String,
    pub date: Option<String>,
}

impl From<&Review> for ReviewView {
    fn from(review: &Review) -> Self {
        let (filled, empty) = review.stars();
        Self {
            id: review.id.to_string(),
            author: review.author.clone().unwrap_or_else(|| "Anonymous".to_string()),
            filled,
            stars: star_glyphs(filled, empty),
            empty,
            comment: review.comment.clone(),
            date: review.created_at.as_ref().map(super::shell::short_date),
        }
    }
}

/// Select option for the category and sort dropdowns.
#[derive(Debug, Clone)]
pub struct OptionView {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

/// Pagination link.
#[derive(Debug, Clone)]
pub struct PageLinkView {
    /// `None` renders as a gap.
    pub page: Option<u32>,
    pub href: String,
    pub current: bool,
}

/// Pagination bar.
#[derive(Debug, Clone)]
pub struct PaginationView {
    pub links: Vec<PageLinkView>,
    pub prev_href: Option<String>,
    pub next_href: Option<String>,
}

impl PaginationView {
    fn new(query: &CatalogQuery, window: &PageWindow) -> Self {
        Self {
            links: window
                .links
                .iter()
                .map(|page| PageLinkView {
                    page: *page,
                    href: page.map(|p| query.href_for_page(p)).unwrap_or_default(),
                    current: *page == Some(window.current),
                })
                .collect(),
            prev_href: window.prev().map(|p| query.href_for_page(p)),
            next_href: window.next().map(|p| query.href_for_page(p)),
        }
    }
}

/// Filter form state, echoed back into the inputs.
#[derive(Debug, Clone, Default)]
pub struct FilterView {
    pub search: String,
    pub min_price: String,
    pub max_price: String,
    pub filtered: bool,
}

// =============================================================================
// Templates
// =============================================================================

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub shell: Shell,
    pub grid: ProductGridTemplate,
    pub categories: Vec<OptionView>,
    pub sorts: Vec<OptionView>,
    pub filter: FilterView,
}

/// Results grid (the HTMX target of the filter form).
#[derive(Template, WebTemplate)]
#[template(path = "partials/product_grid.html")]
pub struct ProductGridTemplate {
    pub products: Vec<ProductCardView>,
    pub total: u64,
    pub pagination: Option<PaginationView>,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub shell: Shell,
    pub product: ProductCardView,
    pub description: String,
    pub images: Vec<String>,
    pub stock_note: Option<String>,
    pub low_stock: bool,
    pub max_quantity: Option<u32>,
    pub reviews: Vec<ReviewView>,
    pub average: Option<String>,
    pub recently_viewed: Vec<SnapshotView>,
}

/// Stock line under the price. Untracked stock shows nothing.
fn stock_note(stock: Option<u32>) -> Option<String> {
    stock.map(|n| match n {
        0 => "Out of stock".to_string(),
        n if n <= LOW_STOCK => format!("Only {n} left"),
        _ => "In stock".to_string(),
    })
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the catalog.
///
/// HTMX requests (filter, sort and pagination changes) get only the grid.
#[instrument(skip(state, session, shell))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    shell: Shell,
    HxRequest(fragment): HxRequest,
    Query(params): Query<CatalogParams>,
) -> Result<Response> {
    let query = CatalogQuery::from_params(&params);
    let page_size = state.config().shop.page_size;
    let page = state.api().products(&query, page_size).await?;
    let wishlist: Wishlist = load_or_default(&session, session_keys::WISHLIST).await;

    let window = PageWindow::new(page.page, page.pages, PAGE_WINDOW_WIDTH);
    let grid = ProductGridTemplate {
        products: page
            .products
            .iter()
            .map(|p| ProductCardView::new(p, &wishlist))
            .collect(),
        total: page.total,
        pagination: (window.pages > 1).then(|| PaginationView::new(&query, &window)),
    };

    if fragment {
        return Ok(grid.into_response());
    }

    // The grid is still useful without the category dropdown.
    let categories = match state.api().categories().await {
        Ok(categories) => categories,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load categories");
            Vec::new()
        }
    };

    let selected_category = query.category.as_deref();
    Ok(ProductsIndexTemplate {
        shell,
        grid,
        categories: categories
            .iter()
            .map(|c| OptionView {
                value: c.filter_value().to_string(),
                label: c.name.clone(),
                selected: selected_category == Some(c.filter_value()),
            })
            .collect(),
        sorts: SortOrder::ALL
            .iter()
            .map(|s| OptionView {
                value: s.as_str().to_string(),
                label: s.label().to_string(),
                selected: *s == query.sort,
            })
            .collect(),
        filter: FilterView {
            search: query.search.clone().unwrap_or_default(),
            min_price: query.min_price.map(|m| m.amount().to_string()).unwrap_or_default(),
            max_price: query.max_price.map(|m| m.amount().to_string()).unwrap_or_default(),
            filtered: query.is_filtered(),
        },
    }
    .into_response())
}

/// Display a product.
#[instrument(skip(state, session, shell), fields(product_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    shell: Shell,
    Path(id): Path<String>,
) -> Result<ProductShowTemplate> {
    let id = ProductId::new(id);
    let product = state.api().product(&id).await?;

    // Reviews are secondary; a failure leaves the section empty.
    let reviews = match state.api().product_reviews(&id).await {
        Ok(reviews) => reviews,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load product reviews");
            Vec::new()
        }
    };

    let mut recent: RecentlyViewed = load_or_default(&session, session_keys::RECENTLY_VIEWED).await;
    let recently_viewed = recent.excluding(&id).map(SnapshotView::from).collect();
    recent.record(ProductSnapshot::from(&product));
    store(&session, session_keys::RECENTLY_VIEWED, &recent).await?;

    let wishlist: Wishlist = load_or_default(&session, session_keys::WISHLIST).await;

    Ok(ProductShowTemplate {
        shell,
        product: ProductCardView::new(&product, &wishlist),
        description: product.description.clone(),
        images: product.images.clone(),
        stock_note: stock_note(product.stock),
        low_stock: product.stock.is_some_and(|n| n <= LOW_STOCK),
        max_quantity: product.stock,
        average: average_rating(&reviews).map(|avg| format!("{avg:.1}")),
        reviews: reviews.iter().map(ReviewView::from).collect(),
        recently_viewed,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shopfront_core::Money;

    fn product(price: i64, discount: Option<i64>, stock: Option<u32>) -> Product {
        Product {
            id: ProductId::new("p1"),
            name: "Linen Shirt".to_string(),
            description: String::new(),
            price: Money::new(Decimal::new(price, 2)),
            discount_price: discount.map(|d| Money::new(Decimal::new(d, 2))),
            category: None,
            images: vec!["/img/shirt.jpg".to_string()],
            stock,
            rating: 4.3,
            num_reviews: 8,
        }
    }

    #[test]
    fn test_card_shows_sale_price() {
        let card = ProductCardView::new(&product(4000, Some(3000), Some(3)), &Wishlist::default());
        assert_eq!(card.price, "$30.00");
        assert_eq!(card.compare_at_price.as_deref(), Some("$40.00"));
        assert_eq!(card.rating, "4.3");
        assert!(card.in_stock);
        assert!(!card.wishlisted);
    }

    #[test]
    fn test_card_out_of_stock_and_wishlisted() {
        let p = product(4000, None, Some(0));
        let mut wishlist = Wishlist::default();
        wishlist.toggle(ProductSnapshot::from(&p));
        let card = ProductCardView::new(&p, &wishlist);
        assert!(!card.in_stock);
        assert!(card.wishlisted);
        assert!(card.compare_at_price.is_none());
    }

    #[test]
    fn test_pagination_links() {
        let query = CatalogQuery::from_params(&CatalogParams {
            search: Some("shirt".to_string()),
            page: Some(3),
            ..CatalogParams::default()
        });
        let window = PageWindow::new(3, 9, 1);
        let view = PaginationView::new(&query, &window);
        assert_eq!(view.prev_href.as_deref(), Some("/products?search=shirt&page=2"));
        assert_eq!(view.next_href.as_deref(), Some("/products?search=shirt&page=4"));
        assert!(view.links.iter().any(|l| l.current && l.page == Some(3)));
        assert!(view.links.iter().any(|l| l.page.is_none()));
    }

    #[test]
    fn test_stock_note() {
        assert_eq!(stock_note(None), None);
        assert_eq!(stock_note(Some(0)).as_deref(), Some("Out of stock"));
        assert_eq!(stock_note(Some(3)).as_deref(), Some("Only 3 left"));
        assert_eq!(stock_note(Some(40)).as_deref(), Some("In stock"));
    }
}
