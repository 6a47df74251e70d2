//! Catalog entities and the search/filter/sort/pagination query.

use serde::{Deserialize, Serialize};

use crate::types::{CategoryId, Money, ProductId};
use crate::validation::non_blank;

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(rename = "_id", alias = "id")]
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
}

impl Category {
    /// Value sent as the `category` filter.
    #[must_use]
    pub fn filter_value(&self) -> &str {
        self.slug.as_deref().unwrap_or(&self.name)
    }
}

/// A category as embedded in a product: either a bare name or a populated
/// category document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryRef {
    Populated(Category),
    Name(String),
}

impl CategoryRef {
    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Populated(category) => &category.name,
            Self::Name(name) => name,
        }
    }
}

/// A reference to a product inside orders and reviews: the backend sends
/// either the id or a populated summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductRef {
    Summary {
        #[serde(rename = "_id", alias = "id")]
        id: ProductId,
        #[serde(default)]
        name: Option<String>,
    },
    Id(ProductId),
}

impl ProductRef {
    /// The referenced product id.
    #[must_use]
    pub const fn id(&self) -> &ProductId {
        match self {
            Self::Summary { id, .. } | Self::Id(id) => id,
        }
    }

    /// Product name when the backend populated it.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Summary { name, .. } => name.as_deref(),
            Self::Id(_) => None,
        }
    }
}

impl From<ProductId> for ProductRef {
    fn from(id: ProductId) -> Self {
        Self::Id(id)
    }
}

/// A product as served by the catalog endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id", alias = "id")]
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    #[serde(default)]
    pub discount_price: Option<Money>,
    #[serde(default)]
    pub category: Option<CategoryRef>,
    #[serde(default)]
    pub images: Vec<String>,
    /// Units in stock; `None` when the backend does not track stock.
    #[serde(default, alias = "countInStock")]
    pub stock: Option<u32>,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub num_reviews: u32,
}

impl Product {
    /// The price a shopper pays: the discount price when it undercuts the
    /// list price.
    #[must_use]
    pub fn effective_price(&self) -> Money {
        match self.discount_price {
            Some(discounted) if discounted < self.price && !discounted.is_zero() => discounted,
            _ => self.price,
        }
    }

    /// Whether a discount is in effect.
    #[must_use]
    pub fn on_sale(&self) -> bool {
        self.effective_price() < self.price
    }

    /// Whether at least one unit can be bought.
    #[must_use]
    pub fn in_stock(&self) -> bool {
        self.stock.is_none_or(|stock| stock > 0)
    }

    /// First image, if any.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// Catalog sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Rating,
    Name,
}

impl SortOrder {
    /// All orders, in the order the sort dropdown lists them.
    pub const ALL: [Self; 5] = [
        Self::Newest,
        Self::PriceAsc,
        Self::PriceDesc,
        Self::Rating,
        Self::Name,
    ];

    /// Query-string spelling (shared by the storefront and the backend).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::Rating => "rating",
            Self::Name => "name",
        }
    }

    /// Dropdown label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Newest => "Newest",
            Self::PriceAsc => "Price: low to high",
            Self::PriceDesc => "Price: high to low",
            Self::Rating => "Top rated",
            Self::Name => "Name",
        }
    }

    /// Parse a query-string value, falling back to the default.
    #[must_use]
    pub fn parse_or_default(value: Option<&str>) -> Self {
        value
            .and_then(|v| Self::ALL.into_iter().find(|sort| sort.as_str() == v))
            .unwrap_or_default()
    }
}

/// Raw catalog query as it arrives in the URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogParams {
    pub search: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
}

/// A normalized catalog query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatalogQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub sort: SortOrder,
    pub page: u32,
}

impl CatalogQuery {
    /// Normalize raw URL parameters.
    ///
    /// Blank strings become `None`, unparsable or negative prices are
    /// dropped, an inverted price range is swapped and the page is at
    /// least 1.
    #[must_use]
    pub fn from_params(params: &CatalogParams) -> Self {
        let price = |raw: Option<&String>| {
            non_blank(raw.map(String::as_str))
                .and_then(|v| v.parse::<rust_decimal::Decimal>().ok())
                .filter(|d| !d.is_sign_negative())
                .map(Money::new)
        };

        let mut min_price = price(params.min_price.as_ref());
        let mut max_price = price(params.max_price.as_ref());
        if let (Some(min), Some(max)) = (min_price, max_price)
            && min > max
        {
            min_price = Some(max);
            max_price = Some(min);
        }

        Self {
            search: non_blank(params.search.as_deref()),
            category: non_blank(params.category.as_deref()),
            min_price,
            max_price,
            sort: SortOrder::parse_or_default(params.sort.as_deref()),
            page: params.page.unwrap_or(1).max(1),
        }
    }

    /// Backend query parameters for this query.
    #[must_use]
    pub fn to_pairs(&self, limit: u32) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(7);
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        if let Some(category) = &self.category {
            pairs.push(("category", category.clone()));
        }
        if let Some(min) = self.min_price {
            pairs.push(("minPrice", min.amount().to_string()));
        }
        if let Some(max) = self.max_price {
            pairs.push(("maxPrice", max.amount().to_string()));
        }
        pairs.push(("sort", self.sort.as_str().to_string()));
        pairs.push(("page", self.page.to_string()));
        pairs.push(("limit", limit.to_string()));
        pairs
    }

    /// Storefront URL for the same query on another page.
    #[must_use]
    pub fn href_for_page(&self, page: u32) -> String {
        let mut parts = Vec::new();
        if let Some(search) = &self.search {
            parts.push(format!("search={}", urlencoding::encode(search)));
        }
        if let Some(category) = &self.category {
            parts.push(format!("category={}", urlencoding::encode(category)));
        }
        if let Some(min) = self.min_price {
            parts.push(format!("min_price={}", min.amount()));
        }
        if let Some(max) = self.max_price {
            parts.push(format!("max_price={}", max.amount()));
        }
        if self.sort != SortOrder::default() {
            parts.push(format!("sort={}", self.sort.as_str()));
        }
        parts.push(format!("page={page}"));
        format!("/products?{}", parts.join("&"))
    }

    /// Whether any filter narrows the result set.
    #[must_use]
    pub const fn is_filtered(&self) -> bool {
        self.search.is_some()
            || self.category.is_some()
            || self.min_price.is_some()
            || self.max_price.is_some()
    }
}

/// One page of catalog results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default = "one")]
    pub page: u32,
    #[serde(default = "one")]
    pub pages: u32,
    #[serde(default)]
    pub total: u64,
}

const fn one() -> u32 {
    1
}

/// Page numbers shown in the pagination bar.
///
/// Always includes the first and last page; `None` marks a gap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWindow {
    pub current: u32,
    pub pages: u32,
    pub links: Vec<Option<u32>>,
}

impl PageWindow {
    /// Build a window of `width` pages on each side of `current`.
    #[must_use]
    pub fn new(current: u32, pages: u32, width: u32) -> Self {
        let pages = pages.max(1);
        let current = current.clamp(1, pages);
        let start = current.saturating_sub(width).max(1);
        let end = current.saturating_add(width).min(pages);

        let mut links = Vec::new();
        if start > 1 {
            links.push(Some(1));
            if start > 2 {
                links.push(None);
            }
        }
        links.extend((start..=end).map(Some));
        if end < pages {
            if end + 1 < pages {
                links.push(None);
            }
            links.push(Some(pages));
        }

        Self {
            current,
            pages,
            links,
        }
    }

    /// Previous page, if any.
    #[must_use]
    pub const fn prev(&self) -> Option<u32> {
        if self.current > 1 {
            Some(self.current - 1)
        } else {
            None
        }
    }

    /// Next page, if any.
    #[must_use]
    pub const fn next(&self) -> Option<u32> {
        if self.current < self.pages {
            Some(self.current + 1)
        } else {
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn params(min: &str, max: &str) -> CatalogParams {
        CatalogParams {
            search: Some("  mug ".to_string()),
            category: Some(String::new()),
            min_price: Some(min.to_string()),
            max_price: Some(max.to_string()),
            sort: Some("price_desc".to_string()),
            page: Some(0),
        }
    }

    #[test]
    fn test_query_normalization() {
        let query = CatalogQuery::from_params(&params("40", "10"));
        assert_eq!(query.search.as_deref(), Some("mug"));
        assert_eq!(query.category, None);
        assert_eq!(query.min_price, Some(Money::from_cents(1000)));
        assert_eq!(query.max_price, Some(Money::from_cents(4000)));
        assert_eq!(query.sort, SortOrder::PriceDesc);
        assert_eq!(query.page, 1);
    }

    #[test]
    fn test_query_drops_bad_prices() {
        let query = CatalogQuery::from_params(&params("-3", "abc"));
        assert_eq!(query.min_price, None);
        assert_eq!(query.max_price, None);
    }

    #[test]
    fn test_backend_pairs() {
        let query = CatalogQuery::from_params(&params("5", ""));
        let pairs = query.to_pairs(12);
        assert!(pairs.contains(&("search", "mug".to_string())));
        assert!(pairs.contains(&("minPrice", "5".to_string())));
        assert!(pairs.contains(&("sort", "price_desc".to_string())));
        assert!(pairs.contains(&("limit", "12".to_string())));
        assert!(!pairs.iter().any(|(k, _)| *k == "maxPrice"));
    }

    #[test]
    fn test_href_encodes_search() {
        let query = CatalogQuery {
            search: Some("red & blue".to_string()),
            ..CatalogQuery::default()
        };
        assert_eq!(query.href_for_page(3), "/products?search=red%20%26%20blue&page=3");
    }

    #[test]
    fn test_unknown_sort_falls_back() {
        assert_eq!(SortOrder::parse_or_default(Some("random")), SortOrder::Newest);
    }

    #[test]
    fn test_page_window() {
        let window = PageWindow::new(5, 10, 1);
        assert_eq!(
            window.links,
            vec![Some(1), None, Some(4), Some(5), Some(6), None, Some(10)]
        );
        assert_eq!(window.prev(), Some(4));
        assert_eq!(window.next(), Some(6));

        let single = PageWindow::new(3, 0, 2);
        assert_eq!(single.links, vec![Some(1)]);
        assert_eq!(single.next(), None);
    }

    #[test]
    fn test_product_wire_format() {
        let json = r#"{
            "_id": "p1", "name": "Mug", "price": 12.5, "discountPrice": 10,
            "category": {"_id": "c1", "name": "Kitchen"},
            "images": ["/img/mug.jpg"], "countInStock": 0, "rating": 4.5, "numReviews": 8
        }"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.effective_price(), Money::from_cents(1000));
        assert!(product.on_sale());
        assert!(!product.in_stock());
        assert_eq!(product.category.unwrap().name(), "Kitchen");
    }

    #[test]
    fn test_product_ref_variants() {
        let bare: ProductRef = serde_json::from_str("\"p9\"").unwrap();
        assert_eq!(bare.id().as_str(), "p9");
        let populated: ProductRef =
            serde_json::from_str(r#"{"_id": "p9", "name": "Lamp"}"#).unwrap();
        assert_eq!(populated.name(), Some("Lamp"));
    }
}
