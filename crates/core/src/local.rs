//! Per-visitor lists kept in the session: recently viewed products and the
//! wishlist.

use serde::{Deserialize, Serialize};

use crate::types::{Money, ProductId};

/// How many recently viewed products are remembered.
pub const RECENTLY_VIEWED_CAP: usize = 10;

/// Just enough of a product to render a card without a backend call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub price: Money,
}

impl From<&crate::catalog::Product> for ProductSnapshot {
    fn from(product: &crate::catalog::Product) -> Self {
        Self {
            id: product.id.clone(),
            name: product.name.clone(),
            image: product.primary_image().map(str::to_owned),
            price: product.effective_price(),
        }
    }
}

/// Most recent first, no duplicates, at most [`RECENTLY_VIEWED_CAP`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecentlyViewed(Vec<ProductSnapshot>);

impl RecentlyViewed {
    /// Record a view, moving the product to the front.
    pub fn record(&mut self, product: ProductSnapshot) {
        self.0.retain(|p| p.id != product.id);
        self.0.insert(0, product);
        self.0.truncate(RECENTLY_VIEWED_CAP);
    }

    /// Entries, most recent first.
    #[must_use]
    pub fn items(&self) -> &[ProductSnapshot] {
        &self.0
    }

    /// Entries other than `id`, for "recently viewed" rails on a product page.
    pub fn excluding<'a>(&'a self, id: &'a ProductId) -> impl Iterator<Item = &'a ProductSnapshot> {
        self.0.iter().filter(move |p| &p.id != id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Wishlist in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wishlist(Vec<ProductSnapshot>);

impl Wishlist {
    /// Add the product if absent, remove it if present. Returns whether it is
    /// now on the list.
    pub fn toggle(&mut self, product: ProductSnapshot) -> bool {
        if let Some(index) = self.0.iter().position(|p| p.id == product.id) {
            self.0.remove(index);
            false
        } else {
            self.0.push(product);
            true
        }
    }

    /// Remove by id. Returns whether anything was removed.
    pub fn remove(&mut self, id: &ProductId) -> bool {
        let before = self.0.len();
        self.0.retain(|p| &p.id != id);
        self.0.len() != before
    }

    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        self.0.iter().any(|p| &p.id == id)
    }

    #[must_use]
    pub fn items(&self) -> &[ProductSnapshot] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
