//! Catalog endpoints, cached for a minute.

use std::time::Duration;

use moka::future::Cache;
use shopfront_core::ProductId;
use shopfront_core::catalog::{CatalogQuery, Category, Product, ProductPage};
use tracing::{debug, instrument};

use super::{ApiClient, ApiError, segment};

/// Cache key for catalog reads.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    /// Rendered query string of a listing.
    Products(String),
    Product(ProductId),
    Categories,
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Products(ProductPage),
    Product(Box<Product>),
    Categories(Vec<Category>),
}

pub(super) fn build_cache() -> Cache<CacheKey, CacheValue> {
    Cache::builder()
        .max_capacity(1000)
        .time_to_live(Duration::from_secs(60))
        .build()
}

impl ApiClient {
    /// One page of products matching `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn products(&self, query: &CatalogQuery, limit: u32) -> Result<ProductPage, ApiError> {
        let pairs = query.to_pairs(limit);
        let cache_key = CacheKey::Products(
            pairs
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("&"),
        );

        if let Some(CacheValue::Products(page)) = self.cache().get(&cache_key).await {
            debug!("Cache hit for product listing");
            return Ok(page);
        }

        let page: ProductPage = self
            .send(self.request(reqwest::Method::GET, "/products", None).query(&pairs))
            .await?;

        self.cache()
            .insert(cache_key, CacheValue::Products(page.clone()))
            .await;
        Ok(page)
    }

    /// A single product.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for an unknown id.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn product(&self, id: &ProductId) -> Result<Product, ApiError> {
        let cache_key = CacheKey::Product(id.clone());
        if let Some(CacheValue::Product(product)) = self.cache().get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let path = format!("/products/{}", segment(id.as_str())?);
        let product: Product = self.get(&path, None).await?;
        self.cache()
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;
        Ok(product)
    }

    /// All categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        if let Some(CacheValue::Categories(list)) = self.cache().get(&CacheKey::Categories).await {
            return Ok(list);
        }

        let list: Vec<Category> = self.get("/categories", None).await?;
        self.cache()
            .insert(CacheKey::Categories, CacheValue::Categories(list.clone()))
            .await;
        Ok(list)
    }

    /// Drop a product from the cache (after stock changed through an order).
    pub async fn invalidate_product(&self, id: &ProductId) {
        self.cache().invalidate(&CacheKey::Product(id.clone())).await;
    }
}
