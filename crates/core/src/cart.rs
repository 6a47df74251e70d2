//! Shopping cart kept on the shopper's side until checkout.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Product;
use crate::types::{Money, ProductId};

/// Errors from cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Quantity must be at least 1 when adding.
    #[error("quantity must be at least 1")]
    ZeroQuantity,
    /// The product has no stock left.
    #[error("{0} is out of stock")]
    OutOfStock(String),
    /// The line is not in the cart.
    #[error("item is no longer in your cart")]
    UnknownItem,
}

/// One cart line: a product snapshot plus a quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub unit_price: Money,
    pub quantity: u32,
    /// Stock known when the product was added; `None` means unlimited.
    pub stock: Option<u32>,
}

impl CartItem {
    /// Snapshot a product for the cart.
    #[must_use]
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            image: product.primary_image().map(str::to_owned),
            unit_price: product.effective_price(),
            quantity,
            stock: product.stock,
        }
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }

    fn clamp(&self, quantity: u32) -> u32 {
        self.stock.map_or(quantity, |stock| quantity.min(stock))
    }
}

/// The cart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Add `item.quantity` units, merging with an existing line for the same
    /// product. Returns the quantity now in the cart for that product, which
    /// is capped at the known stock.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ZeroQuantity`] for a zero quantity and
    /// [`CartError::OutOfStock`] when stock is known to be zero.
    pub fn add(&mut self, item: CartItem) -> Result<u32, CartError> {
        if item.quantity == 0 {
            return Err(CartError::ZeroQuantity);
        }
        if item.stock == Some(0) {
            return Err(CartError::OutOfStock(item.name));
        }

        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|line| line.product_id == item.product_id)
        {
            // Fresh snapshot wins for price and stock.
            existing.unit_price = item.unit_price;
            existing.stock = item.stock;
            existing.name = item.name;
            existing.image = item.image;
            let wanted = existing.quantity.saturating_add(item.quantity);
            existing.quantity = existing.clamp(wanted);
            return Ok(existing.quantity);
        }

        let quantity = item.clamp(item.quantity);
        self.items.push(CartItem { quantity, ..item });
        Ok(quantity)
    }

    /// Set the quantity of a line. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::UnknownItem`] when the product is not in the cart.
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: u32) -> Result<u32, CartError> {
        if quantity == 0 {
            self.remove(product_id)?;
            return Ok(0);
        }
        let line = self
            .items
            .iter_mut()
            .find(|line| &line.product_id == product_id)
            .ok_or(CartError::UnknownItem)?;
        line.quantity = line.clamp(quantity).max(1);
        Ok(line.quantity)
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::UnknownItem`] when the product is not in the cart.
    pub fn remove(&mut self, product_id: &ProductId) -> Result<CartItem, CartError> {
        let index = self
            .items
            .iter()
            .position(|line| &line.product_id == product_id)
            .ok_or(CartError::UnknownItem)?;
        Ok(self.items.remove(index))
    }

    /// Empty the cart.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Total number of units.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|line| line.quantity).sum()
    }

    /// Sum of line totals.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(id: &str, cents: i64, quantity: u32, stock: Option<u32>) -> CartItem {
        CartItem {
            product_id: ProductId::new(id),
            name: format!("Product {id}"),
            image: None,
            unit_price: Money::from_cents(cents),
            quantity,
            stock,
        }
    }

    #[test]
    fn test_adding_increases_count_by_quantity() {
        let mut cart = Cart::new();
        cart.add(item("a", 1000, 2, None)).unwrap();
        let before = cart.item_count();
        cart.add(item("b", 250, 3, None)).unwrap();
        assert_eq!(cart.item_count(), before + 3);
        assert_eq!(cart.subtotal(), Money::from_cents(2750));
    }

    #[test]
    fn test_adding_same_product_merges_lines() {
        let mut cart = Cart::new();
        cart.add(item("a", 1000, 1, None)).unwrap();
        let quantity = cart.add(item("a", 900, 2, None)).unwrap();
        assert_eq!(quantity, 3);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.subtotal(), Money::from_cents(2700));
    }

    #[test]
    fn test_quantity_clamped_to_stock() {
        let mut cart = Cart::new();
        assert_eq!(cart.add(item("a", 100, 5, Some(3))).unwrap(), 3);
        assert_eq!(cart.add(item("a", 100, 1, Some(3))).unwrap(), 3);
        assert_eq!(cart.set_quantity(&ProductId::new("a"), 10).unwrap(), 3);
    }

    #[test]
    fn test_rejects_zero_and_out_of_stock() {
        let mut cart = Cart::new();
        assert_eq!(cart.add(item("a", 100, 0, None)), Err(CartError::ZeroQuantity));
        assert!(matches!(
            cart.add(item("b", 100, 1, Some(0))),
            Err(CartError::OutOfStock(_))
        ));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_last_write_wins_and_zero_removes() {
        let mut cart = Cart::new();
        cart.add(item("a", 100, 1, None)).unwrap();
        let id = ProductId::new("a");
        cart.set_quantity(&id, 4).unwrap();
        cart.set_quantity(&id, 2).unwrap();
        assert_eq!(cart.item_count(), 2);
        cart.set_quantity(&id, 0).unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.set_quantity(&id, 1), Err(CartError::UnknownItem));
    }

    #[test]
    fn test_clear() {
        let mut cart = Cart::new();
        cart.add(item("a", 100, 1, None)).unwrap();
        cart.clear();
        assert_eq!(cart.item_count(), 0);
        assert_eq!(cart.subtotal(), Money::ZERO);
    }
}
