//! Product reviews.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::ProductRef;
use crate::order::Order;
use crate::types::{OrderStatus, ProductId, ReviewId, ReviewStatus};
use crate::validation::ValidationError;

/// Shortest accepted comment, after trimming.
pub const MIN_COMMENT_CHARS: usize = 10;
/// Longest accepted comment, after trimming.
pub const MAX_COMMENT_CHARS: usize = 1000;

/// A review as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(rename = "_id", alias = "id")]
    pub id: ReviewId,
    pub product: ProductRef,
    /// Reviewer display name.
    #[serde(default, alias = "name")]
    pub author: Option<String>,
    pub rating: u8,
    pub comment: String,
    #[serde(default)]
    pub status: ReviewStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Review {
    /// Filled and empty stars for the template, e.g. `(4, 1)`.
    #[must_use]
    pub fn stars(&self) -> (u8, u8) {
        let filled = self.rating.min(5);
        (filled, 5 - filled)
    }
}

/// Review form input; also the backend create/update body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewInput {
    pub product: ProductId,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

impl ReviewInput {
    /// Validate and trim the comment.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for a rating outside 1..=5 or a comment
    /// outside the allowed length.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if !(1..=5).contains(&self.rating) {
            return Err(ValidationError::new("rating", "Choose a rating from 1 to 5 stars"));
        }
        let comment = self.comment.trim();
        let chars = comment.chars().count();
        if chars < MIN_COMMENT_CHARS {
            return Err(ValidationError::new(
                "comment",
                format!("Review must be at least {MIN_COMMENT_CHARS} characters"),
            ));
        }
        if chars > MAX_COMMENT_CHARS {
            return Err(ValidationError::new(
                "comment",
                format!("Review must be at most {MAX_COMMENT_CHARS} characters"),
            ));
        }
        Ok(Self {
            comment: comment.to_string(),
            ..self
        })
    }
}

/// A product the shopper received and has not reviewed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reviewable {
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
}

/// Products from delivered orders without a review by this shopper, in order
/// of first appearance.
#[must_use]
pub fn reviewable_products(orders: &[Order], my_reviews: &[Review]) -> Vec<Reviewable> {
    let mut seen: HashSet<&ProductId> = my_reviews.iter().map(|r| r.product.id()).collect();
    let mut out = Vec::new();
    for order in orders.iter().filter(|o| o.status == OrderStatus::Delivered) {
        for item in &order.items {
            let id = item.product.id();
            if seen.insert(id) {
                out.push(Reviewable {
                    product_id: id.clone(),
                    name: item.name.clone(),
                    image: item.image.clone(),
                });
            }
        }
    }
    out
}

/// My reviews split into (pending or declined, approved).
#[must_use]
pub fn split_by_status(reviews: Vec<Review>) -> (Vec<Review>, Vec<Review>) {
    let (approved, pending): (Vec<_>, Vec<_>) = reviews
        .into_iter()
        .partition(|r| r.status == ReviewStatus::Approved);
    (pending, approved)
}

/// Average rating, `None` for no reviews.
#[must_use]
pub fn average_rating(reviews: &[Review]) -> Option<f64> {
    if reviews.is_empty() {
        return None;
    }
    let total: u32 = reviews.iter().map(|r| u32::from(r.rating)).sum();
    #[allow(clippy::cast_precision_loss)]
    Some(f64::from(total) / reviews.len() as f64)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::address::ShippingAddress;
    use crate::order::OrderItem;
    use crate::types::{Money, OrderId, PaymentMethod};

    fn review(id: &str, product: &str, status: ReviewStatus) -> Review {
        Review {
            id: ReviewId::new(id),
            product: ProductRef::Id(ProductId::new(product)),
            author: Some("Ada".to_string()),
            rating: 4,
            comment: "Lovely lamp, bright and warm.".to_string(),
            status,
            created_at: None,
        }
    }

    fn order(id: &str, status: OrderStatus, products: &[&str]) -> Order {
        Order {
            id: OrderId::new(id),
            order_number: None,
            items: products
                .iter()
                .map(|p| OrderItem {
                    product: ProductRef::Id(ProductId::new(*p)),
                    name: format!("Product {p}"),
                    image: None,
                    price: Money::from_cents(1000),
                    quantity: 1,
                })
                .collect(),
            shipping_address: ShippingAddress {
                full_name: "Ada".to_string(),
                street: "1 St".to_string(),
                city: "Town".to_string(),
                state: None,
                postal_code: "1".to_string(),
                country: "UK".to_string(),
                phone: None,
            },
            payment_method: PaymentMethod::Card,
            status,
            items_price: Money::from_cents(1000),
            discount: Money::ZERO,
            shipping_price: Money::ZERO,
            total_price: Money::from_cents(1000),
            promo_code: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_validate_rating_and_comment() {
        let input = ReviewInput {
            product: ProductId::new("p1"),
            rating: 5,
            comment: "   Works exactly as described.  ".to_string(),
        };
        assert_eq!(input.clone().validate().unwrap().comment, "Works exactly as described.");

        let zero = ReviewInput { rating: 0, ..input.clone() };
        assert_eq!(zero.validate().unwrap_err().field, "rating");

        let short = ReviewInput {
            comment: "  meh      ".to_string(),
            ..input.clone()
        };
        assert_eq!(short.validate().unwrap_err().field, "comment");

        let long = ReviewInput {
            comment: "x".repeat(1001),
            ..input
        };
        assert_eq!(long.validate().unwrap_err().field, "comment");
    }

    #[test]
    fn test_reviewable_products_skips_reviewed_and_undelivered() {
        let orders = vec![
            order("o1", OrderStatus::Delivered, &["a", "b"]),
            order("o2", OrderStatus::Shipped, &["c"]),
            order("o3", OrderStatus::Delivered, &["b", "d"]),
        ];
        let mine = vec![review("r1", "a", ReviewStatus::Pending)];
        let ids: Vec<_> = reviewable_products(&orders, &mine)
            .into_iter()
            .map(|r| r.product_id.to_string())
            .collect();
        assert_eq!(ids, vec!["b", "d"]);
    }

    #[test]
    fn test_split_by_status() {
        let (pending, approved) = split_by_status(vec![
            review("1", "a", ReviewStatus::Approved),
            review("2", "b", ReviewStatus::Pending),
            review("3", "c", ReviewStatus::Declined),
        ]);
        assert_eq!(pending.len(), 2);
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].id.as_str(), "1");
    }

    #[test]
    fn test_average_rating() {
        assert_eq!(average_rating(&[]), None);
        let mut low = review("2", "a", ReviewStatus::Approved);
        low.rating = 2;
        let avg = average_rating(&[review("1", "a", ReviewStatus::Approved), low]).unwrap();
        assert!((avg - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_wire_format_with_populated_product() {
        let json = r#"{"_id":"r9","product":{"_id":"p1","name":"Lamp"},"name":"Ada","rating":3,"comment":"Fine enough lamp.","status":"approved"}"#;
        let review: Review = serde_json::from_str(json).unwrap();
        assert_eq!(review.product.name(), Some("Lamp"));
        assert_eq!(review.author.as_deref(), Some("Ada"));
        assert_eq!(review.stars(), (3, 2));
    }
}
