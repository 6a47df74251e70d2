//! "My reviews" route handlers.
//!
//! Lists the shopper's reviews by moderation status, plus the delivered
//! products still waiting for a review.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::Redirect,
};
use serde::Deserialize;
use shopfront_core::review::{Review, ReviewInput, Reviewable, reviewable_products, split_by_status};
use shopfront_core::{ProductId, ReviewId, ReviewStatus};
use tower_sessions::Session;
use tracing::instrument;

use super::shell::{Shell, short_date, star_glyphs};
use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::RequireUser;
use crate::state::AppState;
use crate::toast::{Toast, flash};

/// One of the shopper's reviews.
#[derive(Debug, Clone)]
pub struct MyReviewView {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub rating: u8,
    pub filled: u8,
    pub empty: u8,
    /// Filled and empty star glyphs.
    pub stars: String,
    pub comment: String,
    pub status_label: &'static str,
    pub declined: bool,
    pub date: Option<String>,
}

impl From<&Review> for MyReviewView {
    fn from(review: &Review) -> Self {
        let (filled, empty) = review.stars();
        Self {
            id: review.id.to_string(),
            product_id: review.product.id().to_string(),
            product_name: review.product.name().unwrap_or("Product").to_string(),
            rating: review.rating,
            filled,
            stars: star_glyphs(filled, empty),
            empty,
            comment: review.comment.clone(),
            status_label: review.status.label(),
            declined: review.status == ReviewStatus::Declined,
            date: review.created_at.as_ref().map(short_date),
        }
    }
}

/// A delivered product awaiting a review.
#[derive(Debug, Clone)]
pub struct ReviewableView {
    pub product_id: String,
    pub name: String,
    pub image: Option<String>,
}

impl From<&Reviewable> for ReviewableView {
    fn from(item: &Reviewable) -> Self {
        Self {
            product_id: item.product_id.to_string(),
            name: item.name.clone(),
            image: item.image.clone(),
        }
    }
}

/// Review form data (create and edit).
#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    pub product_id: String,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

impl ReviewForm {
    fn into_input(self) -> ReviewInput {
        ReviewInput {
            product: ProductId::new(self.product_id),
            rating: self.rating,
            comment: self.comment,
        }
    }
}

/// Reviews page template.
#[derive(Template, WebTemplate)]
#[template(path = "reviews/index.html")]
pub struct ReviewsTemplate {
    pub shell: Shell,
    pub to_review: Vec<ReviewableView>,
    pub pending: Vec<MyReviewView>,
    pub published: Vec<MyReviewView>,
}

/// Display my reviews and the products awaiting one.
#[instrument(skip(state, shell, token))]
pub async fn index(
    State(state): State<AppState>,
    shell: Shell,
    RequireUser(_user, token): RequireUser,
) -> Result<ReviewsTemplate> {
    let (reviews, orders) = tokio::try_join!(
        state.api().my_reviews(&token),
        state.api().my_orders(&token)
    )?;

    let to_review = reviewable_products(&orders, &reviews);
    let (pending, published) = split_by_status(reviews);

    Ok(ReviewsTemplate {
        shell,
        to_review: to_review.iter().map(ReviewableView::from).collect(),
        pending: pending.iter().map(MyReviewView::from).collect(),
        published: published.iter().map(MyReviewView::from).collect(),
    })
}

/// Submit a review.
#[instrument(skip(state, session, token, form), fields(product_id = %form.product_id))]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    RequireUser(_user, token): RequireUser,
    Form(form): Form<ReviewForm>,
) -> Result<Redirect> {
    let input = form.into_input().validate()?;
    state.api().create_review(&token, &input).await?;
    add_breadcrumb("reviews", "Review submitted", Some(&[("product_id", input.product.as_str())]));

    flash(&session, &Toast::success("Thanks! Your review will appear once approved.")).await;
    Ok(Redirect::to("/reviews"))
}

/// Edit a review. Edited reviews go back to moderation.
#[instrument(skip(state, session, token, form), fields(review_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireUser(_user, token): RequireUser,
    Path(id): Path<String>,
    Form(form): Form<ReviewForm>,
) -> Result<Redirect> {
    let input = form.into_input().validate()?;
    state.api().update_review(&token, &ReviewId::new(id), &input).await?;

    flash(&session, &Toast::success("Review updated")).await;
    Ok(Redirect::to("/reviews"))
}

/// Delete a review.
#[instrument(skip(state, session, token), fields(review_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    RequireUser(_user, token): RequireUser,
    Path(id): Path<String>,
) -> Result<Redirect> {
    state.api().delete_review(&token, &ReviewId::new(id)).await?;

    flash(&session, &Toast::info("Review deleted")).await;
    Ok(Redirect::to("/reviews"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopfront_core::catalog::ProductRef;

    #[test]
    fn test_review_view() {
        let review = Review {
            id: ReviewId::new("r1"),
            product: ProductRef::Summary {
                id: ProductId::new("p1"),
                name: Some("Desk Lamp".to_string()),
            },
            author: None,
            rating: 4,
            comment: "Bright and sturdy".to_string(),
            status: ReviewStatus::Declined,
            created_at: None,
        };
        let view = MyReviewView::from(&review);
        assert_eq!(view.product_name, "Desk Lamp");
        assert_eq!((view.filled, view.empty), (4, 1));
        assert!(view.declined);
        assert_eq!(view.status_label, "Declined");
    }

    #[test]
    fn test_form_validation_trims_comment() {
        let form = ReviewForm {
            product_id: "p1".to_string(),
            rating: 5,
            comment: "  Would buy again  ".to_string(),
        };
        let input = form.into_input().validate();
        assert_eq!(input.map(|i| i.comment).ok().as_deref(), Some("Would buy again"));

        let bad = ReviewForm {
            product_id: "p1".to_string(),
            rating: 0,
            comment: "Would buy again".to_string(),
        };
        assert!(bad.into_input().validate().is_err());
    }
}
