//! Book reviews, gated on a completed loan

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult, Rejection},
    models::{
        borrow::BorrowStatus,
        review::{CreateReview, NewReview, Review, ReviewEligibility, ReviewWithAuthor},
    },
    repository::{books::BookStore, borrows::BorrowStore, reviews::ReviewStore},
};

#[derive(Clone)]
pub struct ReviewsService {
    reviews: Arc<dyn ReviewStore>,
    borrows: Arc<dyn BorrowStore>,
    books: Arc<dyn BookStore>,
}

impl ReviewsService {
    pub fn new(reviews: Arc<dyn ReviewStore>, borrows: Arc<dyn BorrowStore>, books: Arc<dyn BookStore>) -> Self {
        Self { reviews, borrows, books }
    }

    /// A user may review a book once, after returning it at least once
    pub async fn eligibility(&self, user_id: Uuid, book_id: Uuid) -> AppResult<ReviewEligibility> {
        let has_existing_review = self.reviews.exists(user_id, book_id).await?;
        let has_returned = self
            .borrows
            .has_record_with_status(user_id, book_id, BorrowStatus::Returned)
            .await?;
        let is_currently_borrowed = self
            .borrows
            .has_record_with_status(user_id, book_id, BorrowStatus::Borrowed)
            .await?;

        let reason = if has_existing_review {
            "You have already reviewed this book"
        } else if has_returned {
            "You can review this book"
        } else if is_currently_borrowed {
            "Return this book before reviewing it"
        } else {
            "You must borrow and return this book before reviewing it"
        };

        Ok(ReviewEligibility {
            can_review: has_returned && !has_existing_review,
            has_existing_review,
            is_currently_borrowed,
            reason: reason.to_string(),
        })
    }

    pub async fn create(&self, user_id: Uuid, book_id: Uuid, review: CreateReview) -> AppResult<Review> {
        if self.books.get(book_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Book with id {} not found", book_id)));
        }

        let eligibility = self.eligibility(user_id, book_id).await?;
        if eligibility.has_existing_review {
            return Err(Rejection::AlreadyReviewed.into());
        }
        if !eligibility.can_review {
            return Err(Rejection::NotEligibleToReview.into());
        }

        let created = self
            .reviews
            .create(&NewReview {
                user_id,
                book_id,
                rating: review.rating,
                comment: review.comment,
            })
            .await?
            .ok_or(AppError::Rejected(Rejection::AlreadyReviewed))?;

        tracing::info!(review_id = %created.id, %book_id, rating = created.rating, "Review created");
        Ok(created)
    }

    pub async fn list_for_book(&self, book_id: Uuid) -> AppResult<Vec<ReviewWithAuthor>> {
        self.reviews.list_for_book(book_id).await
    }
}
