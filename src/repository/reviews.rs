//! Book reviews repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::review::{NewReview, Review, ReviewWithAuthor},
};

use super::retry::{with_db_retry, RetryPolicy};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReviewStore: Send + Sync {
    async fn exists(&self, user_id: Uuid, book_id: Uuid) -> AppResult<bool>;

    /// Insert a review and refresh the book rating; `None` when the user already reviewed the book
    async fn create(&self, review: &NewReview) -> AppResult<Option<Review>>;

    async fn list_for_book(&self, book_id: Uuid) -> AppResult<Vec<ReviewWithAuthor>>;
}

#[derive(Clone)]
pub struct ReviewsRepository {
    pool: Pool<Postgres>,
    retry: RetryPolicy,
}

impl ReviewsRepository {
    pub fn new(pool: Pool<Postgres>, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }
}

#[async_trait]
impl ReviewStore for ReviewsRepository {
    async fn exists(&self, user_id: Uuid, book_id: Uuid) -> AppResult<bool> {
        let pool = &self.pool;
        let exists = with_db_retry(self.retry, move || {
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM book_reviews WHERE user_id = $1 AND book_id = $2)",
            )
            .bind(user_id)
            .bind(book_id)
            .fetch_one(pool)
        })
        .await?;
        Ok(exists)
    }

    async fn create(&self, review: &NewReview) -> AppResult<Option<Review>> {
        let pool = &self.pool;
        let mut tx = with_db_retry(self.retry, move || pool.begin()).await?;

        let created = sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO book_reviews (id, user_id, book_id, rating, comment)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, book_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(review.user_id)
        .bind(review.book_id)
        .bind(review.rating)
        .bind(review.comment.trim())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(created) = created else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            r#"
            UPDATE books
            SET rating = (SELECT ROUND(AVG(rating)::numeric, 1)::float8 FROM book_reviews WHERE book_id = $1),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(review.book_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(created))
    }

    async fn list_for_book(&self, book_id: Uuid) -> AppResult<Vec<ReviewWithAuthor>> {
        let pool = &self.pool;
        let reviews = with_db_retry(self.retry, move || {
            sqlx::query_as::<_, ReviewWithAuthor>(
                r#"
                SELECT r.id, r.rating, r.comment, r.created_at, r.updated_at, u.full_name AS user_full_name
                FROM book_reviews r
                JOIN users u ON u.id = r.user_id
                WHERE r.book_id = $1
                ORDER BY r.created_at DESC
                "#,
            )
            .bind(book_id)
            .fetch_all(pool)
        })
        .await?;
        Ok(reviews)
    }
}
