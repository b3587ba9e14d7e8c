//! Books repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::book::{Availability, Book, BookQuery, CreateBook, UpdateBook},
};

use super::retry::{with_db_retry, RetryPolicy};

const DEFAULT_COVER_COLOR: &str = "#012B48";

/// Book lookups needed by the borrow lifecycle
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookStore: Send + Sync {
    async fn get(&self, id: Uuid) -> AppResult<Option<Book>>;
}

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
    retry: RetryPolicy,
}

/// Shared WHERE clause for catalog count and page queries
fn push_catalog_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &BookQuery) {
    builder.push(" WHERE is_active = TRUE");

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        builder
            .push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR author ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if let Some(genre) = query.genre.as_deref().filter(|g| !g.is_empty() && *g != "all") {
        builder.push(" AND genre = ").push_bind(genre.to_string());
    }

    match query.availability {
        Some(Availability::Available) => {
            builder.push(" AND available_copies > 0");
        }
        Some(Availability::Unavailable) => {
            builder.push(" AND available_copies = 0");
        }
        None => {}
    }

    if let Some(rating) = query.rating {
        builder.push(" AND rating >= ").push_bind(rating);
    }
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }

    /// Search active books with filters, sort and pagination; returns the page and total count
    pub async fn search(&self, query: &BookQuery, page_size: i64) -> AppResult<(Vec<Book>, i64)> {
        let pool = &self.pool;

        let total: i64 = with_db_retry(self.retry, move || async move {
            let mut count = QueryBuilder::new("SELECT COUNT(*) FROM books");
            push_catalog_filters(&mut count, query);
            count.build_query_scalar().fetch_one(pool).await
        })
        .await?;

        let sort = query.sort.unwrap_or_default();
        let offset = query.offset(page_size);
        let books = with_db_retry(self.retry, move || async move {
            let mut select = QueryBuilder::new("SELECT * FROM books");
            push_catalog_filters(&mut select, query);
            select
                .push(" ORDER BY ")
                .push(sort.order_clause())
                .push(", id LIMIT ")
                .push_bind(page_size)
                .push(" OFFSET ")
                .push_bind(offset);
            select.build_query_as::<Book>().fetch_all(pool).await
        })
        .await?;

        Ok((books, total))
    }

    /// Get book by ID, active or not
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Book> {
        self.find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Book>> {
        let pool = &self.pool;
        let book = with_db_retry(self.retry, move || {
            sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
        })
        .await?;
        Ok(book)
    }

    /// Distinct genres of active books
    pub async fn genres(&self) -> AppResult<Vec<String>> {
        let pool = &self.pool;
        let genres = with_db_retry(self.retry, move || {
            sqlx::query_scalar::<_, String>(
                "SELECT DISTINCT genre FROM books WHERE is_active = TRUE ORDER BY genre",
            )
            .fetch_all(pool)
        })
        .await?;
        Ok(genres)
    }

    /// Create a book with every copy available
    pub async fn create(&self, book: &CreateBook, created_by: &str) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (
                id, title, author, genre, total_copies, available_copies,
                description, summary, cover_url, cover_color,
                isbn, publisher, publication_year, language, page_count, edition,
                updated_by
            )
            VALUES ($1, $2, $3, $4, $5, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(book.title.trim())
        .bind(book.author.trim())
        .bind(book.genre.trim())
        .bind(book.total_copies)
        .bind(&book.description)
        .bind(&book.summary)
        .bind(&book.cover_url)
        .bind(book.cover_color.as_deref().unwrap_or(DEFAULT_COVER_COLOR))
        .bind(&book.isbn)
        .bind(&book.publisher)
        .bind(book.publication_year)
        .bind(&book.language)
        .bind(book.page_count)
        .bind(&book.edition)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Update a book. A new total shifts available copies by the same delta,
    /// and is refused when it would leave fewer copies than are on loan.
    pub async fn update(&self, id: Uuid, update: &UpdateBook, updated_by: &str) -> AppResult<Book> {
        let updated = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title = COALESCE($2, title),
                author = COALESCE($3, author),
                genre = COALESCE($4, genre),
                available_copies = available_copies + (COALESCE($5, total_copies) - total_copies),
                total_copies = COALESCE($5, total_copies),
                description = COALESCE($6, description),
                summary = COALESCE($7, summary),
                cover_url = COALESCE($8, cover_url),
                cover_color = COALESCE($9, cover_color),
                isbn = COALESCE($10, isbn),
                publisher = COALESCE($11, publisher),
                publication_year = COALESCE($12, publication_year),
                language = COALESCE($13, language),
                page_count = COALESCE($14, page_count),
                edition = COALESCE($15, edition),
                is_active = COALESCE($16, is_active),
                updated_at = NOW(),
                updated_by = $17
            WHERE id = $1
              AND available_copies + (COALESCE($5, total_copies) - total_copies) >= 0
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.title)
        .bind(&update.author)
        .bind(&update.genre)
        .bind(update.total_copies)
        .bind(&update.description)
        .bind(&update.summary)
        .bind(&update.cover_url)
        .bind(&update.cover_color)
        .bind(&update.isbn)
        .bind(&update.publisher)
        .bind(update.publication_year)
        .bind(&update.language)
        .bind(update.page_count)
        .bind(&update.edition)
        .bind(update.is_active)
        .bind(updated_by)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(book) => Ok(book),
            None => {
                // Distinguish a missing book from a total below the loaned count
                let book = self.get_by_id(id).await?;
                Err(AppError::Conflict(format!(
                    "Cannot reduce total copies below the {} copies currently on loan",
                    book.total_copies - book.available_copies
                )))
            }
        }
    }
}

#[async_trait]
impl BookStore for BooksRepository {
    async fn get(&self, id: Uuid) -> AppResult<Option<Book>> {
        self.find(id).await
    }
}
