//! Catalog service: book search and administration

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
    repository::Repository,
};

/// One page of catalog results
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookPage {
    pub books: Vec<Book>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl BookPage {
    pub fn new(books: Vec<Book>, total: i64, page: i64, page_size: i64) -> Self {
        let total_pages = if total == 0 { 0 } else { (total + page_size - 1) / page_size };
        Self {
            books,
            total,
            page,
            page_size,
            total_pages,
        }
    }
}

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    page_size: i64,
}

impl CatalogService {
    pub fn new(repository: Repository, page_size: i64) -> Self {
        Self {
            repository,
            page_size: page_size.max(1),
        }
    }

    pub async fn search(&self, query: &BookQuery) -> AppResult<BookPage> {
        let (books, total) = self.repository.books.search(query, self.page_size).await?;
        Ok(BookPage::new(books, total, query.page(), self.page_size))
    }

    pub async fn genres(&self) -> AppResult<Vec<String>> {
        self.repository.books.genres().await
    }

    /// Active book by id; deactivated books are hidden from readers
    pub async fn get_active(&self, id: Uuid) -> AppResult<Book> {
        let book = self.repository.books.get_by_id(id).await?;
        if !book.is_active {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(book)
    }

    pub async fn create(&self, book: &CreateBook, created_by: &str) -> AppResult<Book> {
        let created = self.repository.books.create(book, created_by).await?;
        tracing::info!(book_id = %created.id, copies = created.total_copies, "Book created");
        Ok(created)
    }

    pub async fn update(&self, id: Uuid, update: &UpdateBook, updated_by: &str) -> AppResult<Book> {
        let updated = self.repository.books.update(id, update, updated_by).await?;
        tracing::info!(
            book_id = %id,
            total = updated.total_copies,
            available = updated.available_copies,
            "Book updated"
        );
        Ok(updated)
    }
}
