//! Book (catalog) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub rating: f64,
    pub total_copies: i32,
    pub available_copies: i32,
    pub description: String,
    pub summary: String,
    pub cover_url: String,
    pub cover_color: String,
    pub isbn: Option<String>,
    pub publisher: Option<String>,
    pub publication_year: Option<i32>,
    pub language: Option<String>,
    pub page_count: Option<i32>,
    pub edition: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    pub fn has_available_copy(&self) -> bool {
        self.available_copies > 0
    }
}

/// Compact book representation for lists and recommendations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub rating: f64,
    pub cover_url: String,
    pub cover_color: String,
    pub available_copies: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BookSort {
    #[default]
    Title,
    Author,
    Rating,
    Date,
}

impl BookSort {
    pub fn order_clause(&self) -> &'static str {
        match self {
            BookSort::Title => "title ASC",
            BookSort::Author => "author ASC",
            BookSort::Rating => "rating DESC",
            BookSort::Date => "created_at DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    Unavailable,
}

/// Catalog query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Case-insensitive match on title or author
    pub search: Option<String>,
    pub genre: Option<String>,
    pub availability: Option<Availability>,
    /// Minimum rating
    pub rating: Option<f64>,
    pub sort: Option<BookSort>,
    pub page: Option<i64>,
}

impl BookQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn offset(&self, page_size: i64) -> i64 {
        (self.page() - 1) * page_size
    }
}

/// Create book request (admin)
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1, max = 255))]
    pub author: String,
    #[validate(length(min = 1))]
    pub genre: String,
    #[validate(range(min = 0, max = 10_000))]
    pub total_copies: i32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub cover_url: String,
    #[validate(length(equal = 7, message = "Cover color must be a #rrggbb value"))]
    pub cover_color: Option<String>,
    pub isbn: Option<String>,
    pub publisher: Option<String>,
    #[validate(range(min = 0, max = 3000))]
    pub publication_year: Option<i32>,
    pub language: Option<String>,
    #[validate(range(min = 1))]
    pub page_count: Option<i32>,
    pub edition: Option<String>,
}

/// Update book request (admin); absent fields keep their value
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub author: Option<String>,
    pub genre: Option<String>,
    /// New total; available copies shift by the same delta
    #[validate(range(min = 0, max = 10_000))]
    pub total_copies: Option<i32>,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub cover_url: Option<String>,
    #[validate(length(equal = 7))]
    pub cover_color: Option<String>,
    pub isbn: Option<String>,
    pub publisher: Option<String>,
    pub publication_year: Option<i32>,
    pub language: Option<String>,
    pub page_count: Option<i32>,
    pub edition: Option<String>,
    pub is_active: Option<bool>,
}
