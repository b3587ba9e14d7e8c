//! Borrow record model and lifecycle types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Borrow record lifecycle: PENDING -> BORROWED -> RETURNED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "borrow_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BorrowStatus {
    Pending,
    Borrowed,
    Returned,
}

impl BorrowStatus {
    /// Open records block a second request for the same book
    pub fn is_open(&self) -> bool {
        matches!(self, BorrowStatus::Pending | BorrowStatus::Borrowed)
    }
}

/// Borrow record from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub borrow_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: BorrowStatus,
    pub borrowed_by: Option<String>,
    pub returned_by: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub fine_amount: Decimal,
    pub notes: Option<String>,
    pub renewal_count: i32,
    pub last_reminder_sent: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BorrowRecord {
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.status == BorrowStatus::Borrowed && self.due_date.map(|d| d < now).unwrap_or(false)
    }
}

/// A user's own borrow record with book details
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserBorrow {
    pub id: Uuid,
    pub book_id: Uuid,
    pub book_title: String,
    pub book_author: String,
    pub book_cover_url: String,
    pub borrow_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: BorrowStatus,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub fine_amount: Decimal,
    pub renewal_count: i32,
    pub created_at: DateTime<Utc>,
}

/// Borrow record joined with user and book for the admin request queue
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRequestDetails {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub borrow_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: BorrowStatus,
    pub borrowed_by: Option<String>,
    pub returned_by: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub fine_amount: Decimal,
    pub notes: Option<String>,
    pub renewal_count: i32,
    pub last_reminder_sent: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub user_name: String,
    pub user_email: String,
    pub user_university_id: i32,
    pub book_title: String,
    pub book_author: String,
    pub book_genre: String,
    pub book_cover_url: String,
    pub book_cover_color: String,
}

/// Admin borrow request filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BorrowRequestQuery {
    pub status: Option<BorrowStatus>,
    /// Matches book title/author, user name/email or university id
    pub search: Option<String>,
}

/// Request body for a new borrow request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct BorrowRequestBody {
    pub notes: Option<String>,
}

/// Values written when a pending request is approved
#[derive(Debug, Clone, PartialEq)]
pub struct Approval {
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub approved_by: String,
}

/// Values written when a loan is closed
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSettlement {
    pub return_date: DateTime<Utc>,
    pub fine_amount: Decimal,
    pub returned_by: String,
}

/// Result of the conditional PENDING -> BORROWED transition
#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalOutcome {
    Approved(BorrowRecord),
    NotPending,
    NoCopiesAvailable,
}

/// Result of the conditional BORROWED -> RETURNED transition
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnOutcome {
    Returned(BorrowRecord),
    NotBorrowed,
}

/// Result of the conditional renewal update
#[derive(Debug, Clone, PartialEq)]
pub enum RenewalOutcome {
    Renewed(BorrowRecord),
    NotBorrowed,
    LimitReached,
}
