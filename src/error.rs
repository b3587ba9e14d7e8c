//! Error types for Athenaeum server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_with::skip_serializing_none;
use thiserror::Error;

/// Business rule violations reported to clients as `{success: false, reason}`
/// without an HTTP failure status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("No copies available")]
    NoCopiesAvailable,
    #[error("This book is not available for borrowing")]
    BookInactive,
    #[error("Your account must be approved before borrowing")]
    UserNotApproved,
    #[error("You already have an open request or loan for this book")]
    AlreadyRequested,
    #[error("Borrow request is not pending")]
    NotPending,
    #[error("Book is not currently borrowed")]
    NotBorrowed,
    #[error("Maximum renewals reached")]
    MaxRenewalsReached,
    #[error("Overdue loans cannot be renewed")]
    Overdue,
    #[error("You have already reviewed this book")]
    AlreadyReviewed,
    #[error("You must have borrowed this book to review it")]
    NotEligibleToReview,
}

impl Rejection {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::NoCopiesAvailable => "NO_COPIES_AVAILABLE",
            Rejection::BookInactive => "BOOK_INACTIVE",
            Rejection::UserNotApproved => "USER_NOT_APPROVED",
            Rejection::AlreadyRequested => "ALREADY_REQUESTED",
            Rejection::NotPending => "NOT_PENDING",
            Rejection::NotBorrowed => "NOT_BORROWED",
            Rejection::MaxRenewalsReached => "MAX_RENEWALS_REACHED",
            Rejection::Overdue => "OVERDUE",
            Rejection::AlreadyReviewed => "ALREADY_REVIEWED",
            Rejection::NotEligibleToReview => "NOT_ELIGIBLE_TO_REVIEW",
        }
    }
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Request rejected: {0}")]
    Rejected(Rejection),
}

impl From<Rejection> for AppError {
    fn from(rejection: Rejection) -> Self {
        AppError::Rejected(rejection)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[skip_serializing_none]
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub message: String,
    /// Present for business rule rejections
    pub reason: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message, reason) = match &self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, "Unauthorized", msg.clone(), None)
            }
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, "Forbidden", msg.clone(), None)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", msg.clone(), None),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "Invalid input", msg.clone(), None)
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    "A database error occurred, please try again later".to_string(),
                    None,
                )
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", msg.clone(), None),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "Bad request", msg.clone(), None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    "An unexpected error occurred".to_string(),
                    None,
                )
            }
            AppError::Rejected(rejection) => (
                StatusCode::OK,
                "Request rejected",
                rejection.to_string(),
                Some(rejection.code().to_string()),
            ),
        };

        let body = Json(ErrorResponse {
            success: false,
            error: error.to_string(),
            message,
            reason,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
