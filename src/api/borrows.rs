//! Borrowing endpoints: requests, approvals, returns and renewals

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::borrow::{BorrowRecord, BorrowRequestBody, BorrowRequestDetails, BorrowRequestQuery, UserBorrow},
};

use super::{AdminUser, AuthenticatedUser};

#[derive(Serialize, ToSchema)]
pub struct BorrowRecordResponse {
    pub success: bool,
    pub record: BorrowRecord,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct UserBorrowsResponse {
    pub success: bool,
    pub records: Vec<UserBorrow>,
}

#[derive(Serialize, ToSchema)]
pub struct BorrowRequestsResponse {
    pub success: bool,
    pub requests: Vec<BorrowRequestDetails>,
}

fn record_response(record: BorrowRecord, message: &str) -> Json<BorrowRecordResponse> {
    Json(BorrowRecordResponse {
        success: true,
        record,
        message: message.to_string(),
    })
}

/// Request to borrow a book
#[utoipa::path(
    post,
    path = "/books/{id}/borrow",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    request_body(content = BorrowRequestBody, description = "Optional notes for the librarian"),
    responses(
        (status = 201, description = "Request created", body = BorrowRecordResponse),
        (status = 200, description = "Rejected by a borrowing rule", body = crate::error::ErrorResponse),
        (status = 404, description = "Book or user not found")
    )
)]
pub async fn request_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(book_id): Path<Uuid>,
    body: Option<Json<BorrowRequestBody>>,
) -> AppResult<(StatusCode, Json<BorrowRecordResponse>)> {
    let notes = body.and_then(|Json(body)| body.notes);
    let record = state.services.borrows.request_borrow(claims.sub, book_id, notes).await?;

    Ok((
        StatusCode::CREATED,
        record_response(record, "Borrow request submitted and awaiting approval"),
    ))
}

/// The current user's borrow records
#[utoipa::path(
    get,
    path = "/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Borrow records", body = UserBorrowsResponse)
    )
)]
pub async fn list_my_borrows(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<UserBorrowsResponse>> {
    let records = state.services.borrows.list_for_user(claims.sub).await?;
    Ok(Json(UserBorrowsResponse { success: true, records }))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/borrows/{id}/return",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Borrow record ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = BorrowRecordResponse),
        (status = 403, description = "Not the borrower"),
        (status = 404, description = "Borrow record not found")
    )
)]
pub async fn return_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(record_id): Path<Uuid>,
) -> AppResult<Json<BorrowRecordResponse>> {
    state.services.borrows.get_owned(record_id, &claims).await?;
    let record = state.services.borrows.return_book(record_id, &claims.email).await?;
    Ok(record_response(record, "Book returned successfully"))
}

/// Extend the due date of a loan
#[utoipa::path(
    post,
    path = "/borrows/{id}/renew",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Borrow record ID")
    ),
    responses(
        (status = 200, description = "Loan renewed, or rejected by a renewal rule", body = BorrowRecordResponse),
        (status = 403, description = "Not the borrower"),
        (status = 404, description = "Borrow record not found")
    )
)]
pub async fn renew_borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(record_id): Path<Uuid>,
) -> AppResult<Json<BorrowRecordResponse>> {
    state.services.borrows.get_owned(record_id, &claims).await?;
    let record = state.services.borrows.renew_borrow(record_id).await?;
    Ok(record_response(record, "Loan renewed"))
}

/// Borrow requests queue with user and book details
#[utoipa::path(
    get,
    path = "/admin/borrow-requests",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(BorrowRequestQuery),
    responses(
        (status = 200, description = "Borrow requests", body = BorrowRequestsResponse),
        (status = 403, description = "Admin access required")
    )
)]
pub async fn list_borrow_requests(
    State(state): State<crate::AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<BorrowRequestQuery>,
) -> AppResult<Json<BorrowRequestsResponse>> {
    let requests = state.services.borrows.list_requests(&query).await?;
    Ok(Json(BorrowRequestsResponse { success: true, requests }))
}

/// Approve a pending request, taking one copy off the shelf
#[utoipa::path(
    post,
    path = "/admin/borrow-requests/{id}/approve",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Borrow record ID")
    ),
    responses(
        (status = 200, description = "Request approved, or rejected as not pending / no copies", body = BorrowRecordResponse),
        (status = 404, description = "Borrow record not found")
    )
)]
pub async fn approve_borrow(
    State(state): State<crate::AppState>,
    AdminUser(admin): AdminUser,
    Path(record_id): Path<Uuid>,
) -> AppResult<Json<BorrowRecordResponse>> {
    let record = state.services.borrows.approve_borrow(record_id, &admin.email).await?;
    Ok(record_response(record, "Borrow request approved"))
}

/// Record a return at the desk
#[utoipa::path(
    post,
    path = "/admin/borrow-requests/{id}/return",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Borrow record ID")
    ),
    responses(
        (status = 200, description = "Book returned, or rejected as not borrowed", body = BorrowRecordResponse),
        (status = 404, description = "Borrow record not found")
    )
)]
pub async fn admin_return_borrow(
    State(state): State<crate::AppState>,
    AdminUser(admin): AdminUser,
    Path(record_id): Path<Uuid>,
) -> AppResult<Json<BorrowRecordResponse>> {
    let record = state.services.borrows.return_book(record_id, &admin.email).await?;
    Ok(record_response(record, "Book returned successfully"))
}
