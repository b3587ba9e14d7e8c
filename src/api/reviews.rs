//! Book review endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::review::{CreateReview, Review, ReviewEligibility, ReviewWithAuthor},
};

use super::{AuthenticatedUser, ValidatedJson};

#[derive(Serialize, ToSchema)]
pub struct ReviewListResponse {
    pub success: bool,
    pub reviews: Vec<ReviewWithAuthor>,
}

#[derive(Serialize, ToSchema)]
pub struct EligibilityResponse {
    pub success: bool,
    #[serde(flatten)]
    pub eligibility: ReviewEligibility,
}

#[derive(Serialize, ToSchema)]
pub struct ReviewResponse {
    pub success: bool,
    pub review: Review,
    pub message: String,
}

/// Reviews of a book, newest first
#[utoipa::path(
    get,
    path = "/books/{id}/reviews",
    tag = "reviews",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Reviews", body = ReviewListResponse)
    )
)]
pub async fn list_reviews(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(book_id): Path<Uuid>,
) -> AppResult<Json<ReviewListResponse>> {
    let reviews = state.services.reviews.list_for_book(book_id).await?;
    Ok(Json(ReviewListResponse { success: true, reviews }))
}

/// Whether the current user may review a book
#[utoipa::path(
    get,
    path = "/books/{id}/review-eligibility",
    tag = "reviews",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Eligibility", body = EligibilityResponse)
    )
)]
pub async fn review_eligibility(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(book_id): Path<Uuid>,
) -> AppResult<Json<EligibilityResponse>> {
    let eligibility = state.services.reviews.eligibility(claims.sub, book_id).await?;
    Ok(Json(EligibilityResponse {
        success: true,
        eligibility,
    }))
}

/// Review a returned book
#[utoipa::path(
    post,
    path = "/books/{id}/reviews",
    tag = "reviews",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    request_body = CreateReview,
    responses(
        (status = 201, description = "Review created", body = ReviewResponse),
        (status = 200, description = "Already reviewed or not eligible", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found")
    )
)]
pub async fn create_review(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(book_id): Path<Uuid>,
    ValidatedJson(review): ValidatedJson<CreateReview>,
) -> AppResult<(StatusCode, Json<ReviewResponse>)> {
    let review = state.services.reviews.create(claims.sub, book_id, review).await?;

    Ok((
        StatusCode::CREATED,
        Json(ReviewResponse {
            success: true,
            review,
            message: "Review submitted".to_string(),
        }),
    ))
}
