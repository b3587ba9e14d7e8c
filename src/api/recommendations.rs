//! Recommendation and trending endpoints

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    services::recommendations::{Recommendation, TrendingBook, UserRecommendations},
};

use super::{AdminUser, AuthenticatedUser};

#[derive(Serialize, ToSchema)]
pub struct RecommendationsResponse {
    pub success: bool,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Serialize, ToSchema)]
pub struct TrendingResponse {
    pub success: bool,
    pub books: Vec<TrendingBook>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRecommendationsResponse {
    pub success: bool,
    pub message: String,
    pub results: Vec<UserRecommendations>,
    pub total_users: usize,
    pub total_recommendations: usize,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTrendingResponse {
    pub success: bool,
    pub message: String,
    pub trending_count: usize,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshCacheResponse {
    pub success: bool,
    pub message: String,
    pub cache_cleared: usize,
}

/// Books picked for the current user from their borrowing history
#[utoipa::path(
    get,
    path = "/books/recommendations",
    tag = "books",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Recommendations", body = RecommendationsResponse)
    )
)]
pub async fn my_recommendations(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<RecommendationsResponse>> {
    let recommendations = state.services.recommendations.for_user(claims.sub).await?;
    Ok(Json(RecommendationsResponse {
        success: true,
        recommendations,
    }))
}

/// Most borrowed books of the recent window
#[utoipa::path(
    get,
    path = "/books/trending",
    tag = "books",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Trending books", body = TrendingResponse)
    )
)]
pub async fn trending_books(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<TrendingResponse>> {
    let books = state.services.recommendations.trending().await?;
    Ok(Json(TrendingResponse { success: true, books }))
}

/// Recompute recommendations for every borrower
#[utoipa::path(
    post,
    path = "/admin/generate-recommendations",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Recommendations generated", body = GenerateRecommendationsResponse)
    )
)]
pub async fn generate_recommendations(
    State(state): State<crate::AppState>,
    AdminUser(_admin): AdminUser,
) -> AppResult<Json<GenerateRecommendationsResponse>> {
    let results = state.services.recommendations.generate_all().await?;
    let total_users = results.len();
    let total_recommendations = results.iter().map(|r| r.recommendations.len()).sum();

    Ok(Json(GenerateRecommendationsResponse {
        success: true,
        message: format!(
            "Generated {} recommendations for {} users.",
            total_recommendations, total_users
        ),
        results,
        total_users,
        total_recommendations,
    }))
}

/// Recompute the trending list
#[utoipa::path(
    post,
    path = "/admin/update-trending-books",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Trending books updated", body = UpdateTrendingResponse)
    )
)]
pub async fn update_trending_books(
    State(state): State<crate::AppState>,
    AdminUser(_admin): AdminUser,
) -> AppResult<Json<UpdateTrendingResponse>> {
    let trending = state.services.recommendations.update_trending().await?;
    Ok(Json(UpdateTrendingResponse {
        success: true,
        message: format!("Updated {} trending book(s).", trending.len()),
        trending_count: trending.len(),
    }))
}

/// Drop cached recommendations, trending books and dashboard stats
#[utoipa::path(
    post,
    path = "/admin/refresh-recommendation-cache",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Cache cleared", body = RefreshCacheResponse)
    )
)]
pub async fn refresh_recommendation_cache(
    State(state): State<crate::AppState>,
    AdminUser(_admin): AdminUser,
) -> AppResult<Json<RefreshCacheResponse>> {
    let cache_cleared = state.services.recommendations.refresh_cache().await?;
    Ok(Json(RefreshCacheResponse {
        success: true,
        message: format!("Cleared {} cached entries.", cache_cleared),
        cache_cleared,
    }))
}
