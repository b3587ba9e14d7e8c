//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{
    auth, books, borrows, export, fines, health, recommendations, reminders, reviews, stats, users,
};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Athenaeum API",
        version = "1.0.0",
        description = "University Library Management REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    modifiers(&BearerAuth),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::register,
        auth::login,
        auth::me,
        // Books
        books::list_books,
        books::list_genres,
        books::get_book,
        books::create_book,
        books::update_book,
        recommendations::my_recommendations,
        recommendations::trending_books,
        // Reviews
        reviews::list_reviews,
        reviews::review_eligibility,
        reviews::create_review,
        // Borrows
        borrows::request_borrow,
        borrows::list_my_borrows,
        borrows::return_borrow,
        borrows::renew_borrow,
        borrows::list_borrow_requests,
        borrows::approve_borrow,
        borrows::admin_return_borrow,
        // Users
        users::list_users,
        users::update_user_status,
        users::update_user_role,
        // Fines
        fines::get_fine_config,
        fines::update_fine_config,
        fines::update_overdue_fines,
        // Reminders
        reminders::send_due_reminders,
        reminders::send_overdue_reminders,
        reminders::reminder_stats,
        // Stats and export
        stats::get_stats,
        stats::get_export_stats,
        export::export_data,
        // Recommendation jobs
        recommendations::generate_recommendations,
        recommendations::update_trending_books,
        recommendations::refresh_recommendation_cache,
    ),
    components(
        schemas(
            // Auth
            auth::LoginRequest,
            auth::SessionResponse,
            auth::UserResponse,
            crate::services::auth::LoginResponse,
            // Books
            crate::models::book::Book,
            crate::models::book::BookSummary,
            crate::models::book::BookQuery,
            crate::models::book::BookSort,
            crate::models::book::Availability,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::services::catalog::BookPage,
            books::BookListResponse,
            books::BookResponse,
            books::GenresResponse,
            // Reviews
            crate::models::review::Review,
            crate::models::review::ReviewWithAuthor,
            crate::models::review::CreateReview,
            crate::models::review::ReviewEligibility,
            reviews::ReviewListResponse,
            reviews::EligibilityResponse,
            reviews::ReviewResponse,
            // Borrows
            crate::models::borrow::BorrowStatus,
            crate::models::borrow::BorrowRecord,
            crate::models::borrow::UserBorrow,
            crate::models::borrow::BorrowRequestDetails,
            crate::models::borrow::BorrowRequestBody,
            borrows::BorrowRecordResponse,
            borrows::UserBorrowsResponse,
            borrows::BorrowRequestsResponse,
            // Users
            crate::models::user::User,
            crate::models::user::UserSummary,
            crate::models::user::UserStatus,
            crate::models::user::UserRole,
            crate::models::user::RegisterUser,
            crate::models::user::UpdateUserStatus,
            crate::models::user::UpdateUserRole,
            crate::services::users::UserPage,
            users::UserListResponse,
            users::UpdatedUserResponse,
            // Fines
            crate::models::fine::FineUpdate,
            fines::FineConfigRequest,
            fines::FineConfigResponse,
            fines::UpdateFinesRequest,
            fines::UpdateFinesResponse,
            // Reminders
            crate::models::reminder::ReminderKind,
            crate::models::reminder::ReminderStatus,
            crate::models::reminder::ReminderResult,
            crate::models::reminder::ReminderStats,
            reminders::ReminderBatchResponse,
            reminders::ReminderStatsResponse,
            // Stats
            crate::services::stats::DashboardStats,
            crate::services::stats::UserCounts,
            crate::services::stats::BookCounts,
            crate::services::stats::BorrowCounts,
            crate::services::stats::RecentBorrow,
            crate::services::stats::RecentUser,
            crate::services::stats::GenreStats,
            crate::services::stats::LabelCount,
            crate::services::stats::TopRatedBook,
            crate::services::stats::TrendPoint,
            crate::services::stats::ExportStats,
            stats::DashboardResponse,
            stats::ExportStatsResponse,
            export::ExportForm,
            // Recommendations
            crate::services::recommendations::Recommendation,
            crate::services::recommendations::UserRecommendations,
            crate::services::recommendations::TrendingBook,
            recommendations::RecommendationsResponse,
            recommendations::TrendingResponse,
            recommendations::GenerateRecommendationsResponse,
            recommendations::UpdateTrendingResponse,
            recommendations::RefreshCacheResponse,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration and login"),
        (name = "books", description = "Catalog, recommendations and trending books"),
        (name = "reviews", description = "Book reviews"),
        (name = "borrows", description = "Borrow requests, returns and renewals"),
        (name = "stats", description = "Statistics"),
        (name = "admin", description = "Library administration")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
