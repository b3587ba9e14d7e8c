//! User administration endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::user::{UpdateUserRole, UpdateUserStatus, User, UserQuery},
    services::users::UserPage,
};

use super::{AdminUser, ValidatedJson};

#[derive(Serialize, ToSchema)]
pub struct UserListResponse {
    pub success: bool,
    #[serde(flatten)]
    pub page: UserPage,
}

#[derive(Serialize, ToSchema)]
pub struct UpdatedUserResponse {
    pub success: bool,
    pub user: User,
    pub message: String,
}

/// List users with search and filters
#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(UserQuery),
    responses(
        (status = 200, description = "List of users", body = UserListResponse),
        (status = 403, description = "Admin access required")
    )
)]
pub async fn list_users(
    State(state): State<crate::AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<UserListResponse>> {
    let page = state.services.users.list(&query).await?;
    Ok(Json(UserListResponse { success: true, page }))
}

/// Approve or reject an account
#[utoipa::path(
    put,
    path = "/admin/users/{id}/status",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    request_body = UpdateUserStatus,
    responses(
        (status = 200, description = "Status updated", body = UpdatedUserResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_user_status(
    State(state): State<crate::AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateUserStatus>,
) -> AppResult<Json<UpdatedUserResponse>> {
    let user = state.services.users.update_status(id, request.status, &admin.email).await?;
    Ok(Json(UpdatedUserResponse {
        success: true,
        user,
        message: "User status updated".to_string(),
    }))
}

/// Promote or demote a user
#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    request_body = UpdateUserRole,
    responses(
        (status = 200, description = "Role updated", body = UpdatedUserResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_user_role(
    State(state): State<crate::AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateUserRole>,
) -> AppResult<Json<UpdatedUserResponse>> {
    let user = state.services.users.update_role(id, request.role, &admin.email).await?;
    Ok(Json(UpdatedUserResponse {
        success: true,
        user,
        message: "User role updated".to_string(),
    }))
}
