//! Statistics endpoints

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    services::stats::{DashboardStats, ExportStats},
};

use super::AdminUser;

#[derive(Serialize, ToSchema)]
pub struct DashboardResponse {
    pub success: bool,
    pub stats: DashboardStats,
}

#[derive(Serialize, ToSchema)]
pub struct ExportStatsResponse {
    pub success: bool,
    pub stats: ExportStats,
}

/// Dashboard counts, breakdowns and the daily borrow/return trend
#[utoipa::path(
    get,
    path = "/admin/stats",
    tag = "stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard statistics", body = DashboardResponse),
        (status = 403, description = "Admin access required")
    )
)]
pub async fn get_stats(
    State(state): State<crate::AppState>,
    AdminUser(_admin): AdminUser,
) -> AppResult<Json<DashboardResponse>> {
    let stats = state.services.stats.dashboard().await?;
    Ok(Json(DashboardResponse { success: true, stats }))
}

/// Totals shown beside the export buttons
#[utoipa::path(
    get,
    path = "/admin/export-stats",
    tag = "stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Export totals", body = ExportStatsResponse)
    )
)]
pub async fn get_export_stats(
    State(state): State<crate::AppState>,
    AdminUser(_admin): AdminUser,
) -> AppResult<Json<ExportStatsResponse>> {
    let stats = state.services.stats.export_stats().await?;
    Ok(Json(ExportStatsResponse { success: true, stats }))
}
