//! Reminder batch endpoints

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::reminder::{ReminderResult, ReminderStats, ReminderStatus},
};

use super::AdminUser;

#[derive(Serialize, ToSchema)]
pub struct ReminderBatchResponse {
    pub success: bool,
    pub message: String,
    pub results: Vec<ReminderResult>,
}

#[derive(Serialize, ToSchema)]
pub struct ReminderStatsResponse {
    pub success: bool,
    pub stats: ReminderStats,
}

fn batch_response(label: &str, results: Vec<ReminderResult>) -> Json<ReminderBatchResponse> {
    let sent = results
        .iter()
        .filter(|result| result.status == ReminderStatus::Sent)
        .count();

    Json(ReminderBatchResponse {
        success: true,
        message: format!(
            "Processed {} {} reminder(s). Sent {}.",
            results.len(),
            label,
            sent
        ),
        results,
    })
}

/// Email borrowers whose loans fall due soon
#[utoipa::path(
    post,
    path = "/admin/send-due-reminders",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Per-record outcome", body = ReminderBatchResponse),
        (status = 403, description = "Admin access required")
    )
)]
pub async fn send_due_reminders(
    State(state): State<crate::AppState>,
    AdminUser(_admin): AdminUser,
) -> AppResult<Json<ReminderBatchResponse>> {
    let results = state.services.reminders.send_due_reminders().await?;
    Ok(batch_response("due", results))
}

/// Email borrowers with overdue loans
#[utoipa::path(
    post,
    path = "/admin/send-overdue-reminders",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Per-record outcome", body = ReminderBatchResponse),
        (status = 403, description = "Admin access required")
    )
)]
pub async fn send_overdue_reminders(
    State(state): State<crate::AppState>,
    AdminUser(_admin): AdminUser,
) -> AppResult<Json<ReminderBatchResponse>> {
    let results = state.services.reminders.send_overdue_reminders().await?;
    Ok(batch_response("overdue", results))
}

/// Counts of due-soon and overdue loans and reminders sent today
#[utoipa::path(
    get,
    path = "/admin/reminder-stats",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Reminder statistics", body = ReminderStatsResponse)
    )
)]
pub async fn reminder_stats(
    State(state): State<crate::AppState>,
    AdminUser(_admin): AdminUser,
) -> AppResult<Json<ReminderStatsResponse>> {
    let stats = state.services.reminders.stats().await?;
    Ok(Json(ReminderStatsResponse { success: true, stats }))
}
