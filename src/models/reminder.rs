//! Reminder candidates and batch results

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum ReminderKind {
    DueSoon,
    Overdue,
}

/// Borrowed record selected for a reminder, with contact details
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ReminderCandidate {
    pub record_id: Uuid,
    pub user_email: String,
    pub user_name: String,
    pub book_title: String,
    pub due_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Sent,
    Failed,
}

/// Outcome of one reminder in a batch
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReminderResult {
    pub record_id: Uuid,
    pub user_email: String,
    pub book_title: String,
    pub kind: ReminderKind,
    pub status: ReminderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReminderStats {
    pub due_soon: i64,
    pub overdue: i64,
    pub reminders_sent_today: i64,
}
