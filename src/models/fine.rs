//! Fine configuration and fine update results

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// The single persisted daily fine rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct FineConfig {
    pub daily_rate: Decimal,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<String>,
}

/// Fine recomputed for one overdue record
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FineUpdate {
    pub record_id: Uuid,
    pub days_overdue: i64,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub fine_amount: Decimal,
}
