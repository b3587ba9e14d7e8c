//! Single-row fine configuration

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{Pool, Postgres};

use crate::{error::AppResult, models::fine::FineConfig};

use super::retry::{with_db_retry, RetryPolicy};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FineRateStore: Send + Sync {
    /// Persisted rate, `None` until an admin sets one
    async fn current(&self) -> AppResult<Option<FineConfig>>;

    async fn set_rate(&self, daily_rate: Decimal, updated_by: &str) -> AppResult<FineConfig>;
}

#[derive(Clone)]
pub struct FineConfigRepository {
    pool: Pool<Postgres>,
    retry: RetryPolicy,
}

impl FineConfigRepository {
    pub fn new(pool: Pool<Postgres>, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }
}

#[async_trait]
impl FineRateStore for FineConfigRepository {
    async fn current(&self) -> AppResult<Option<FineConfig>> {
        let pool = &self.pool;
        let config = with_db_retry(self.retry, move || {
            sqlx::query_as::<_, FineConfig>(
                "SELECT daily_rate, updated_at, updated_by FROM fine_config WHERE id = 1",
            )
            .fetch_optional(pool)
        })
        .await?;
        Ok(config)
    }

    async fn set_rate(&self, daily_rate: Decimal, updated_by: &str) -> AppResult<FineConfig> {
        let pool = &self.pool;
        // Idempotent upsert, safe to retry
        let config = with_db_retry(self.retry, move || {
            sqlx::query_as::<_, FineConfig>(
                r#"
                INSERT INTO fine_config (id, daily_rate, updated_at, updated_by)
                VALUES (1, $1, NOW(), $2)
                ON CONFLICT (id) DO UPDATE
                SET daily_rate = EXCLUDED.daily_rate,
                    updated_at = EXCLUDED.updated_at,
                    updated_by = EXCLUDED.updated_by
                RETURNING daily_rate, updated_at, updated_by
                "#,
            )
            .bind(daily_rate)
            .bind(updated_by)
            .fetch_one(pool)
        })
        .await?;
        Ok(config)
    }
}
