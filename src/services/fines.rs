//! Overdue fine computation and the daily rate

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    error::{AppError, AppResult},
    models::{borrow::BorrowRecord, fine::{FineConfig, FineUpdate}},
    repository::{borrows::BorrowStore, fine_config::FineRateStore},
};

/// Whole days between due date and reference date, zero when not late
pub fn days_late(due_date: DateTime<Utc>, reference: DateTime<Utc>) -> i64 {
    (reference - due_date).num_days().max(0)
}

/// `days_late * daily_rate`, never negative
pub fn compute_fine(due_date: DateTime<Utc>, reference: DateTime<Utc>, daily_rate: Decimal) -> Decimal {
    (Decimal::from(days_late(due_date, reference)) * daily_rate.max(Decimal::ZERO)).round_dp(2)
}

#[derive(Clone)]
pub struct FinesService {
    borrows: Arc<dyn BorrowStore>,
    rates: Arc<dyn FineRateStore>,
    default_rate: Decimal,
}

impl FinesService {
    pub fn new(borrows: Arc<dyn BorrowStore>, rates: Arc<dyn FineRateStore>, default_rate: Decimal) -> Self {
        Self {
            borrows,
            rates,
            default_rate,
        }
    }

    /// Persisted daily rate, or the configured default
    pub async fn current_rate(&self) -> AppResult<Decimal> {
        Ok(self
            .rates
            .current()
            .await?
            .map(|config| config.daily_rate)
            .unwrap_or(self.default_rate))
    }

    pub async fn set_rate(&self, daily_rate: Decimal, updated_by: &str) -> AppResult<FineConfig> {
        validate_rate(daily_rate)?;
        let config = self.rates.set_rate(daily_rate, updated_by).await?;
        tracing::info!(%daily_rate, updated_by, "Daily fine rate updated");
        Ok(config)
    }

    /// Fine owed on a record if it were closed at `reference`
    pub async fn fine_for(&self, record: &BorrowRecord, reference: DateTime<Utc>) -> AppResult<Decimal> {
        match record.due_date {
            Some(due_date) => Ok(compute_fine(due_date, reference, self.current_rate().await?)),
            None => Ok(Decimal::ZERO),
        }
    }

    pub async fn update_overdue_fines(&self, custom_rate: Option<Decimal>) -> AppResult<Vec<FineUpdate>> {
        self.update_overdue_fines_at(Utc::now(), custom_rate).await
    }

    /// Recompute and store the fine of every overdue loan as of `now`
    pub async fn update_overdue_fines_at(
        &self,
        now: DateTime<Utc>,
        custom_rate: Option<Decimal>,
    ) -> AppResult<Vec<FineUpdate>> {
        let daily_rate = match custom_rate {
            Some(rate) => {
                validate_rate(rate)?;
                rate
            }
            None => self.current_rate().await?,
        };

        let overdue = self.borrows.list_overdue(now).await?;
        let mut results = Vec::with_capacity(overdue.len());

        for record in overdue {
            let Some(due_date) = record.due_date else {
                continue;
            };
            let fine_amount = compute_fine(due_date, now, daily_rate);
            self.borrows.set_fine(record.id, fine_amount).await?;
            results.push(FineUpdate {
                record_id: record.id,
                days_overdue: days_late(due_date, now),
                fine_amount,
            });
        }

        tracing::info!(count = results.len(), %daily_rate, "Overdue fines updated");
        Ok(results)
    }
}

fn validate_rate(rate: Decimal) -> AppResult<()> {
    if rate < Decimal::ZERO {
        return Err(AppError::Validation(
            "fineAmount must be a number greater than or equal to 0".to_string(),
        ));
    }
    Ok(())
}
