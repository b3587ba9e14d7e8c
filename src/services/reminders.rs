//! Due-soon and overdue reminder batches

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, Utc};

use crate::{
    error::AppResult,
    models::reminder::{ReminderCandidate, ReminderKind, ReminderResult, ReminderStats, ReminderStatus},
    repository::borrows::BorrowStore,
};

/// Outbound delivery of a single reminder
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_reminder(&self, kind: ReminderKind, candidate: &ReminderCandidate) -> AppResult<()>;
}

#[derive(Clone)]
pub struct RemindersService {
    borrows: Arc<dyn BorrowStore>,
    notifier: Arc<dyn Notifier>,
    due_soon_window: Duration,
}

impl RemindersService {
    pub fn new(borrows: Arc<dyn BorrowStore>, notifier: Arc<dyn Notifier>, due_soon_days: i64) -> Self {
        Self {
            borrows,
            notifier,
            due_soon_window: Duration::days(due_soon_days),
        }
    }

    pub async fn send_due_reminders(&self) -> AppResult<Vec<ReminderResult>> {
        self.dispatch_at(ReminderKind::DueSoon, Utc::now()).await
    }

    pub async fn send_overdue_reminders(&self) -> AppResult<Vec<ReminderResult>> {
        self.dispatch_at(ReminderKind::Overdue, Utc::now()).await
    }

    /// Notify every matching loan; a failed send is reported, never fatal
    pub async fn dispatch_at(&self, kind: ReminderKind, now: DateTime<Utc>) -> AppResult<Vec<ReminderResult>> {
        let candidates = self
            .borrows
            .reminder_candidates(kind, now, now + self.due_soon_window)
            .await?;

        let mut results = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let outcome = match self.notifier.send_reminder(kind, &candidate).await {
                Ok(()) => self.borrows.stamp_reminder(candidate.record_id, now).await,
                Err(e) => Err(e),
            };

            let (status, error) = match outcome {
                Ok(()) => (ReminderStatus::Sent, None),
                Err(e) => {
                    tracing::warn!(
                        record_id = %candidate.record_id,
                        email = %candidate.user_email,
                        "Reminder failed: {}",
                        e
                    );
                    (ReminderStatus::Failed, Some(e.to_string()))
                }
            };

            results.push(ReminderResult {
                record_id: candidate.record_id,
                user_email: candidate.user_email,
                book_title: candidate.book_title,
                kind,
                status,
                error,
            });
        }

        let sent = results.iter().filter(|r| r.status == ReminderStatus::Sent).count();
        tracing::info!(?kind, processed = results.len(), sent, "Reminder batch finished");
        Ok(results)
    }

    pub async fn stats(&self) -> AppResult<ReminderStats> {
        self.stats_at(Utc::now()).await
    }

    pub async fn stats_at(&self, now: DateTime<Utc>) -> AppResult<ReminderStats> {
        let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        self.borrows
            .reminder_stats(now, now + self.due_soon_window, day_start)
            .await
    }
}
