//! Borrow records repository
//!
//! Every lifecycle transition is a single conditional UPDATE; the status a
//! caller read earlier is never trusted when writing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Pool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        borrow::{
            Approval, ApprovalOutcome, BorrowRecord, BorrowRequestDetails, BorrowRequestQuery,
            BorrowStatus, RenewalOutcome, ReturnOutcome, ReturnSettlement, UserBorrow,
        },
        reminder::{ReminderCandidate, ReminderKind, ReminderStats},
    },
};

use super::retry::{with_db_retry, RetryPolicy};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BorrowStore: Send + Sync {
    async fn get(&self, id: Uuid) -> AppResult<Option<BorrowRecord>>;

    /// PENDING or BORROWED record for the pair, if any
    async fn find_open(&self, user_id: Uuid, book_id: Uuid) -> AppResult<Option<BorrowRecord>>;

    /// Insert a PENDING record; `None` when an open record for the pair already exists
    async fn create_pending(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        notes: Option<String>,
    ) -> AppResult<Option<BorrowRecord>>;

    /// PENDING -> BORROWED and decrement of available copies, as one unit
    async fn approve(&self, id: Uuid, approval: &Approval) -> AppResult<ApprovalOutcome>;

    /// BORROWED -> RETURNED and bounded increment of available copies, as one unit
    async fn mark_returned(&self, id: Uuid, settlement: &ReturnSettlement) -> AppResult<ReturnOutcome>;

    async fn renew(
        &self,
        id: Uuid,
        new_due_date: DateTime<Utc>,
        max_renewals: i32,
    ) -> AppResult<RenewalOutcome>;

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<UserBorrow>>;

    async fn list_requests(&self, query: &BorrowRequestQuery) -> AppResult<Vec<BorrowRequestDetails>>;

    /// BORROWED records due strictly before `now`
    async fn list_overdue(&self, now: DateTime<Utc>) -> AppResult<Vec<BorrowRecord>>;

    /// Store the running fine of a record that is still borrowed
    async fn set_fine(&self, id: Uuid, fine_amount: Decimal) -> AppResult<()>;

    async fn reminder_candidates(
        &self,
        kind: ReminderKind,
        now: DateTime<Utc>,
        horizon: DateTime<Utc>,
    ) -> AppResult<Vec<ReminderCandidate>>;

    async fn stamp_reminder(&self, id: Uuid, sent_at: DateTime<Utc>) -> AppResult<()>;

    async fn reminder_stats(
        &self,
        now: DateTime<Utc>,
        horizon: DateTime<Utc>,
        day_start: DateTime<Utc>,
    ) -> AppResult<ReminderStats>;

    async fn has_record_with_status(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        status: BorrowStatus,
    ) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct BorrowsRepository {
    pool: Pool<Postgres>,
    retry: RetryPolicy,
}

impl BorrowsRepository {
    pub fn new(pool: Pool<Postgres>, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }

    /// Only acquiring the transaction is retried; statements inside it are not
    async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        let pool = &self.pool;
        Ok(with_db_retry(self.retry, move || pool.begin()).await?)
    }
}

fn push_request_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &BorrowRequestQuery) {
    builder.push(" WHERE 1 = 1");

    if let Some(status) = query.status {
        builder.push(" AND br.status = ").push_bind(status);
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        builder
            .push(" AND (b.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR b.author ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.full_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.university_id::text ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[async_trait]
impl BorrowStore for BorrowsRepository {
    async fn get(&self, id: Uuid) -> AppResult<Option<BorrowRecord>> {
        let pool = &self.pool;
        let record = with_db_retry(self.retry, move || {
            sqlx::query_as::<_, BorrowRecord>("SELECT * FROM borrow_records WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
        })
        .await?;
        Ok(record)
    }

    async fn find_open(&self, user_id: Uuid, book_id: Uuid) -> AppResult<Option<BorrowRecord>> {
        let pool = &self.pool;
        let record = with_db_retry(self.retry, move || {
            sqlx::query_as::<_, BorrowRecord>(
                r#"
                SELECT * FROM borrow_records
                WHERE user_id = $1 AND book_id = $2 AND status IN ('PENDING', 'BORROWED')
                LIMIT 1
                "#,
            )
            .bind(user_id)
            .bind(book_id)
            .fetch_optional(pool)
        })
        .await?;
        Ok(record)
    }

    async fn create_pending(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        notes: Option<String>,
    ) -> AppResult<Option<BorrowRecord>> {
        // The partial unique index settles concurrent requests for the same pair
        let record = sqlx::query_as::<_, BorrowRecord>(
            r#"
            INSERT INTO borrow_records (id, user_id, book_id, status, notes)
            VALUES ($1, $2, $3, 'PENDING', $4)
            ON CONFLICT (user_id, book_id) WHERE status IN ('PENDING', 'BORROWED') DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(book_id)
        .bind(notes)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn approve(&self, id: Uuid, approval: &Approval) -> AppResult<ApprovalOutcome> {
        let mut tx = self.begin().await?;

        let record = sqlx::query_as::<_, BorrowRecord>(
            r#"
            UPDATE borrow_records
            SET status = 'BORROWED', borrow_date = $2, due_date = $3,
                borrowed_by = $4, updated_by = $4, updated_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(approval.borrow_date)
        .bind(approval.due_date)
        .bind(&approval.approved_by)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(record) = record else {
            tx.rollback().await?;
            return Ok(ApprovalOutcome::NotPending);
        };

        let decremented = sqlx::query(
            r#"
            UPDATE books SET available_copies = available_copies - 1, updated_at = NOW()
            WHERE id = $1 AND available_copies > 0
            "#,
        )
        .bind(record.book_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if decremented == 0 {
            tx.rollback().await?;
            return Ok(ApprovalOutcome::NoCopiesAvailable);
        }

        tx.commit().await?;
        Ok(ApprovalOutcome::Approved(record))
    }

    async fn mark_returned(&self, id: Uuid, settlement: &ReturnSettlement) -> AppResult<ReturnOutcome> {
        let mut tx = self.begin().await?;

        let record = sqlx::query_as::<_, BorrowRecord>(
            r#"
            UPDATE borrow_records
            SET status = 'RETURNED', return_date = $2, fine_amount = $3,
                returned_by = $4, updated_by = $4, updated_at = NOW()
            WHERE id = $1 AND status = 'BORROWED'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(settlement.return_date)
        .bind(settlement.fine_amount)
        .bind(&settlement.returned_by)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(record) = record else {
            tx.rollback().await?;
            return Ok(ReturnOutcome::NotBorrowed);
        };

        sqlx::query(
            r#"
            UPDATE books SET available_copies = LEAST(available_copies + 1, total_copies), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(record.book_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ReturnOutcome::Returned(record))
    }

    async fn renew(
        &self,
        id: Uuid,
        new_due_date: DateTime<Utc>,
        max_renewals: i32,
    ) -> AppResult<RenewalOutcome> {
        let renewed = sqlx::query_as::<_, BorrowRecord>(
            r#"
            UPDATE borrow_records
            SET due_date = $2, renewal_count = renewal_count + 1, updated_at = NOW()
            WHERE id = $1 AND status = 'BORROWED' AND renewal_count < $3
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(new_due_date)
        .bind(max_renewals)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(record) = renewed {
            return Ok(RenewalOutcome::Renewed(record));
        }

        let status = self.get(id).await?.map(|r| r.status);
        Ok(match status {
            Some(BorrowStatus::Borrowed) => RenewalOutcome::LimitReached,
            _ => RenewalOutcome::NotBorrowed,
        })
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<UserBorrow>> {
        let pool = &self.pool;
        let borrows = with_db_retry(self.retry, move || {
            sqlx::query_as::<_, UserBorrow>(
                r#"
                SELECT br.id, br.book_id, b.title AS book_title, b.author AS book_author,
                       b.cover_url AS book_cover_url, br.borrow_date, br.due_date, br.return_date,
                       br.status, br.fine_amount, br.renewal_count, br.created_at
                FROM borrow_records br
                JOIN books b ON b.id = br.book_id
                WHERE br.user_id = $1
                ORDER BY br.created_at DESC
                "#,
            )
            .bind(user_id)
            .fetch_all(pool)
        })
        .await?;
        Ok(borrows)
    }

    async fn list_requests(&self, query: &BorrowRequestQuery) -> AppResult<Vec<BorrowRequestDetails>> {
        let pool = &self.pool;
        let requests = with_db_retry(self.retry, move || async move {
            let mut select = QueryBuilder::new(
                r#"
                SELECT br.id, br.user_id, br.book_id, br.borrow_date, br.due_date, br.return_date,
                       br.status, br.borrowed_by, br.returned_by, br.fine_amount, br.notes,
                       br.renewal_count, br.last_reminder_sent, br.created_at,
                       u.full_name AS user_name, u.email AS user_email,
                       u.university_id AS user_university_id,
                       b.title AS book_title, b.author AS book_author, b.genre AS book_genre,
                       b.cover_url AS book_cover_url, b.cover_color AS book_cover_color
                FROM borrow_records br
                JOIN users u ON u.id = br.user_id
                JOIN books b ON b.id = br.book_id
                "#,
            );
            push_request_filters(&mut select, query);
            select.push(" ORDER BY br.created_at DESC");
            select.build_query_as::<BorrowRequestDetails>().fetch_all(pool).await
        })
        .await?;
        Ok(requests)
    }

    async fn list_overdue(&self, now: DateTime<Utc>) -> AppResult<Vec<BorrowRecord>> {
        let pool = &self.pool;
        let records = with_db_retry(self.retry, move || {
            sqlx::query_as::<_, BorrowRecord>(
                r#"
                SELECT * FROM borrow_records
                WHERE status = 'BORROWED' AND due_date < $1
                ORDER BY due_date
                "#,
            )
            .bind(now)
            .fetch_all(pool)
        })
        .await?;
        Ok(records)
    }

    async fn set_fine(&self, id: Uuid, fine_amount: Decimal) -> AppResult<()> {
        let pool = &self.pool;
        with_db_retry(self.retry, move || {
            sqlx::query(
                r#"
                UPDATE borrow_records SET fine_amount = $2, updated_at = NOW()
                WHERE id = $1 AND status = 'BORROWED'
                "#,
            )
            .bind(id)
            .bind(fine_amount)
            .execute(pool)
        })
        .await?;
        Ok(())
    }

    async fn reminder_candidates(
        &self,
        kind: ReminderKind,
        now: DateTime<Utc>,
        horizon: DateTime<Utc>,
    ) -> AppResult<Vec<ReminderCandidate>> {
        const SELECT: &str = r#"
            SELECT br.id AS record_id, u.email AS user_email, u.full_name AS user_name,
                   b.title AS book_title, br.due_date
            FROM borrow_records br
            JOIN users u ON u.id = br.user_id
            JOIN books b ON b.id = br.book_id
            WHERE br.status = 'BORROWED'
        "#;

        let pool = &self.pool;
        let candidates = with_db_retry(self.retry, move || async move {
            let mut builder = QueryBuilder::<Postgres>::new(SELECT);
            match kind {
                ReminderKind::DueSoon => {
                    builder
                        .push(" AND br.due_date >= ")
                        .push_bind(now)
                        .push(" AND br.due_date <= ")
                        .push_bind(horizon);
                }
                ReminderKind::Overdue => {
                    builder.push(" AND br.due_date < ").push_bind(now);
                }
            }
            builder.push(" ORDER BY br.due_date");
            builder.build_query_as::<ReminderCandidate>().fetch_all(pool).await
        })
        .await?;
        Ok(candidates)
    }

    async fn stamp_reminder(&self, id: Uuid, sent_at: DateTime<Utc>) -> AppResult<()> {
        let pool = &self.pool;
        with_db_retry(self.retry, move || {
            sqlx::query("UPDATE borrow_records SET last_reminder_sent = $2 WHERE id = $1")
                .bind(id)
                .bind(sent_at)
                .execute(pool)
        })
        .await?;
        Ok(())
    }

    async fn reminder_stats(
        &self,
        now: DateTime<Utc>,
        horizon: DateTime<Utc>,
        day_start: DateTime<Utc>,
    ) -> AppResult<ReminderStats> {
        let pool = &self.pool;
        let stats = with_db_retry(self.retry, move || {
            sqlx::query_as::<_, ReminderStats>(
                r#"
                SELECT
                    COUNT(*) FILTER (WHERE status = 'BORROWED' AND due_date >= $1 AND due_date <= $2) AS due_soon,
                    COUNT(*) FILTER (WHERE status = 'BORROWED' AND due_date < $1) AS overdue,
                    COUNT(*) FILTER (WHERE last_reminder_sent >= $3) AS reminders_sent_today
                FROM borrow_records
                "#,
            )
            .bind(now)
            .bind(horizon)
            .bind(day_start)
            .fetch_one(pool)
        })
        .await?;
        Ok(stats)
    }

    async fn has_record_with_status(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        status: BorrowStatus,
    ) -> AppResult<bool> {
        let pool = &self.pool;
        let exists = with_db_retry(self.retry, move || {
            sqlx::query_scalar::<_, bool>(
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM borrow_records WHERE user_id = $1 AND book_id = $2 AND status = $3
                )
                "#,
            )
            .bind(user_id)
            .bind(book_id)
            .bind(status)
            .fetch_one(pool)
        })
        .await?;
        Ok(exists)
    }
}
