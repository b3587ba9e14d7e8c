//! Borrow lifecycle: request, approve, return and renew

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    config::LibraryConfig,
    error::{AppError, AppResult, Rejection},
    models::{
        borrow::{
            Approval, ApprovalOutcome, BorrowRecord, BorrowRequestDetails, BorrowRequestQuery,
            BorrowStatus, RenewalOutcome, ReturnOutcome, ReturnSettlement, UserBorrow,
        },
        user::UserClaims,
    },
    repository::{books::BookStore, borrows::BorrowStore, users::UserDirectory},
};

use super::fines::FinesService;

/// Circulation rules applied by the lifecycle
#[derive(Debug, Clone, Copy)]
pub struct LoanRules {
    pub loan_period: Duration,
    pub max_renewals: i32,
}

impl From<&LibraryConfig> for LoanRules {
    fn from(config: &LibraryConfig) -> Self {
        Self {
            loan_period: Duration::days(config.loan_period_days),
            max_renewals: config.max_renewals,
        }
    }
}

#[derive(Clone)]
pub struct BorrowsService {
    books: Arc<dyn BookStore>,
    users: Arc<dyn UserDirectory>,
    borrows: Arc<dyn BorrowStore>,
    fines: FinesService,
    rules: LoanRules,
}

impl BorrowsService {
    pub fn new(
        books: Arc<dyn BookStore>,
        users: Arc<dyn UserDirectory>,
        borrows: Arc<dyn BorrowStore>,
        fines: FinesService,
        rules: LoanRules,
    ) -> Self {
        Self {
            books,
            users,
            borrows,
            fines,
            rules,
        }
    }

    pub async fn get(&self, record_id: Uuid) -> AppResult<BorrowRecord> {
        self.borrows
            .get(record_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow record {} not found", record_id)))
    }

    /// Record visible to its owner, or to a session claiming admin
    pub async fn get_owned(&self, record_id: Uuid, claims: &UserClaims) -> AppResult<BorrowRecord> {
        let record = self.get(record_id).await?;
        claims.require_owner_or_admin(record.user_id)?;
        Ok(record)
    }

    /// Create a PENDING request for an approved user and an available book
    pub async fn request_borrow(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        notes: Option<String>,
    ) -> AppResult<BorrowRecord> {
        let user = self
            .users
            .get(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", user_id)))?;
        if !user.is_approved() {
            return Err(Rejection::UserNotApproved.into());
        }

        let book = self
            .books
            .get(book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;
        if !book.is_active {
            return Err(Rejection::BookInactive.into());
        }
        if !book.has_available_copy() {
            return Err(Rejection::NoCopiesAvailable.into());
        }

        if self.borrows.find_open(user_id, book_id).await?.is_some() {
            return Err(Rejection::AlreadyRequested.into());
        }

        let notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        let record = self
            .borrows
            .create_pending(user_id, book_id, notes)
            .await?
            .ok_or(AppError::Rejected(Rejection::AlreadyRequested))?;

        tracing::info!(record_id = %record.id, %user_id, %book_id, "Borrow requested");
        Ok(record)
    }

    pub async fn approve_borrow(&self, record_id: Uuid, approved_by: &str) -> AppResult<BorrowRecord> {
        self.approve_borrow_at(record_id, approved_by, Utc::now()).await
    }

    /// PENDING -> BORROWED; takes one copy off the shelf
    pub async fn approve_borrow_at(
        &self,
        record_id: Uuid,
        approved_by: &str,
        now: DateTime<Utc>,
    ) -> AppResult<BorrowRecord> {
        let record = self.get(record_id).await?;
        if record.status != BorrowStatus::Pending {
            return Err(Rejection::NotPending.into());
        }

        let approval = Approval {
            borrow_date: now,
            due_date: now + self.rules.loan_period,
            approved_by: approved_by.to_string(),
        };

        match self.borrows.approve(record_id, &approval).await? {
            ApprovalOutcome::Approved(record) => {
                tracing::info!(%record_id, book_id = %record.book_id, approved_by, "Borrow approved");
                Ok(record)
            }
            ApprovalOutcome::NotPending => Err(Rejection::NotPending.into()),
            ApprovalOutcome::NoCopiesAvailable => {
                tracing::warn!(%record_id, book_id = %record.book_id, "Approval refused, no copies left");
                Err(Rejection::NoCopiesAvailable.into())
            }
        }
    }

    pub async fn return_book(&self, record_id: Uuid, returned_by: &str) -> AppResult<BorrowRecord> {
        self.return_book_at(record_id, returned_by, Utc::now()).await
    }

    /// BORROWED -> RETURNED; settles the fine and puts the copy back
    pub async fn return_book_at(
        &self,
        record_id: Uuid,
        returned_by: &str,
        now: DateTime<Utc>,
    ) -> AppResult<BorrowRecord> {
        let record = self.get(record_id).await?;
        if record.status != BorrowStatus::Borrowed {
            return Err(Rejection::NotBorrowed.into());
        }

        let settlement = ReturnSettlement {
            return_date: now,
            fine_amount: self.fines.fine_for(&record, now).await?,
            returned_by: returned_by.to_string(),
        };

        match self.borrows.mark_returned(record_id, &settlement).await? {
            ReturnOutcome::Returned(record) => {
                tracing::info!(
                    %record_id,
                    book_id = %record.book_id,
                    fine = %record.fine_amount,
                    "Book returned"
                );
                Ok(record)
            }
            ReturnOutcome::NotBorrowed => Err(Rejection::NotBorrowed.into()),
        }
    }

    pub async fn renew_borrow(&self, record_id: Uuid) -> AppResult<BorrowRecord> {
        self.renew_borrow_at(record_id, Utc::now()).await
    }

    /// Extend the due date by one loan period
    pub async fn renew_borrow_at(&self, record_id: Uuid, now: DateTime<Utc>) -> AppResult<BorrowRecord> {
        let record = self.get(record_id).await?;
        if record.status != BorrowStatus::Borrowed {
            return Err(Rejection::NotBorrowed.into());
        }
        if record.renewal_count >= self.rules.max_renewals {
            return Err(Rejection::MaxRenewalsReached.into());
        }
        if record.is_overdue_at(now) {
            return Err(Rejection::Overdue.into());
        }

        let new_due_date = record.due_date.unwrap_or(now) + self.rules.loan_period;
        match self
            .borrows
            .renew(record_id, new_due_date, self.rules.max_renewals)
            .await?
        {
            RenewalOutcome::Renewed(record) => {
                tracing::info!(%record_id, renewals = record.renewal_count, "Borrow renewed");
                Ok(record)
            }
            RenewalOutcome::NotBorrowed => Err(Rejection::NotBorrowed.into()),
            RenewalOutcome::LimitReached => Err(Rejection::MaxRenewalsReached.into()),
        }
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<UserBorrow>> {
        self.borrows.list_for_user(user_id).await
    }

    pub async fn list_requests(&self, query: &BorrowRequestQuery) -> AppResult<Vec<BorrowRequestDetails>> {
        self.borrows.list_requests(query).await
    }
}
