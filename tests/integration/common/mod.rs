//! In-memory stores and a recording notifier for service-level tests

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use athenaeum_server::{
    config::LibraryConfig,
    error::{AppError, AppResult},
    models::{
        book::Book,
        borrow::{
            Approval, ApprovalOutcome, BorrowRecord, BorrowRequestDetails, BorrowRequestQuery,
            BorrowStatus, RenewalOutcome, ReturnOutcome, ReturnSettlement, UserBorrow,
        },
        fine::FineConfig,
        reminder::{ReminderCandidate, ReminderKind, ReminderStats},
        review::{NewReview, Review, ReviewWithAuthor},
        user::{User, UserRole, UserStatus},
    },
    repository::{
        books::BookStore, borrows::BorrowStore, fine_config::FineRateStore, reviews::ReviewStore,
        users::UserDirectory,
    },
    services::{
        access::AccessGuard,
        borrows::{BorrowsService, LoanRules},
        fines::FinesService,
        reminders::{Notifier, RemindersService},
        reviews::ReviewsService,
    },
};

#[derive(Default)]
struct State {
    books: HashMap<Uuid, Book>,
    users: HashMap<Uuid, User>,
    records: HashMap<Uuid, BorrowRecord>,
    reviews: Vec<Review>,
    fine_config: Option<FineConfig>,
}

/// One shared state behind every store trait, with the same conditional
/// semantics as the SQL updates
#[derive(Clone, Default)]
pub struct InMemoryLibrary {
    state: Arc<Mutex<State>>,
}

impl InMemoryLibrary {
    pub fn add_user(&self, status: UserStatus, role: UserRole) -> Uuid {
        let id = Uuid::new_v4();
        let user = User {
            id,
            full_name: format!("Reader {}", &id.to_string()[..8]),
            email: format!("{}@university.edu", &id.to_string()[..8]),
            university_id: 1000,
            university_card: "card.png".to_string(),
            password_hash: String::new(),
            status,
            role,
            last_activity_date: None,
            created_at: Utc::now(),
        };
        self.state.lock().unwrap().users.insert(id, user);
        id
    }

    pub fn add_book(&self, total: i32, available: i32) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let book = Book {
            id,
            title: format!("Book {}", &id.to_string()[..8]),
            author: "Ursula K. Le Guin".to_string(),
            genre: "Fantasy".to_string(),
            rating: 0.0,
            total_copies: total,
            available_copies: available,
            description: String::new(),
            summary: String::new(),
            cover_url: String::new(),
            cover_color: "#012B48".to_string(),
            isbn: None,
            publisher: None,
            publication_year: None,
            language: None,
            page_count: None,
            edition: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().unwrap().books.insert(id, book);
        id
    }

    pub fn deactivate_book(&self, id: Uuid) {
        if let Some(book) = self.state.lock().unwrap().books.get_mut(&id) {
            book.is_active = false;
        }
    }

    pub fn set_role(&self, id: Uuid, role: UserRole) {
        if let Some(user) = self.state.lock().unwrap().users.get_mut(&id) {
            user.role = role;
        }
    }

    pub fn book(&self, id: Uuid) -> Book {
        self.state.lock().unwrap().books[&id].clone()
    }

    pub fn record(&self, id: Uuid) -> BorrowRecord {
        self.state.lock().unwrap().records[&id].clone()
    }

    /// Move a loan's due date, as if time had passed
    pub fn set_due_date(&self, id: Uuid, due_date: DateTime<Utc>) {
        if let Some(record) = self.state.lock().unwrap().records.get_mut(&id) {
            record.due_date = Some(due_date);
        }
    }

    pub fn user_email(&self, id: Uuid) -> String {
        self.state.lock().unwrap().users[&id].email.clone()
    }

    fn candidate(state: &State, record: &BorrowRecord) -> Option<ReminderCandidate> {
        let user = state.users.get(&record.user_id)?;
        let book = state.books.get(&record.book_id)?;
        Some(ReminderCandidate {
            record_id: record.id,
            user_email: user.email.clone(),
            user_name: user.full_name.clone(),
            book_title: book.title.clone(),
            due_date: record.due_date?,
        })
    }
}

#[async_trait]
impl BookStore for InMemoryLibrary {
    async fn get(&self, id: Uuid) -> AppResult<Option<Book>> {
        Ok(self.state.lock().unwrap().books.get(&id).cloned())
    }
}

#[async_trait]
impl UserDirectory for InMemoryLibrary {
    async fn get(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.state.lock().unwrap().users.get(&id).cloned())
    }

    async fn role_of(&self, id: Uuid) -> AppResult<Option<UserRole>> {
        Ok(self.state.lock().unwrap().users.get(&id).map(|u| u.role))
    }
}

#[async_trait]
impl BorrowStore for InMemoryLibrary {
    async fn get(&self, id: Uuid) -> AppResult<Option<BorrowRecord>> {
        Ok(self.state.lock().unwrap().records.get(&id).cloned())
    }

    async fn find_open(&self, user_id: Uuid, book_id: Uuid) -> AppResult<Option<BorrowRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .values()
            .find(|r| r.user_id == user_id && r.book_id == book_id && r.status.is_open())
            .cloned())
    }

    async fn create_pending(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        notes: Option<String>,
    ) -> AppResult<Option<BorrowRecord>> {
        let mut state = self.state.lock().unwrap();
        let open = state
            .records
            .values()
            .any(|r| r.user_id == user_id && r.book_id == book_id && r.status.is_open());
        if open {
            return Ok(None);
        }

        let now = Utc::now();
        let record = BorrowRecord {
            id: Uuid::new_v4(),
            user_id,
            book_id,
            borrow_date: None,
            due_date: None,
            return_date: None,
            status: BorrowStatus::Pending,
            borrowed_by: None,
            returned_by: None,
            fine_amount: Decimal::ZERO,
            notes,
            renewal_count: 0,
            last_reminder_sent: None,
            created_at: now,
            updated_at: now,
        };
        state.records.insert(record.id, record.clone());
        Ok(Some(record))
    }

    async fn approve(&self, id: Uuid, approval: &Approval) -> AppResult<ApprovalOutcome> {
        let mut state = self.state.lock().unwrap();
        let Some(record) = state.records.get(&id).cloned() else {
            return Ok(ApprovalOutcome::NotPending);
        };
        if record.status != BorrowStatus::Pending {
            return Ok(ApprovalOutcome::NotPending);
        }
        match state.books.get_mut(&record.book_id) {
            Some(book) if book.available_copies > 0 => book.available_copies -= 1,
            _ => return Ok(ApprovalOutcome::NoCopiesAvailable),
        }

        let record = state
            .records
            .get_mut(&id)
            .ok_or_else(|| AppError::Internal("record vanished".to_string()))?;
        record.status = BorrowStatus::Borrowed;
        record.borrow_date = Some(approval.borrow_date);
        record.due_date = Some(approval.due_date);
        record.borrowed_by = Some(approval.approved_by.clone());
        Ok(ApprovalOutcome::Approved(record.clone()))
    }

    async fn mark_returned(&self, id: Uuid, settlement: &ReturnSettlement) -> AppResult<ReturnOutcome> {
        let mut state = self.state.lock().unwrap();
        let Some(record) = state.records.get_mut(&id) else {
            return Ok(ReturnOutcome::NotBorrowed);
        };
        if record.status != BorrowStatus::Borrowed {
            return Ok(ReturnOutcome::NotBorrowed);
        }
        record.status = BorrowStatus::Returned;
        record.return_date = Some(settlement.return_date);
        record.fine_amount = settlement.fine_amount;
        record.returned_by = Some(settlement.returned_by.clone());
        let returned = record.clone();

        if let Some(book) = state.books.get_mut(&returned.book_id) {
            book.available_copies = (book.available_copies + 1).min(book.total_copies);
        }
        Ok(ReturnOutcome::Returned(returned))
    }

    async fn renew(
        &self,
        id: Uuid,
        new_due_date: DateTime<Utc>,
        max_renewals: i32,
    ) -> AppResult<RenewalOutcome> {
        let mut state = self.state.lock().unwrap();
        let Some(record) = state.records.get_mut(&id) else {
            return Ok(RenewalOutcome::NotBorrowed);
        };
        if record.status != BorrowStatus::Borrowed {
            return Ok(RenewalOutcome::NotBorrowed);
        }
        if record.renewal_count >= max_renewals {
            return Ok(RenewalOutcome::LimitReached);
        }
        record.due_date = Some(new_due_date);
        record.renewal_count += 1;
        Ok(RenewalOutcome::Renewed(record.clone()))
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<UserBorrow>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .values()
            .filter(|r| r.user_id == user_id)
            .filter_map(|r| {
                let book = state.books.get(&r.book_id)?;
                Some(UserBorrow {
                    id: r.id,
                    book_id: r.book_id,
                    book_title: book.title.clone(),
                    book_author: book.author.clone(),
                    book_cover_url: book.cover_url.clone(),
                    borrow_date: r.borrow_date,
                    due_date: r.due_date,
                    return_date: r.return_date,
                    status: r.status,
                    fine_amount: r.fine_amount,
                    renewal_count: r.renewal_count,
                    created_at: r.created_at,
                })
            })
            .collect())
    }

    async fn list_requests(&self, _query: &BorrowRequestQuery) -> AppResult<Vec<BorrowRequestDetails>> {
        Ok(Vec::new())
    }

    async fn list_overdue(&self, now: DateTime<Utc>) -> AppResult<Vec<BorrowRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .values()
            .filter(|r| r.is_overdue_at(now))
            .cloned()
            .collect())
    }

    async fn set_fine(&self, id: Uuid, fine_amount: Decimal) -> AppResult<()> {
        if let Some(record) = self.state.lock().unwrap().records.get_mut(&id) {
            if record.status == BorrowStatus::Borrowed {
                record.fine_amount = fine_amount;
            }
        }
        Ok(())
    }

    async fn reminder_candidates(
        &self,
        kind: ReminderKind,
        now: DateTime<Utc>,
        horizon: DateTime<Utc>,
    ) -> AppResult<Vec<ReminderCandidate>> {
        let state = self.state.lock().unwrap();
        let mut candidates: Vec<ReminderCandidate> = state
            .records
            .values()
            .filter(|r| r.status == BorrowStatus::Borrowed)
            .filter(|r| match (kind, r.due_date) {
                (ReminderKind::DueSoon, Some(due)) => due >= now && due <= horizon,
                (ReminderKind::Overdue, Some(due)) => due < now,
                (_, None) => false,
            })
            .filter_map(|r| Self::candidate(&state, r))
            .collect();
        candidates.sort_by_key(|c| c.due_date);
        Ok(candidates)
    }

    async fn stamp_reminder(&self, id: Uuid, sent_at: DateTime<Utc>) -> AppResult<()> {
        if let Some(record) = self.state.lock().unwrap().records.get_mut(&id) {
            record.last_reminder_sent = Some(sent_at);
        }
        Ok(())
    }

    async fn reminder_stats(
        &self,
        now: DateTime<Utc>,
        horizon: DateTime<Utc>,
        day_start: DateTime<Utc>,
    ) -> AppResult<ReminderStats> {
        let state = self.state.lock().unwrap();
        let borrowed_due = |r: &&BorrowRecord| r.status == BorrowStatus::Borrowed && r.due_date.is_some();
        Ok(ReminderStats {
            due_soon: state
                .records
                .values()
                .filter(borrowed_due)
                .filter(|r| r.due_date.map(|d| d >= now && d <= horizon).unwrap_or(false))
                .count() as i64,
            overdue: state
                .records
                .values()
                .filter(borrowed_due)
                .filter(|r| r.due_date.map(|d| d < now).unwrap_or(false))
                .count() as i64,
            reminders_sent_today: state
                .records
                .values()
                .filter(|r| r.last_reminder_sent.map(|s| s >= day_start).unwrap_or(false))
                .count() as i64,
        })
    }

    async fn has_record_with_status(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        status: BorrowStatus,
    ) -> AppResult<bool> {
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .values()
            .any(|r| r.user_id == user_id && r.book_id == book_id && r.status == status))
    }
}

#[async_trait]
impl ReviewStore for InMemoryLibrary {
    async fn exists(&self, user_id: Uuid, book_id: Uuid) -> AppResult<bool> {
        let state = self.state.lock().unwrap();
        Ok(state
            .reviews
            .iter()
            .any(|r| r.user_id == user_id && r.book_id == book_id))
    }

    async fn create(&self, review: &NewReview) -> AppResult<Option<Review>> {
        let mut state = self.state.lock().unwrap();
        if state
            .reviews
            .iter()
            .any(|r| r.user_id == review.user_id && r.book_id == review.book_id)
        {
            return Ok(None);
        }

        let now = Utc::now();
        let created = Review {
            id: Uuid::new_v4(),
            user_id: review.user_id,
            book_id: review.book_id,
            rating: review.rating,
            comment: review.comment.clone(),
            created_at: now,
            updated_at: now,
        };
        state.reviews.push(created.clone());

        let ratings: Vec<i32> = state
            .reviews
            .iter()
            .filter(|r| r.book_id == review.book_id)
            .map(|r| r.rating)
            .collect();
        let average = ratings.iter().sum::<i32>() as f64 / ratings.len() as f64;
        if let Some(book) = state.books.get_mut(&review.book_id) {
            book.rating = (average * 10.0).round() / 10.0;
        }
        Ok(Some(created))
    }

    async fn list_for_book(&self, book_id: Uuid) -> AppResult<Vec<ReviewWithAuthor>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .reviews
            .iter()
            .filter(|r| r.book_id == book_id)
            .map(|r| ReviewWithAuthor {
                id: r.id,
                rating: r.rating,
                comment: r.comment.clone(),
                created_at: r.created_at,
                updated_at: r.updated_at,
                user_full_name: state
                    .users
                    .get(&r.user_id)
                    .map(|u| u.full_name.clone())
                    .unwrap_or_default(),
            })
            .collect())
    }
}

#[async_trait]
impl FineRateStore for InMemoryLibrary {
    async fn current(&self) -> AppResult<Option<FineConfig>> {
        Ok(self.state.lock().unwrap().fine_config.clone())
    }

    async fn set_rate(&self, daily_rate: Decimal, updated_by: &str) -> AppResult<FineConfig> {
        let config = FineConfig {
            daily_rate,
            updated_at: Utc::now(),
            updated_by: Some(updated_by.to_string()),
        };
        self.state.lock().unwrap().fine_config = Some(config.clone());
        Ok(config)
    }
}

/// Notifier that records deliveries and fails for chosen addresses
#[derive(Default)]
pub struct RecordingNotifier {
    pub failing: Mutex<HashSet<String>>,
    pub sent: Mutex<Vec<(ReminderKind, String)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_reminder(&self, kind: ReminderKind, candidate: &ReminderCandidate) -> AppResult<()> {
        if self.failing.lock().unwrap().contains(&candidate.user_email) {
            return Err(AppError::Internal("SMTP unavailable".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((kind, candidate.user_email.clone()));
        Ok(())
    }
}

/// Services wired to one in-memory library
pub struct Harness {
    pub library: InMemoryLibrary,
    pub notifier: Arc<RecordingNotifier>,
    pub access: AccessGuard,
    pub borrows: BorrowsService,
    pub fines: FinesService,
    pub reviews: ReviewsService,
    pub reminders: RemindersService,
    pub rules: LoanRules,
}

impl Harness {
    pub fn new() -> Self {
        let config = LibraryConfig::default();
        let library = InMemoryLibrary::default();
        let notifier = Arc::new(RecordingNotifier::default());

        let books: Arc<dyn BookStore> = Arc::new(library.clone());
        let users: Arc<dyn UserDirectory> = Arc::new(library.clone());
        let borrows: Arc<dyn BorrowStore> = Arc::new(library.clone());
        let reviews: Arc<dyn ReviewStore> = Arc::new(library.clone());
        let rates: Arc<dyn FineRateStore> = Arc::new(library.clone());

        let rules = LoanRules::from(&config);
        let fines = FinesService::new(borrows.clone(), rates, config.default_daily_fine);

        Self {
            access: AccessGuard::new(users.clone()),
            borrows: BorrowsService::new(books.clone(), users, borrows.clone(), fines.clone(), rules),
            reviews: ReviewsService::new(reviews, borrows.clone(), books),
            reminders: RemindersService::new(borrows, notifier.clone(), config.due_soon_days),
            fines,
            notifier,
            library,
            rules,
        }
    }

    /// Approved reader with an approved loan of `book_id`, approved at `at`
    pub async fn borrowed_at(&self, user_id: Uuid, book_id: Uuid, at: DateTime<Utc>) -> BorrowRecord {
        let pending = self
            .borrows
            .request_borrow(user_id, book_id, None)
            .await
            .expect("request");
        self.borrows
            .approve_borrow_at(pending.id, "librarian@university.edu", at)
            .await
            .expect("approve")
    }
}

pub fn days(n: i64) -> Duration {
    Duration::days(n)
}
