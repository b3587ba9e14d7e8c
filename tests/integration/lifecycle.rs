//! Borrow lifecycle, fines, reviews, reminders and admin checks against in-memory stores

use chrono::Utc;
use rust_decimal::Decimal;

use athenaeum_server::{
    error::{AppError, Rejection},
    models::{
        borrow::BorrowStatus,
        reminder::{ReminderKind, ReminderStatus},
        review::CreateReview,
        user::{UserClaims, UserRole, UserStatus},
    },
    services::fines::compute_fine,
};

use crate::common::{days, Harness};

fn rejection(result: Result<impl std::fmt::Debug, AppError>) -> Rejection {
    match result {
        Err(AppError::Rejected(rejection)) => rejection,
        other => panic!("expected a rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn last_copy_is_released_by_a_return() {
    let h = Harness::new();
    let book = h.library.add_book(2, 2);
    let first = h.library.add_user(UserStatus::Approved, UserRole::User);
    let second = h.library.add_user(UserStatus::Approved, UserRole::User);
    let third = h.library.add_user(UserStatus::Approved, UserRole::User);

    let now = Utc::now();
    let loan = h.borrowed_at(first, book, now).await;
    h.borrowed_at(second, book, now).await;
    assert_eq!(h.library.book(book).available_copies, 0);

    let refused = h.borrows.request_borrow(third, book, None).await;
    assert_eq!(rejection(refused), Rejection::NoCopiesAvailable);

    h.borrows.return_book(loan.id, "desk").await.unwrap();
    assert_eq!(h.library.book(book).available_copies, 1);

    let request = h.borrows.request_borrow(third, book, None).await.unwrap();
    assert_eq!(request.status, BorrowStatus::Pending);
}

#[tokio::test]
async fn approve_then_return_restores_available_copies() {
    let h = Harness::new();
    let book = h.library.add_book(3, 3);
    let user = h.library.add_user(UserStatus::Approved, UserRole::User);

    let before = h.library.book(book).available_copies;
    let loan = h.borrowed_at(user, book, Utc::now()).await;
    assert_eq!(h.library.book(book).available_copies, before - 1);

    let returned = h.borrows.return_book(loan.id, "desk").await.unwrap();
    assert_eq!(returned.status, BorrowStatus::Returned);
    assert_eq!(h.library.book(book).available_copies, before);

    let again = h.borrows.return_book(loan.id, "desk").await;
    assert_eq!(rejection(again), Rejection::NotBorrowed);
    assert_eq!(h.library.book(book).available_copies, before);
}

#[tokio::test]
async fn copies_stay_within_bounds_across_transitions() {
    let h = Harness::new();
    let book = h.library.add_book(1, 1);
    let readers: Vec<_> = (0..3)
        .map(|_| h.library.add_user(UserStatus::Approved, UserRole::User))
        .collect();

    let mut pending = Vec::new();
    for reader in &readers {
        if let Ok(record) = h.borrows.request_borrow(*reader, book, None).await {
            pending.push(record);
        }
    }
    assert_eq!(pending.len(), 1);

    let approved = h
        .borrows
        .approve_borrow(pending[0].id, "librarian")
        .await
        .unwrap();
    let copy = h.library.book(book);
    assert!(copy.available_copies >= 0 && copy.available_copies <= copy.total_copies);

    h.borrows.return_book(approved.id, "librarian").await.unwrap();
    let copy = h.library.book(book);
    assert_eq!(copy.available_copies, copy.total_copies);
}

#[tokio::test]
async fn approval_fails_when_the_shelf_emptied_after_request() {
    let h = Harness::new();
    let book = h.library.add_book(1, 1);
    let early = h.library.add_user(UserStatus::Approved, UserRole::User);
    let late = h.library.add_user(UserStatus::Approved, UserRole::User);

    let first = h.borrows.request_borrow(early, book, None).await.unwrap();
    let second = h.borrows.request_borrow(late, book, None).await.unwrap();

    h.borrows.approve_borrow(first.id, "librarian").await.unwrap();
    let refused = h.borrows.approve_borrow(second.id, "librarian").await;
    assert_eq!(rejection(refused), Rejection::NoCopiesAvailable);
    assert_eq!(h.library.record(second.id).status, BorrowStatus::Pending);
    assert_eq!(h.library.book(book).available_copies, 0);
}

#[tokio::test]
async fn pending_reader_and_inactive_book_are_rejected() {
    let h = Harness::new();
    let book = h.library.add_book(1, 1);
    let pending = h.library.add_user(UserStatus::Pending, UserRole::User);
    let approved = h.library.add_user(UserStatus::Approved, UserRole::User);

    let refused = h.borrows.request_borrow(pending, book, None).await;
    assert_eq!(rejection(refused), Rejection::UserNotApproved);

    h.library.deactivate_book(book);
    let refused = h.borrows.request_borrow(approved, book, None).await;
    assert_eq!(rejection(refused), Rejection::BookInactive);
}

#[tokio::test]
async fn duplicate_request_is_rejected_until_returned() {
    let h = Harness::new();
    let book = h.library.add_book(2, 2);
    let user = h.library.add_user(UserStatus::Approved, UserRole::User);

    let loan = h.borrowed_at(user, book, Utc::now()).await;
    let duplicate = h.borrows.request_borrow(user, book, None).await;
    assert_eq!(rejection(duplicate), Rejection::AlreadyRequested);

    h.borrows.return_book(loan.id, "desk").await.unwrap();
    assert!(h.borrows.request_borrow(user, book, None).await.is_ok());
}

#[tokio::test]
async fn late_return_settles_fine_at_default_rate() {
    let h = Harness::new();
    let book = h.library.add_book(1, 1);
    let user = h.library.add_user(UserStatus::Approved, UserRole::User);

    let approved_at = Utc::now() - days(10);
    let loan = h.borrowed_at(user, book, approved_at).await;
    let due = loan.due_date.unwrap();
    assert_eq!(due, approved_at + h.rules.loan_period);

    let returned_at = due + days(3);
    let returned = h.borrows.return_book_at(loan.id, "desk", returned_at).await.unwrap();
    assert_eq!(returned.fine_amount, Decimal::from(3));
    assert_eq!(returned.fine_amount, compute_fine(due, returned_at, Decimal::ONE));
}

#[tokio::test]
async fn configured_rate_drives_overdue_fines_idempotently() {
    let h = Harness::new();
    let book = h.library.add_book(1, 1);
    let user = h.library.add_user(UserStatus::Approved, UserRole::User);

    let now = Utc::now();
    let loan = h.borrowed_at(user, book, now - days(12)).await;
    h.fines.set_rate(Decimal::new(50, 2), "admin").await.unwrap();

    let first = h.fines.update_overdue_fines_at(now, None).await.unwrap();
    let second = h.fines.update_overdue_fines_at(now, None).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].days_overdue, 5);
    assert_eq!(h.library.record(loan.id).fine_amount, Decimal::new(250, 2));

    assert!(h.fines.set_rate(Decimal::new(-1, 0), "admin").await.is_err());
}

#[tokio::test]
async fn renewals_stop_at_the_limit_and_when_overdue() {
    let h = Harness::new();
    let book = h.library.add_book(2, 2);
    let user = h.library.add_user(UserStatus::Approved, UserRole::User);

    let now = Utc::now();
    let loan = h.borrowed_at(user, book, now).await;
    let original_due = loan.due_date.unwrap();

    let renewed = h.borrows.renew_borrow_at(loan.id, now).await.unwrap();
    assert_eq!(renewed.due_date, Some(original_due + h.rules.loan_period));
    for _ in 1..h.rules.max_renewals {
        h.borrows.renew_borrow_at(loan.id, now).await.unwrap();
    }
    let refused = h.borrows.renew_borrow_at(loan.id, now).await;
    assert_eq!(rejection(refused), Rejection::MaxRenewalsReached);

    let other = h.library.add_user(UserStatus::Approved, UserRole::User);
    let late = h.borrowed_at(other, book, now - days(30)).await;
    let refused = h.borrows.renew_borrow_at(late.id, now).await;
    assert_eq!(rejection(refused), Rejection::Overdue);
}

#[tokio::test]
async fn one_review_per_reader_after_a_return() {
    let h = Harness::new();
    let book = h.library.add_book(1, 1);
    let user = h.library.add_user(UserStatus::Approved, UserRole::User);
    let review = || CreateReview {
        rating: 4,
        comment: "A quiet, wise book".to_string(),
    };

    let loan = h.borrowed_at(user, book, Utc::now()).await;
    let eligibility = h.reviews.eligibility(user, book).await.unwrap();
    assert!(!eligibility.can_review);
    assert!(eligibility.is_currently_borrowed);
    let refused = h.reviews.create(user, book, review()).await;
    assert_eq!(rejection(refused), Rejection::NotEligibleToReview);

    h.borrows.return_book(loan.id, "desk").await.unwrap();
    let created = h.reviews.create(user, book, review()).await.unwrap();
    assert_eq!(created.rating, 4);
    assert_eq!(h.library.book(book).rating, 4.0);

    let duplicate = h.reviews.create(user, book, review()).await;
    assert_eq!(rejection(duplicate), Rejection::AlreadyReviewed);
    assert_eq!(h.reviews.list_for_book(book).await.unwrap().len(), 1);
}

#[tokio::test]
async fn reminder_batch_reports_failures_per_record() {
    let h = Harness::new();
    let book = h.library.add_book(3, 3);
    let ok_reader = h.library.add_user(UserStatus::Approved, UserRole::User);
    let bad_reader = h.library.add_user(UserStatus::Approved, UserRole::User);

    let now = Utc::now();
    let delivered = h.borrowed_at(ok_reader, book, now - days(10)).await;
    let failed = h.borrowed_at(bad_reader, book, now - days(9)).await;
    h.notifier
        .failing
        .lock()
        .unwrap()
        .insert(h.library.user_email(bad_reader));

    let results = h.reminders.dispatch_at(ReminderKind::Overdue, now).await.unwrap();
    assert_eq!(results.len(), 2);
    let sent = results.iter().find(|r| r.record_id == delivered.id).unwrap();
    let not_sent = results.iter().find(|r| r.record_id == failed.id).unwrap();
    assert_eq!(sent.status, ReminderStatus::Sent);
    assert_eq!(not_sent.status, ReminderStatus::Failed);
    assert!(not_sent.error.is_some());

    assert!(h.library.record(delivered.id).last_reminder_sent.is_some());
    assert!(h.library.record(failed.id).last_reminder_sent.is_none());

    let stats = h.reminders.stats_at(now).await.unwrap();
    assert_eq!(stats.overdue, 2);
    assert_eq!(stats.reminders_sent_today, 1);
}

#[tokio::test]
async fn due_soon_window_excludes_far_and_overdue_loans() {
    let h = Harness::new();
    let book = h.library.add_book(3, 3);
    let now = Utc::now();

    let soon = h.borrowed_at(h.library.add_user(UserStatus::Approved, UserRole::User), book, now).await;
    h.library.set_due_date(soon.id, now + days(1));
    let far = h.borrowed_at(h.library.add_user(UserStatus::Approved, UserRole::User), book, now).await;
    h.library.set_due_date(far.id, now + days(6));
    let late = h.borrowed_at(h.library.add_user(UserStatus::Approved, UserRole::User), book, now).await;
    h.library.set_due_date(late.id, now - days(1));

    let results = h.reminders.dispatch_at(ReminderKind::DueSoon, now).await.unwrap();
    let ids: Vec<_> = results.iter().map(|r| r.record_id).collect();
    assert_eq!(ids, vec![soon.id]);
    assert_eq!(h.notifier.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn admin_guard_honours_a_promotion_before_the_token_expires() {
    let h = Harness::new();
    let reader = h.library.add_user(UserStatus::Approved, UserRole::User);

    let user = athenaeum_server::repository::users::UserDirectory::get(&h.library, reader)
        .await
        .unwrap()
        .unwrap();
    let claims = UserClaims::for_user(&user, Utc::now(), 1);
    let denied = h.access.require_admin_role(Some(&claims)).await;
    assert!(matches!(denied, Err(AppError::Authorization(_))));

    // Promoted after the token was issued
    h.library.set_role(reader, UserRole::Admin);
    assert!(h.access.require_admin_role(Some(&claims)).await.is_ok());

    let anonymous = h.access.require_admin_role(None).await;
    assert!(matches!(anonymous, Err(AppError::Authentication(_))));
}

#[tokio::test]
async fn only_the_owner_may_return_through_the_user_route() {
    let h = Harness::new();
    let book = h.library.add_book(1, 1);
    let owner = h.library.add_user(UserStatus::Approved, UserRole::User);
    let stranger = h.library.add_user(UserStatus::Approved, UserRole::User);
    let loan = h.borrowed_at(owner, book, Utc::now()).await;

    let stranger_user = athenaeum_server::repository::users::UserDirectory::get(&h.library, stranger)
        .await
        .unwrap()
        .unwrap();
    let claims = UserClaims::for_user(&stranger_user, Utc::now(), 1);
    let denied = h.borrows.get_owned(loan.id, &claims).await;
    assert!(matches!(denied, Err(AppError::Authorization(_))));
}
