//! Borrow store tests against a real PostgreSQL database
//!
//! Run with: ATHENAEUM_TEST_DATABASE_URL=postgres://... cargo test -- --ignored

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use athenaeum_server::{
    models::borrow::{Approval, ApprovalOutcome, BorrowStatus, ReturnOutcome, ReturnSettlement},
    repository::{
        borrows::{BorrowStore, BorrowsRepository},
        RetryPolicy,
    },
};

async fn connect() -> PgPool {
    let url = std::env::var("ATHENAEUM_TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("ATHENAEUM_TEST_DATABASE_URL or DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .expect("Failed to connect to test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

async fn insert_reader(pool: &PgPool) -> Uuid {
    let id = Uuid::new_v4();
    let university_id = (id.as_u128() % 1_000_000_000) as i32;
    sqlx::query(
        "INSERT INTO users (id, full_name, email, university_id, university_card, password_hash, status)
         VALUES ($1, 'Test Reader', $2, $3, 'card.png', 'x', 'APPROVED')",
    )
    .bind(id)
    .bind(format!("{}@example.edu", id))
    .bind(university_id)
    .execute(pool)
    .await
    .expect("Failed to insert user");
    id
}

async fn insert_book(pool: &PgPool, copies: i32) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO books (id, title, author, genre, total_copies, available_copies)
         VALUES ($1, 'Dune', 'Frank Herbert', 'Science Fiction', $2, $2)",
    )
    .bind(id)
    .bind(copies)
    .execute(pool)
    .await
    .expect("Failed to insert book");
    id
}

async fn copies(pool: &PgPool, book_id: Uuid) -> (i32, i32) {
    sqlx::query_as("SELECT available_copies, total_copies FROM books WHERE id = $1")
        .bind(book_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read copies")
}

fn approval() -> Approval {
    let now = Utc::now();
    Approval {
        borrow_date: now,
        due_date: now + Duration::days(7),
        approved_by: "admin@example.edu".to_string(),
    }
}

fn settlement() -> ReturnSettlement {
    ReturnSettlement {
        return_date: Utc::now(),
        fine_amount: Decimal::ZERO,
        returned_by: "admin@example.edu".to_string(),
    }
}

#[tokio::test]
#[ignore]
async fn test_duplicate_open_request_is_refused_by_the_index() {
    let pool = connect().await;
    let store = BorrowsRepository::new(pool.clone(), RetryPolicy::none());
    let reader = insert_reader(&pool).await;
    let book = insert_book(&pool, 2).await;

    let first = store.create_pending(reader, book, None).await.unwrap();
    assert!(first.is_some());
    let second = store.create_pending(reader, book, Some("again".into())).await.unwrap();
    assert!(second.is_none());
}

#[tokio::test]
#[ignore]
async fn test_concurrent_approvals_never_oversubscribe_the_last_copy() {
    let pool = connect().await;
    let store = BorrowsRepository::new(pool.clone(), RetryPolicy::none());
    let book = insert_book(&pool, 1).await;
    let first_reader = insert_reader(&pool).await;
    let second_reader = insert_reader(&pool).await;

    let first = store.create_pending(first_reader, book, None).await.unwrap().unwrap();
    let second = store.create_pending(second_reader, book, None).await.unwrap().unwrap();

    let first_approval = approval();
    let second_approval = approval();
    let (a, b) = tokio::join!(
        store.approve(first.id, &first_approval),
        store.approve(second.id, &second_approval)
    );
    let outcomes = [a.unwrap(), b.unwrap()];

    let approved = outcomes
        .iter()
        .filter(|o| matches!(o, ApprovalOutcome::Approved(_)))
        .count();
    let refused = outcomes
        .iter()
        .filter(|o| matches!(o, ApprovalOutcome::NoCopiesAvailable))
        .count();
    assert_eq!(approved, 1);
    assert_eq!(refused, 1);
    assert_eq!(copies(&pool, book).await, (0, 1));

    // The refused request stays pending
    let pending = [first.id, second.id];
    let mut statuses = Vec::new();
    for id in pending {
        statuses.push(store.get(id).await.unwrap().unwrap().status);
    }
    assert!(statuses.contains(&BorrowStatus::Pending));
    assert!(statuses.contains(&BorrowStatus::Borrowed));
}

#[tokio::test]
#[ignore]
async fn test_return_restores_one_copy_and_only_once() {
    let pool = connect().await;
    let store = BorrowsRepository::new(pool.clone(), RetryPolicy::none());
    let reader = insert_reader(&pool).await;
    let book = insert_book(&pool, 1).await;

    let record = store.create_pending(reader, book, None).await.unwrap().unwrap();
    let outcome = store.approve(record.id, &approval()).await.unwrap();
    assert!(matches!(outcome, ApprovalOutcome::Approved(_)));
    assert_eq!(
        store.approve(record.id, &approval()).await.unwrap(),
        ApprovalOutcome::NotPending
    );
    assert_eq!(copies(&pool, book).await, (0, 1));

    let returned = store.mark_returned(record.id, &settlement()).await.unwrap();
    match returned {
        ReturnOutcome::Returned(record) => {
            assert_eq!(record.status, BorrowStatus::Returned);
            assert!(record.return_date.is_some());
        }
        ReturnOutcome::NotBorrowed => panic!("record should have been returned"),
    }
    assert_eq!(copies(&pool, book).await, (1, 1));

    let again = store.mark_returned(record.id, &settlement()).await.unwrap();
    assert_eq!(again, ReturnOutcome::NotBorrowed);
    assert_eq!(copies(&pool, book).await, (1, 1));
}
