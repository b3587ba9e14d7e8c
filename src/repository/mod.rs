//! Repository layer for database operations

pub mod books;
pub mod borrows;
pub mod fine_config;
pub mod retry;
pub mod reviews;
pub mod users;

use sqlx::{Pool, Postgres};

pub use retry::{is_transient_db_error, with_db_retry, RetryPolicy};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub retry: RetryPolicy,
    pub books: books::BooksRepository,
    pub users: users::UsersRepository,
    pub borrows: borrows::BorrowsRepository,
    pub reviews: reviews::ReviewsRepository,
    pub fine_config: fine_config::FineConfigRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>, retry: RetryPolicy) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone(), retry),
            users: users::UsersRepository::new(pool.clone(), retry),
            borrows: borrows::BorrowsRepository::new(pool.clone(), retry),
            reviews: reviews::ReviewsRepository::new(pool.clone(), retry),
            fine_config: fine_config::FineConfigRepository::new(pool.clone(), retry),
            retry,
            pool,
        }
    }
}
