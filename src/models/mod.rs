//! Data models for Athenaeum

pub mod book;
pub mod borrow;
pub mod fine;
pub mod reminder;
pub mod review;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookSummary};
pub use borrow::{BorrowRecord, BorrowStatus};
pub use review::Review;
pub use user::{User, UserClaims, UserRole, UserStatus};
