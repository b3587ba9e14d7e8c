//! Business logic services

pub mod access;
pub mod auth;
pub mod borrows;
pub mod catalog;
pub mod email;
pub mod export;
pub mod fines;
pub mod recommendations;
pub mod redis;
pub mod reminders;
pub mod reviews;
pub mod stats;
pub mod users;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    repository::{
        books::BookStore, borrows::BorrowStore, fine_config::FineRateStore, reviews::ReviewStore,
        users::UserDirectory, Repository,
    },
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub access: access::AccessGuard,
    pub auth: auth::AuthService,
    pub catalog: catalog::CatalogService,
    pub users: users::UsersService,
    pub borrows: borrows::BorrowsService,
    pub fines: fines::FinesService,
    pub reminders: reminders::RemindersService,
    pub reviews: reviews::ReviewsService,
    pub stats: stats::StatsService,
    pub export: export::ExportService,
    pub recommendations: recommendations::RecommendationsService,
}

impl Services {
    /// Create all services with the given repository; `redis` is optional and only backs caches
    pub fn new(repository: Repository, config: &AppConfig, redis: Option<redis::RedisService>) -> Self {
        let library = &config.library;

        let book_store: Arc<dyn BookStore> = Arc::new(repository.books.clone());
        let user_directory: Arc<dyn UserDirectory> = Arc::new(repository.users.clone());
        let borrow_store: Arc<dyn BorrowStore> = Arc::new(repository.borrows.clone());
        let review_store: Arc<dyn ReviewStore> = Arc::new(repository.reviews.clone());
        let rate_store: Arc<dyn FineRateStore> = Arc::new(repository.fine_config.clone());
        let notifier = Arc::new(email::EmailService::new(config.email.clone()));

        let fine_service = fines::FinesService::new(borrow_store.clone(), rate_store, library.default_daily_fine);

        Self {
            access: access::AccessGuard::new(user_directory.clone()),
            auth: auth::AuthService::new(repository.clone(), config.auth.clone()),
            catalog: catalog::CatalogService::new(repository.clone(), library.page_size),
            users: users::UsersService::new(repository.clone()),
            borrows: borrows::BorrowsService::new(
                book_store.clone(),
                user_directory,
                borrow_store.clone(),
                fine_service.clone(),
                borrows::LoanRules::from(library),
            ),
            fines: fine_service,
            reminders: reminders::RemindersService::new(borrow_store.clone(), notifier, library.due_soon_days),
            reviews: reviews::ReviewsService::new(review_store, borrow_store, book_store),
            stats: stats::StatsService::new(
                repository.clone(),
                redis.clone(),
                library.trend_days,
                library.dashboard_cache_ttl_seconds,
            ),
            export: export::ExportService::new(repository.clone()),
            recommendations: recommendations::RecommendationsService::new(repository, redis, library),
        }
    }
}
