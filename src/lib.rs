//! Athenaeum University Library Management System
//!
//! A Rust REST JSON API for a university library: catalog, member approval,
//! borrowing with approval, returns, renewals and fines, reviews,
//! reminders, statistics, exports and recommendations.

use std::sync::Arc;

use sqlx::PgPool;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    pub pool: PgPool,
}
