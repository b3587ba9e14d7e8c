//! Athenaeum Server - University Library Management System
//!
//! REST API server for the university library.

use anyhow::Context;
use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use athenaeum_server::{
    api,
    config::{AppConfig, LoggingConfig},
    repository::{Repository, RetryPolicy},
    services::{redis::RedisService, Services},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_tracing(&config.logging);

    tracing::info!("Starting Athenaeum Server v{}", env!("CARGO_PKG_VERSION"));

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("Database migrations completed");

    // Caches are optional; the server runs without Redis
    let redis = match RedisService::new(&config.redis.url).await {
        Ok(redis) => {
            tracing::info!("Connected to Redis");
            Some(redis)
        }
        Err(e) => {
            tracing::warn!("Redis unavailable, caching disabled: {}", e);
            None
        }
    };

    let retry = RetryPolicy::new(
        config.database.retries,
        Duration::from_millis(config.database.retry_delay_ms),
    );
    let repository = Repository::new(pool.clone(), retry);
    let services = Services::new(repository, &config, redis);

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
        pool,
    };

    let app = create_router(state)?;

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

/// Console output in the configured format, plus optional daily rolling JSON files
fn init_tracing(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("athenaeum_server={},tower_http=debug", logging.level).into());

    let console = if logging.format.eq_ignore_ascii_case("json") {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().boxed()
    };

    let (file, guard) = match logging.directory.as_deref() {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "athenaeum.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();

    guard
}

/// Create the application router with all routes
fn create_router(state: AppState) -> anyhow::Result<Router> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut auth_routes = Router::new()
        .route("/auth/register", post(api::auth::register))
        .route("/auth/login", post(api::auth::login));
    if state.config.rate_limit.enabled {
        // Per-IP limiter on the unauthenticated auth routes
        let limit = &state.config.rate_limit;
        let governor = GovernorConfigBuilder::default()
            .per_millisecond(limit.replenish_interval_ms)
            .burst_size(limit.burst_size)
            .finish()
            .context("Invalid rate limit configuration")?;
        auth_routes = auth_routes.layer(GovernorLayer {
            config: Box::leak(Box::new(governor)),
        });
    }

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Authentication
        .merge(auth_routes)
        .route("/auth/me", get(api::auth::me))
        // Catalog
        .route("/books", get(api::books::list_books))
        .route("/books/genres", get(api::books::list_genres))
        .route("/books/trending", get(api::recommendations::trending_books))
        .route("/books/recommendations", get(api::recommendations::my_recommendations))
        .route("/books/:id", get(api::books::get_book))
        .route(
            "/books/:id/reviews",
            get(api::reviews::list_reviews).post(api::reviews::create_review),
        )
        .route("/books/:id/review-eligibility", get(api::reviews::review_eligibility))
        .route("/books/:id/borrow", post(api::borrows::request_borrow))
        // Borrowing
        .route("/borrows", get(api::borrows::list_my_borrows))
        .route("/borrows/:id/return", post(api::borrows::return_borrow))
        .route("/borrows/:id/renew", post(api::borrows::renew_borrow))
        // Administration
        .route("/admin/books", post(api::books::create_book))
        .route("/admin/books/:id", put(api::books::update_book))
        .route("/admin/users", get(api::users::list_users))
        .route("/admin/users/:id/status", put(api::users::update_user_status))
        .route("/admin/users/:id/role", put(api::users::update_user_role))
        .route("/admin/borrow-requests", get(api::borrows::list_borrow_requests))
        .route("/admin/borrow-requests/:id/approve", post(api::borrows::approve_borrow))
        .route("/admin/borrow-requests/:id/return", post(api::borrows::admin_return_borrow))
        .route(
            "/admin/fine-config",
            get(api::fines::get_fine_config).post(api::fines::update_fine_config),
        )
        .route("/admin/update-overdue-fines", post(api::fines::update_overdue_fines))
        .route("/admin/send-due-reminders", post(api::reminders::send_due_reminders))
        .route("/admin/send-overdue-reminders", post(api::reminders::send_overdue_reminders))
        .route("/admin/reminder-stats", get(api::reminders::reminder_stats))
        .route("/admin/stats", get(api::stats::get_stats))
        .route("/admin/export-stats", get(api::stats::get_export_stats))
        .route("/admin/export/:type", post(api::export::export_data))
        .route(
            "/admin/generate-recommendations",
            post(api::recommendations::generate_recommendations),
        )
        .route(
            "/admin/update-trending-books",
            post(api::recommendations::update_trending_books),
        )
        .route(
            "/admin/refresh-recommendation-cache",
            post(api::recommendations::refresh_recommendation_cache),
        )
        .with_state(state);

    let openapi = api::openapi::create_openapi_router();

    Ok(Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors))
}
