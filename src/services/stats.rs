//! Admin dashboard statistics

use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{borrow::BorrowStatus, user::UserStatus},
    repository::{with_db_retry, Repository},
};

use super::redis::{cache_get, cache_put, RedisService};

pub const DASHBOARD_CACHE_KEY: &str = "stats:dashboard";

#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserCounts {
    pub total_users: i64,
    pub approved_users: i64,
    pub pending_users: i64,
    pub rejected_users: i64,
    pub admin_users: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookCounts {
    pub total_books: i64,
    pub total_copies: i64,
    pub available_copies: i64,
    pub active_books: i64,
    pub inactive_books: i64,
    pub books_with_isbn: i64,
    pub books_with_publisher: i64,
    pub average_page_count: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowCounts {
    pub active_borrows: i64,
    pub pending_borrows: i64,
    pub returned_books: i64,
    pub overdue_borrows: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecentBorrow {
    pub id: Uuid,
    pub book_title: String,
    pub user_name: String,
    pub status: BorrowStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecentUser {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub status: UserStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenreStats {
    pub genre: String,
    pub count: i64,
    pub total_copies: i64,
    pub available_copies: i64,
    pub avg_rating: f64,
}

/// Generic (label, count) bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TopRatedBook {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub rating: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub borrows: i64,
    pub returns: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    #[serde(flatten)]
    pub users: UserCounts,
    #[serde(flatten)]
    pub books: BookCounts,
    pub borrowed_copies: i64,
    #[serde(flatten)]
    pub borrows: BorrowCounts,
    pub recent_borrows: Vec<RecentBorrow>,
    pub recent_users: Vec<RecentUser>,
    pub category_stats: Vec<GenreStats>,
    pub books_by_year: Vec<LabelCount>,
    pub books_by_language: Vec<LabelCount>,
    pub top_rated_books: Vec<TopRatedBook>,
    pub borrow_trends: Vec<TrendPoint>,
}

/// Totals shown on the export page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportStats {
    pub total_books: i64,
    pub total_users: i64,
    pub total_borrows: i64,
    pub active_borrows: i64,
    pub overdue_borrows: i64,
    pub total_reviews: i64,
}

/// One entry per day from `start`, zero-filled where no activity was recorded
pub fn build_trend_series(
    start: NaiveDate,
    days: u32,
    borrows: &[(NaiveDate, i64)],
    returns: &[(NaiveDate, i64)],
) -> Vec<TrendPoint> {
    let count_on = |series: &[(NaiveDate, i64)], day: NaiveDate| {
        series
            .iter()
            .filter(|(d, _)| *d == day)
            .map(|(_, c)| *c)
            .sum::<i64>()
    };

    (0..days)
        .map(|offset| {
            let date = start + Duration::days(offset as i64);
            TrendPoint {
                date,
                borrows: count_on(borrows, date),
                returns: count_on(returns, date),
            }
        })
        .collect()
}

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
    redis: Option<RedisService>,
    trend_days: u32,
    cache_ttl_seconds: u64,
}

impl StatsService {
    pub fn new(repository: Repository, redis: Option<RedisService>, trend_days: u32, cache_ttl_seconds: u64) -> Self {
        Self {
            repository,
            redis,
            trend_days: trend_days.max(1),
            cache_ttl_seconds,
        }
    }

    async fn fetch_one<T>(&self, sql: &'static str) -> AppResult<T>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin + 'static,
    {
        let pool = &self.repository.pool;
        Ok(with_db_retry(self.repository.retry, move || sqlx::query_as::<_, T>(sql).fetch_one(pool)).await?)
    }

    async fn fetch_all<T>(&self, sql: &'static str) -> AppResult<Vec<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin + 'static,
    {
        let pool = &self.repository.pool;
        Ok(with_db_retry(self.repository.retry, move || sqlx::query_as::<_, T>(sql).fetch_all(pool)).await?)
    }

    /// Dashboard projection, served from cache when fresh
    pub async fn dashboard(&self) -> AppResult<DashboardStats> {
        if let Some(stats) = cache_get(self.redis.as_ref(), DASHBOARD_CACHE_KEY).await {
            return Ok(stats);
        }

        let stats = self.compute_dashboard().await?;
        cache_put(self.redis.as_ref(), DASHBOARD_CACHE_KEY, &stats, self.cache_ttl_seconds).await;
        Ok(stats)
    }

    async fn compute_dashboard(&self) -> AppResult<DashboardStats> {
        let (users, books, borrows) = tokio::try_join!(
            self.fetch_one::<UserCounts>(
                r#"
                SELECT
                    COUNT(*) AS total_users,
                    COUNT(*) FILTER (WHERE status = 'APPROVED') AS approved_users,
                    COUNT(*) FILTER (WHERE status = 'PENDING') AS pending_users,
                    COUNT(*) FILTER (WHERE status = 'REJECTED') AS rejected_users,
                    COUNT(*) FILTER (WHERE role = 'ADMIN') AS admin_users
                FROM users
                "#,
            ),
            self.fetch_one::<BookCounts>(
                r#"
                SELECT
                    COUNT(*) AS total_books,
                    COALESCE(SUM(total_copies), 0)::int8 AS total_copies,
                    COALESCE(SUM(available_copies), 0)::int8 AS available_copies,
                    COUNT(*) FILTER (WHERE is_active) AS active_books,
                    COUNT(*) FILTER (WHERE NOT is_active) AS inactive_books,
                    COUNT(*) FILTER (WHERE isbn IS NOT NULL AND isbn <> '') AS books_with_isbn,
                    COUNT(*) FILTER (WHERE publisher IS NOT NULL AND publisher <> '') AS books_with_publisher,
                    COALESCE(ROUND(AVG(page_count)), 0)::float8 AS average_page_count
                FROM books
                "#,
            ),
            self.fetch_one::<BorrowCounts>(
                r#"
                SELECT
                    COUNT(*) FILTER (WHERE status = 'BORROWED') AS active_borrows,
                    COUNT(*) FILTER (WHERE status = 'PENDING') AS pending_borrows,
                    COUNT(*) FILTER (WHERE status = 'RETURNED') AS returned_books,
                    COUNT(*) FILTER (WHERE status = 'BORROWED' AND due_date < NOW()) AS overdue_borrows
                FROM borrow_records
                "#,
            ),
        )?;

        let (recent_borrows, recent_users, category_stats) = tokio::try_join!(
            self.fetch_all::<RecentBorrow>(
                r#"
                SELECT br.id, b.title AS book_title, u.full_name AS user_name, br.status
                FROM borrow_records br
                JOIN users u ON u.id = br.user_id
                JOIN books b ON b.id = br.book_id
                ORDER BY br.created_at DESC
                LIMIT 5
                "#,
            ),
            self.fetch_all::<RecentUser>(
                "SELECT id, full_name, email, status FROM users ORDER BY created_at DESC LIMIT 5",
            ),
            self.fetch_all::<GenreStats>(
                r#"
                SELECT genre, COUNT(*) AS count,
                       COALESCE(SUM(total_copies), 0)::int8 AS total_copies,
                       COALESCE(SUM(available_copies), 0)::int8 AS available_copies,
                       COALESCE(ROUND(AVG(rating)::numeric, 1), 0)::float8 AS avg_rating
                FROM books
                WHERE genre <> ''
                GROUP BY genre
                ORDER BY COUNT(*) DESC
                LIMIT 8
                "#,
            ),
        )?;

        let (mut books_by_year, books_by_language, top_rated_books) = tokio::try_join!(
            self.fetch_all::<LabelCount>(
                r#"
                SELECT publication_year::text AS label, COUNT(*) AS count
                FROM books
                WHERE publication_year IS NOT NULL
                GROUP BY publication_year
                ORDER BY publication_year DESC
                LIMIT 10
                "#,
            ),
            self.fetch_all::<LabelCount>(
                r#"
                SELECT language AS label, COUNT(*) AS count
                FROM books
                WHERE language IS NOT NULL AND language <> ''
                GROUP BY language
                ORDER BY COUNT(*) DESC
                LIMIT 6
                "#,
            ),
            self.fetch_all::<TopRatedBook>(
                r#"
                SELECT id, title, author, rating
                FROM books
                WHERE is_active
                ORDER BY rating DESC, created_at DESC
                LIMIT 6
                "#,
            ),
        )?;
        // Oldest first for charting
        books_by_year.reverse();

        let borrow_trends = self.trend_series().await?;

        Ok(DashboardStats {
            borrowed_copies: (books.total_copies - books.available_copies).max(0),
            users,
            books,
            borrows,
            recent_borrows,
            recent_users,
            category_stats,
            books_by_year,
            books_by_language,
            top_rated_books,
            borrow_trends,
        })
    }

    async fn trend_series(&self) -> AppResult<Vec<TrendPoint>> {
        let start = Utc::now().date_naive() - Duration::days(self.trend_days as i64 - 1);
        let since = start.and_time(NaiveTime::MIN).and_utc();
        let pool = &self.repository.pool;

        let borrows = with_db_retry(self.repository.retry, move || {
            sqlx::query_as::<_, (NaiveDate, i64)>(
                r#"
                SELECT (created_at AT TIME ZONE 'UTC')::date AS day, COUNT(*)
                FROM borrow_records
                WHERE created_at >= $1
                GROUP BY day
                "#,
            )
            .bind(since)
            .fetch_all(pool)
        })
        .await?;

        let returns = with_db_retry(self.repository.retry, move || {
            sqlx::query_as::<_, (NaiveDate, i64)>(
                r#"
                SELECT (return_date AT TIME ZONE 'UTC')::date AS day, COUNT(*)
                FROM borrow_records
                WHERE return_date >= $1
                GROUP BY day
                "#,
            )
            .bind(since)
            .fetch_all(pool)
        })
        .await?;

        Ok(build_trend_series(start, self.trend_days, &borrows, &returns))
    }

    /// Totals for the export page; not cached
    pub async fn export_stats(&self) -> AppResult<ExportStats> {
        self.fetch_one::<ExportStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM books) AS total_books,
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM borrow_records) AS total_borrows,
                (SELECT COUNT(*) FROM borrow_records WHERE status = 'BORROWED') AS active_borrows,
                (SELECT COUNT(*) FROM borrow_records WHERE status = 'BORROWED' AND due_date < NOW()) AS overdue_borrows,
                (SELECT COUNT(*) FROM book_reviews) AS total_reviews
            "#,
        )
        .await
    }
}
