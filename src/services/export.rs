//! CSV and JSON data export

use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        borrow::BorrowStatus,
        user::{UserRole, UserStatus},
    },
    repository::{with_db_retry, Repository},
};

use super::stats::ExportStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Books,
    Users,
    Borrows,
    Analytics,
    BorrowsRange,
}

impl ExportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::Books => "books",
            ExportKind::Users => "users",
            ExportKind::Borrows => "borrows",
            ExportKind::Analytics => "analytics",
            ExportKind::BorrowsRange => "borrows-range",
        }
    }
}

impl FromStr for ExportKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "books" => Ok(ExportKind::Books),
            "users" => Ok(ExportKind::Users),
            "borrows" => Ok(ExportKind::Borrows),
            "analytics" => Ok(ExportKind::Analytics),
            "borrows-range" => Ok(ExportKind::BorrowsRange),
            other => Err(AppError::BadRequest(format!("Unsupported export type: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    /// Anything other than "json" exports as CSV
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => ExportFormat::Json,
            _ => ExportFormat::Csv,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
        }
    }
}

/// Half-open `[start, end)` window on borrow creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Inclusive calendar-day range from the export form
    pub fn from_form(date_from: Option<&str>, date_to: Option<&str>) -> AppResult<Self> {
        let (Some(from), Some(to)) = (date_from, date_to) else {
            return Err(AppError::BadRequest(
                "dateFrom and dateTo are required for borrows-range export".to_string(),
            ));
        };
        let parse = |value: &str| {
            let value = value.trim();
            NaiveDate::parse_from_str(value.get(..10).unwrap_or(value), "%Y-%m-%d").map_err(|_| {
                AppError::BadRequest("dateFrom/dateTo must be valid date values".to_string())
            })
        };
        let start = parse(from)?;
        let end = parse(to)?;
        if end < start {
            return Err(AppError::BadRequest("dateTo must not be before dateFrom".to_string()));
        }

        Ok(Self {
            start: start.and_time(NaiveTime::MIN).and_utc(),
            end: (end + Duration::days(1)).and_time(NaiveTime::MIN).and_utc(),
        })
    }
}

/// A rendered export ready to be sent as an attachment
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub filename: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
struct BookExportRow {
    id: Uuid,
    title: String,
    author: String,
    genre: String,
    rating: f64,
    total_copies: i32,
    available_copies: i32,
    isbn: Option<String>,
    publisher: Option<String>,
    publication_year: Option<i32>,
    language: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
struct UserExportRow {
    id: Uuid,
    full_name: String,
    email: String,
    university_id: i32,
    status: UserStatus,
    role: UserRole,
    last_activity_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    borrow_count: i64,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
struct BorrowExportRow {
    id: Uuid,
    user_name: String,
    user_email: String,
    book_title: String,
    book_author: String,
    status: BorrowStatus,
    borrow_date: Option<DateTime<Utc>>,
    due_date: Option<DateTime<Utc>>,
    return_date: Option<DateTime<Utc>>,
    #[serde(with = "rust_decimal::serde::float")]
    fine_amount: Decimal,
    renewal_count: i32,
    created_at: DateTime<Utc>,
}

#[derive(Debug, PartialEq, Serialize, FromRow)]
struct AnalyticsRow {
    section: String,
    label: String,
    value: i64,
}

/// Serialize rows as CSV (header from field names) or a JSON array
fn render<T: Serialize>(rows: &[T], format: ExportFormat) -> AppResult<Vec<u8>> {
    match format {
        ExportFormat::Json => serde_json::to_vec_pretty(rows)
            .map_err(|e| AppError::Internal(format!("Failed to render JSON export: {}", e))),
        ExportFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            for row in rows {
                writer
                    .serialize(row)
                    .map_err(|e| AppError::Internal(format!("Failed to render CSV export: {}", e)))?;
            }
            writer
                .into_inner()
                .map_err(|e| AppError::Internal(format!("Failed to flush CSV export: {}", e)))
        }
    }
}

fn analytics_rows(totals: &ExportStats, genres: Vec<AnalyticsRow>) -> Vec<AnalyticsRow> {
    let total = |label: &str, value: i64| AnalyticsRow {
        section: "totals".to_string(),
        label: label.to_string(),
        value,
    };
    let mut rows = vec![
        total("books", totals.total_books),
        total("users", totals.total_users),
        total("borrows", totals.total_borrows),
        total("activeBorrows", totals.active_borrows),
        total("overdueBorrows", totals.overdue_borrows),
        total("reviews", totals.total_reviews),
    ];
    rows.extend(genres);
    rows
}

#[derive(Clone)]
pub struct ExportService {
    repository: Repository,
}

impl ExportService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn export(
        &self,
        kind: ExportKind,
        format: ExportFormat,
        range: Option<DateRange>,
    ) -> AppResult<ExportFile> {
        let body = match kind {
            ExportKind::Books => render(&self.books().await?, format)?,
            ExportKind::Users => render(&self.users().await?, format)?,
            ExportKind::Borrows => render(&self.borrows(None).await?, format)?,
            ExportKind::BorrowsRange => {
                let range = range.ok_or_else(|| {
                    AppError::BadRequest("dateFrom and dateTo are required for borrows-range export".to_string())
                })?;
                render(&self.borrows(Some(range)).await?, format)?
            }
            ExportKind::Analytics => render(&self.analytics().await?, format)?,
        };

        tracing::info!(kind = kind.as_str(), bytes = body.len(), "Export generated");
        Ok(ExportFile {
            filename: format!(
                "{}-export-{}.{}",
                kind.as_str(),
                Utc::now().format("%Y-%m-%d"),
                format.extension()
            ),
            content_type: format.content_type(),
            body,
        })
    }

    async fn books(&self) -> AppResult<Vec<BookExportRow>> {
        let pool = &self.repository.pool;
        Ok(with_db_retry(self.repository.retry, move || {
            sqlx::query_as::<_, BookExportRow>(
                r#"
                SELECT id, title, author, genre, rating, total_copies, available_copies,
                       isbn, publisher, publication_year, language, is_active, created_at
                FROM books
                ORDER BY title
                "#,
            )
            .fetch_all(pool)
        })
        .await?)
    }

    async fn users(&self) -> AppResult<Vec<UserExportRow>> {
        let pool = &self.repository.pool;
        Ok(with_db_retry(self.repository.retry, move || {
            sqlx::query_as::<_, UserExportRow>(
                r#"
                SELECT u.id, u.full_name, u.email, u.university_id, u.status, u.role,
                       u.last_activity_date, u.created_at,
                       (SELECT COUNT(*) FROM borrow_records br WHERE br.user_id = u.id) AS borrow_count
                FROM users u
                ORDER BY u.created_at
                "#,
            )
            .fetch_all(pool)
        })
        .await?)
    }

    async fn borrows(&self, range: Option<DateRange>) -> AppResult<Vec<BorrowExportRow>> {
        let pool = &self.repository.pool;
        // Without a range, the window spans every record
        let (start, end) = match range {
            Some(range) => (Some(range.start), Some(range.end)),
            None => (None, None),
        };
        Ok(with_db_retry(self.repository.retry, move || {
            sqlx::query_as::<_, BorrowExportRow>(
                r#"
                SELECT br.id, u.full_name AS user_name, u.email AS user_email,
                       b.title AS book_title, b.author AS book_author, br.status,
                       br.borrow_date, br.due_date, br.return_date, br.fine_amount,
                       br.renewal_count, br.created_at
                FROM borrow_records br
                JOIN users u ON u.id = br.user_id
                JOIN books b ON b.id = br.book_id
                WHERE ($1::timestamptz IS NULL OR br.created_at >= $1)
                  AND ($2::timestamptz IS NULL OR br.created_at < $2)
                ORDER BY br.created_at
                "#,
            )
            .bind(start)
            .bind(end)
            .fetch_all(pool)
        })
        .await?)
    }

    async fn analytics(&self) -> AppResult<Vec<AnalyticsRow>> {
        let pool = &self.repository.pool;
        let totals = with_db_retry(self.repository.retry, move || {
            sqlx::query_as::<_, ExportStats>(
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
            .fetch_one(pool)
        })
        .await?;

        let genres = with_db_retry(self.repository.retry, move || {
            sqlx::query_as::<_, AnalyticsRow>(
                r#"
                SELECT 'borrowsByGenre' AS section, b.genre AS label, COUNT(br.id) AS value
                FROM books b
                LEFT JOIN borrow_records br ON br.book_id = b.id
                GROUP BY b.genre
                ORDER BY value DESC, b.genre
                "#,
            )
            .fetch_all(pool)
        })
        .await?;

        Ok(analytics_rows(&totals, genres))
    }
}
