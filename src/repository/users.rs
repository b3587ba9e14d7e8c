//! Users repository for database operations

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::user::{User, UserQuery, UserRole, UserStatus, UserSummary},
};

use super::retry::{with_db_retry, RetryPolicy};

/// Persisted user lookups; the role here is authoritative over token claims
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn role_of(&self, id: Uuid) -> AppResult<Option<UserRole>>;
}

/// Values stored for a new account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub university_id: i32,
    pub university_card: String,
    pub password_hash: String,
}

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
    retry: RetryPolicy,
}

fn push_user_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &UserQuery) {
    builder.push(" WHERE 1 = 1");

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        builder
            .push(" AND (u.full_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.university_id::text ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(status) = query.status {
        builder.push(" AND u.status = ").push_bind(status);
    }
    if let Some(role) = query.role {
        builder.push(" AND u.role = ").push_bind(role);
    }
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<User> {
        self.find(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<User>> {
        let pool = &self.pool;
        let user = with_db_retry(self.retry, move || {
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
        })
        .await?;
        Ok(user)
    }

    /// Get user by email (login identifier)
    pub async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let pool = &self.pool;
        let user = with_db_retry(self.retry, move || {
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
                .bind(email)
                .fetch_optional(pool)
        })
        .await?;
        Ok(user)
    }

    /// Insert a new account, pending approval
    pub async fn create(&self, user: &NewUser) -> AppResult<User> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, full_name, email, university_id, university_card, password_hash, status, role)
            VALUES ($1, $2, LOWER($3), $4, $5, $6, 'PENDING', 'USER')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(user.university_id)
        .bind(&user.university_card)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(
                "An account with this email or university id already exists".to_string(),
            ),
            _ => AppError::Database(e),
        })?;

        Ok(created)
    }

    /// Paginated user list with borrow counts
    pub async fn list(&self, query: &UserQuery) -> AppResult<(Vec<UserSummary>, i64)> {
        let pool = &self.pool;
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (query.page.unwrap_or(1).max(1) - 1) * per_page;

        let total: i64 = with_db_retry(self.retry, move || async move {
            let mut count = QueryBuilder::new("SELECT COUNT(*) FROM users u");
            push_user_filters(&mut count, query);
            count.build_query_scalar().fetch_one(pool).await
        })
        .await?;

        let users = with_db_retry(self.retry, move || async move {
            let mut select = QueryBuilder::new(
                r#"
                SELECT u.id, u.full_name, u.email, u.university_id, u.status, u.role, u.created_at,
                       (SELECT COUNT(*) FROM borrow_records br WHERE br.user_id = u.id) AS borrow_count
                FROM users u
                "#,
            );
            push_user_filters(&mut select, query);
            select
                .push(" ORDER BY u.created_at DESC LIMIT ")
                .push_bind(per_page)
                .push(" OFFSET ")
                .push_bind(offset);
            select.build_query_as::<UserSummary>().fetch_all(pool).await
        })
        .await?;

        Ok((users, total))
    }

    /// Set account status
    pub async fn update_status(&self, id: Uuid, status: UserStatus) -> AppResult<User> {
        let pool = &self.pool;
        with_db_retry(self.retry, move || {
            sqlx::query_as::<_, User>("UPDATE users SET status = $2 WHERE id = $1 RETURNING *")
                .bind(id)
                .bind(status)
                .fetch_optional(pool)
        })
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Set account role
    pub async fn update_role(&self, id: Uuid, role: UserRole) -> AppResult<User> {
        let pool = &self.pool;
        with_db_retry(self.retry, move || {
            sqlx::query_as::<_, User>("UPDATE users SET role = $2 WHERE id = $1 RETURNING *")
                .bind(id)
                .bind(role)
                .fetch_optional(pool)
        })
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Record the day of the user's latest authenticated activity
    pub async fn touch_activity(&self, id: Uuid, day: NaiveDate) -> AppResult<()> {
        let pool = &self.pool;
        with_db_retry(self.retry, move || {
            sqlx::query(
                r#"
                UPDATE users SET last_activity_date = $2
                WHERE id = $1 AND (last_activity_date IS NULL OR last_activity_date < $2)
                "#,
            )
            .bind(id)
            .bind(day)
            .execute(pool)
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for UsersRepository {
    async fn get(&self, id: Uuid) -> AppResult<Option<User>> {
        self.find(id).await
    }

    async fn role_of(&self, id: Uuid) -> AppResult<Option<UserRole>> {
        let pool = &self.pool;
        let role = with_db_retry(self.retry, move || {
            sqlx::query_scalar::<_, UserRole>("SELECT role FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
        })
        .await?;
        Ok(role)
    }
}
