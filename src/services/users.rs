//! User administration: listing, approval and roles

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::user::{User, UserQuery, UserRole, UserStatus, UserSummary},
    repository::Repository,
};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    pub users: Vec<UserSummary>,
    pub total: i64,
}

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
}

impl UsersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self, query: &UserQuery) -> AppResult<UserPage> {
        let (users, total) = self.repository.users.list(query).await?;
        Ok(UserPage { users, total })
    }

    pub async fn update_status(&self, id: Uuid, status: UserStatus, changed_by: &str) -> AppResult<User> {
        let user = self.repository.users.update_status(id, status).await?;
        tracing::info!(user_id = %id, ?status, changed_by, "User status changed");
        Ok(user)
    }

    pub async fn update_role(&self, id: Uuid, role: UserRole, changed_by: &str) -> AppResult<User> {
        let user = self.repository.users.update_role(id, role).await?;
        tracing::info!(user_id = %id, ?role, changed_by, "User role changed");
        Ok(user)
    }
}
