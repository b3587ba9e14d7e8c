//! Admin access guard

use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::user::{UserClaims, UserRole},
    repository::users::UserDirectory,
};

#[derive(Clone)]
pub struct AccessGuard {
    users: Arc<dyn UserDirectory>,
}

impl AccessGuard {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self { users }
    }

    /// Trust the session claim when it says ADMIN, otherwise verify the
    /// persisted role so a promotion takes effect before the token expires.
    pub async fn require_admin_role(&self, session: Option<&UserClaims>) -> AppResult<()> {
        let claims = session
            .ok_or_else(|| AppError::Authentication("Authentication required".to_string()))?;

        if claims.claims_admin() {
            return Ok(());
        }

        match self.users.role_of(claims.sub).await? {
            Some(UserRole::Admin) => {
                tracing::debug!(user_id = %claims.sub, "Admin role confirmed from database");
                Ok(())
            }
            _ => {
                tracing::warn!(user_id = %claims.sub, "Admin access denied");
                Err(AppError::Authorization("Admin access required".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::users::MockUserDirectory;
    use chrono::Utc;
    use tokio_test::assert_ok;
    use uuid::Uuid;

    fn claims(role: UserRole) -> UserClaims {
        let now = Utc::now().timestamp();
        UserClaims {
            sub: Uuid::new_v4(),
            email: "reader@example.edu".to_string(),
            name: "Reader".to_string(),
            role,
            exp: now + 3600,
            iat: now,
        }
    }

    #[tokio::test]
    async fn missing_session_is_unauthenticated() {
        let mut users = MockUserDirectory::new();
        users.expect_role_of().never();
        let guard = AccessGuard::new(Arc::new(users));

        let result = guard.require_admin_role(None).await;
        assert!(matches!(result, Err(AppError::Authentication(_))));
    }

    #[tokio::test]
    async fn admin_claim_skips_lookup() {
        let mut users = MockUserDirectory::new();
        users.expect_role_of().never();
        let guard = AccessGuard::new(Arc::new(users));

        assert_ok!(guard.require_admin_role(Some(&claims(UserRole::Admin))).await);
    }

    #[tokio::test]
    async fn stale_user_claim_is_rechecked_against_database() {
        let mut users = MockUserDirectory::new();
        users
            .expect_role_of()
            .times(1)
            .returning(|_| Ok(Some(UserRole::Admin)));
        let guard = AccessGuard::new(Arc::new(users));

        assert_ok!(guard.require_admin_role(Some(&claims(UserRole::User))).await);
    }

    #[tokio::test]
    async fn non_admin_is_forbidden() {
        let mut users = MockUserDirectory::new();
        users
            .expect_role_of()
            .returning(|_| Ok(Some(UserRole::User)));
        let guard = AccessGuard::new(Arc::new(users));

        let result = guard.require_admin_role(Some(&claims(UserRole::User))).await;
        assert!(matches!(result, Err(AppError::Authorization(_))));
    }

    #[tokio::test]
    async fn deleted_user_is_forbidden() {
        let mut users = MockUserDirectory::new();
        users.expect_role_of().returning(|_| Ok(None));
        let guard = AccessGuard::new(Arc::new(users));

        let result = guard.require_admin_role(Some(&claims(UserRole::User))).await;
        assert!(matches!(result, Err(AppError::Authorization(_))));
    }
}
