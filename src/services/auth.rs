//! Registration, login and session tokens

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{RegisterUser, User, UserClaims, UserStatus},
    repository::{users::NewUser, Repository},
};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: User,
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// New accounts start PENDING until an admin approves them
    pub async fn register(&self, request: RegisterUser) -> AppResult<User> {
        let user = self
            .repository
            .users
            .create(&NewUser {
                full_name: request.full_name.trim().to_string(),
                email: request.email.trim().to_string(),
                university_id: request.university_id,
                university_card: request.university_card,
                password_hash: hash_password(&request.password)?,
            })
            .await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<LoginResponse> {
        let invalid = || AppError::Authentication("Invalid email or password".to_string());

        let user = self.repository.users.get_by_email(email.trim()).await?.ok_or_else(invalid)?;
        if !verify_password(&user.password_hash, password)? {
            tracing::warn!(user_id = %user.id, "Failed login attempt");
            return Err(invalid());
        }
        if user.status == UserStatus::Rejected {
            return Err(AppError::Authorization("This account has been rejected".to_string()));
        }

        let now = Utc::now();
        let claims = UserClaims::for_user(&user, now, self.config.jwt_expiration_hours);
        let token = claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        self.repository.users.touch_activity(user.id, now.date_naive()).await?;
        tracing::info!(user_id = %user.id, "User logged in");

        Ok(LoginResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.jwt_expiration_hours * 3600,
            user,
        })
    }

    pub async fn me(&self, user_id: Uuid) -> AppResult<User> {
        self.repository.users.get_by_id(user_id).await
    }
}
