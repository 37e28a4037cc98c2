use atelier_models::auth::{RegisterRequest, User};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::PortalError;
use crate::services::credentials::CredentialStore;

pub struct UserService {
    pool: PgPool,
    credentials: CredentialStore,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            credentials: CredentialStore::new(),
        }
    }

    /// Strength is checked before any database work so weak passwords fail
    /// without a round trip.
    pub async fn create_user(&self, request: &RegisterRequest) -> Result<User, PortalError> {
        let email = request.email.trim().to_lowercase();
        let password_hash = self.credentials.hash(&request.password)?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, name, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, name, password_hash, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&email)
        .bind(request.name.trim())
        .bind(&password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                PortalError::Validation("Email is already registered".to_string())
            }
            other => PortalError::Database(other),
        })?;

        Ok(user)
    }

    /// Unknown emails, passwordless accounts, and wrong passwords all come
    /// back as the same error so login responses do not reveal which emails
    /// have accounts.
    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<User, PortalError> {
        let user = self
            .find_by_email(email)
            .await?
            .ok_or(PortalError::InvalidCredentials)?;

        let stored = user
            .password_hash
            .as_deref()
            .ok_or(PortalError::InvalidCredentials)?;
        if !self.credentials.verify(password, stored) {
            return Err(PortalError::InvalidCredentials);
        }

        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, PortalError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, name, password_hash, created_at, updated_at FROM users WHERE email = $1",
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_id(&self, user_id: Uuid) -> Result<User, PortalError> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, name, password_hash, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(PortalError::NotFound("user"))
    }
}
