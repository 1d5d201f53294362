use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use samtale_common::models::auth::User;
use sqlx::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str = "user_id, name, email, password_hash, photo_url, is_admin, reset_token_hash, reset_token_expires_at, created_at, last_login_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub password_hash: String,
    pub photo_url: Option<String>,
    pub is_admin: bool,
    pub reset_token_hash: Option<String>,
    pub reset_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserRow {
    /// Client-safe view: no password hash, no reset token fields.
    pub fn sanitized(&self) -> User {
        User {
            user_id: self.user_id,
            name: self.name.clone(),
            email: self.email.clone(),
            photo_url: self.photo_url.clone(),
            is_admin: self.is_admin,
            created_at: self.created_at,
        }
    }
}

pub struct UserRepo;

impl UserRepo {
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        email: &str,
        password_hash: &str,
        name: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO "user" (user_id, email, password_hash, name) VALUES ($1, $2, $3, $4)"#,
        )
        .bind(user_id)
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .execute(pool)
        .await
        .context("Failed to create user")?;
        Ok(())
    }

    pub async fn set_admin(pool: &PgPool, user_id: Uuid, is_admin: bool) -> Result<()> {
        sqlx::query(r#"UPDATE "user" SET is_admin = $2 WHERE user_id = $1"#)
            .bind(user_id)
            .bind(is_admin)
            .execute(pool)
            .await
            .context("Failed to set admin flag")?;
        Ok(())
    }

    pub async fn get_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"SELECT {} FROM "user" WHERE email = $1"#,
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;
        Ok(row)
    }

    pub async fn get_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"SELECT {} FROM "user" WHERE user_id = $1"#,
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by id")?;
        Ok(row)
    }

    pub async fn touch_last_login(pool: &PgPool, user_id: Uuid) -> Result<()> {
        sqlx::query(r#"UPDATE "user" SET last_login_at = NOW() WHERE user_id = $1"#)
            .bind(user_id)
            .execute(pool)
            .await
            .context("Failed to update last_login_at")?;
        Ok(())
    }

    /// Partial profile update. `None` fields are left untouched.
    pub async fn update_profile(
        pool: &PgPool,
        user_id: Uuid,
        name: Option<&str>,
        photo_url: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"UPDATE "user" SET name = COALESCE($2, name), photo_url = COALESCE($3, photo_url) WHERE user_id = $1"#,
        )
        .bind(user_id)
        .bind(name)
        .bind(photo_url)
        .execute(pool)
        .await
        .context("Failed to update profile")?;
        Ok(())
    }

    /// Store a password reset token hash with its expiry, replacing any
    /// previously issued token for this user.
    pub async fn set_reset_token(
        pool: &PgPool,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"UPDATE "user" SET reset_token_hash = $2, reset_token_expires_at = $3 WHERE user_id = $1"#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(pool)
        .await
        .context("Failed to set reset token")?;
        Ok(())
    }

    /// Consume a reset token: set the new password hash and clear the token
    /// fields in one statement, matched only while the token is unexpired.
    /// Returns false when no row matched (unknown, expired, or already used).
    pub async fn reset_password(
        pool: &PgPool,
        token_hash: &str,
        new_password_hash: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"UPDATE "user"
               SET password_hash = $2, reset_token_hash = NULL, reset_token_expires_at = NULL
               WHERE reset_token_hash = $1 AND reset_token_expires_at > NOW()"#,
        )
        .bind(token_hash)
        .bind(new_password_hash)
        .execute(pool)
        .await
        .context("Failed to reset password")?;
        Ok(result.rows_affected() == 1)
    }
}
