//! Credential store backed by the `auth_user` table.

use crate::auth::password::hash_password;
use crate::error::AppError;
use sqlx::PgPool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub is_active: bool,
}

pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<UserRecord>, AppError> {
    let user = sqlx::query_as::<_, UserRecord>(
        "SELECT id, username, password_hash, is_active FROM \"auth_user\" WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_active_by_id(pool: &PgPool, id: i64) -> Result<Option<UserRecord>, AppError> {
    let user = sqlx::query_as::<_, UserRecord>(
        "SELECT id, username, password_hash, is_active FROM \"auth_user\" WHERE id = $1 AND is_active",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn touch_last_login(pool: &PgPool, id: i64) -> Result<(), AppError> {
    sqlx::query("UPDATE \"auth_user\" SET last_login = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Create the user when missing. An existing user keeps its password.
pub async fn ensure_user(pool: &PgPool, username: &str, password: &str) -> Result<i64, AppError> {
    if let Some(existing) = find_by_username(pool, username).await? {
        return Ok(existing.id);
    }
    let hash = hash_password(password.to_string()).await?;
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO \"auth_user\" (username, password_hash) VALUES ($1, $2)
         ON CONFLICT (username) DO UPDATE SET username = EXCLUDED.username
         RETURNING id",
    )
    .bind(username)
    .bind(hash)
    .fetch_one(pool)
    .await?;
    tracing::info!(username, id, "bootstrap user created");
    Ok(id)
}
