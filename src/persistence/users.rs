//! User persistence: list for hydration, insert on register.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Row returned from DB (username is stored lowercase).
#[derive(FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// List all users for hydration, oldest registration first.
pub async fn list_users(pool: &PgPool) -> Result<Vec<UserRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, password_hash, created_at FROM users ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Insert a user. Username must already be lowercase. Write-through is
/// best-effort and may replay a row that was hydrated at startup, so a
/// duplicate id is ignored rather than an error.
pub async fn insert_user(
    pool: &PgPool,
    id: Uuid,
    username: &str,
    password_hash: &str,
    created_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (id, username, password_hash, created_at) \
         VALUES ($1, $2, $3, $4) ON CONFLICT (id) DO NOTHING",
    )
    .bind(id)
    .bind(username)
    .bind(password_hash)
    .bind(created_at)
    .execute(pool)
    .await?;
    Ok(())
}
