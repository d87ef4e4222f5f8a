//! Refresh token storage.
//!
//! Only refresh tokens are stored. Access tokens are stateless. Every write
//! that touches a user's token runs in one transaction, so a cancelled request
//! leaves either the old row or the new one, never both and never neither.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

/// A persisted refresh token.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RefreshToken {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub expiry_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Store for refresh token rows.
pub struct RefreshTokenStore {
    pool: SqlitePool,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Delete every token of `user_id` and insert `token` in its place.
    pub async fn replace_for_user(
        &self,
        user_id: i64,
        token: &str,
        expiry_date: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Result<RefreshToken, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let stored = Self::insert(&mut tx, user_id, token, expiry_date, created_at).await?;
        tx.commit().await?;
        Ok(stored)
    }

    /// Swap the token with id `old_id` for `token`.
    ///
    /// Returns `None` without writing anything if `old_id` is no longer
    /// present, i.e. it was already rotated or revoked.
    pub async fn rotate(
        &self,
        old_id: i64,
        user_id: i64,
        token: &str,
        expiry_date: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Result<Option<RefreshToken>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let consumed = sqlx::query("DELETE FROM refresh_tokens WHERE id = ? AND user_id = ?")
            .bind(old_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if consumed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let stored = Self::insert(&mut tx, user_id, token, expiry_date, created_at).await?;
        tx.commit().await?;
        Ok(Some(stored))
    }

    async fn insert(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        user_id: i64,
        token: &str,
        expiry_date: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Result<RefreshToken, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token, expiry_date, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(token)
        .bind(expiry_date)
        .bind(created_at)
        .execute(&mut **tx)
        .await?;

        Ok(RefreshToken {
            id: result.last_insert_rowid(),
            user_id,
            token: token.to_string(),
            expiry_date,
            created_at,
        })
    }

    /// Get a refresh token by its opaque value.
    pub async fn get_by_token(&self, token: &str) -> Result<Option<RefreshToken>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, user_id, token, expiry_date, created_at FROM refresh_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
    }

    /// List the tokens stored for a user (at most one in practice).
    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<RefreshToken>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, user_id, token, expiry_date, created_at FROM refresh_tokens WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Delete a token by row id.
    pub async fn delete_by_id(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete all tokens for a user (logout everywhere).
    pub async fn delete_all_by_user(&self, user_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete all tokens that expired before `now`.
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expiry_date < ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
