use serde::Serialize;
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Fields for inserting a new user.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

/// Public user profile. Never exposes the id or password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub email: String,
    pub name: String,
    pub username: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            email: user.email,
            name: user.name,
            username: user.username,
        }
    }
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a user. Returns the user ID.
    pub async fn create(&self, user: &NewUser<'_>) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO users (name, username, email, password_hash) VALUES (?, ?, ?, ?)",
        )
        .bind(user.name)
        .bind(user.username)
        .bind(user.email)
        .bind(user.password_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT id, name, username, email, password_hash FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Get a user by username.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, name, username, email, password_hash FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
    }

    /// Get a user whose email or username equals `identifier`. An email match
    /// wins over another account whose username has the same text.
    pub async fn get_by_email_or_username(
        &self,
        identifier: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, name, username, email, password_hash FROM users WHERE email = ?1 OR username = ?1 ORDER BY email = ?1 DESC LIMIT 1",
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }

    /// Delete a user by ID. Their refresh tokens go with them.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
