//! Scheduled removal of expired refresh tokens.

use crate::db::Database;
use chrono::Utc;
use std::time::Duration;
use tracing::{error, info};

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60); // 1 hour

/// Run all cleanup tasks once.
pub async fn run_cleanup(db: &Database) {
    match db.refresh_tokens().delete_expired(Utc::now()).await {
        Ok(count) if count > 0 => info!("Cleaned up {} expired refresh tokens", count),
        Ok(_) => {}
        Err(e) => error!("Failed to clean up expired refresh tokens: {}", e),
    }
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(db: Database) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        // The first tick fires immediately; startup already ran a pass.
        interval.tick().await;

        loop {
            interval.tick().await;
            run_cleanup(&db).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewUser;
    use chrono::TimeDelta;

    #[tokio::test]
    async fn test_run_cleanup_removes_only_expired() {
        let db = Database::open(":memory:").await.unwrap();
        let users = db.users();
        let alice = users
            .create(&NewUser {
                name: "Alice",
                username: "alice",
                email: "alice@example.com",
                password_hash: "hash",
            })
            .await
            .unwrap();
        let bob = users
            .create(&NewUser {
                name: "Bob",
                username: "bob",
                email: "bob@example.com",
                password_hash: "hash",
            })
            .await
            .unwrap();

        let now = Utc::now();
        db.refresh_tokens()
            .replace_for_user(alice, "stale", now - TimeDelta::minutes(1), now)
            .await
            .unwrap();
        db.refresh_tokens()
            .replace_for_user(bob, "live", now + TimeDelta::days(1), now)
            .await
            .unwrap();

        run_cleanup(&db).await;

        assert!(db.refresh_tokens().get_by_token("stale").await.unwrap().is_none());
        assert!(db.refresh_tokens().get_by_token("live").await.unwrap().is_some());
    }
}
