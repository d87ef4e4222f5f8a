//! Refresh token issuance and rotation.
//!
//! A user has at most one live refresh token. Issuing or rotating replaces the
//! previous one. Work for the same user is serialized through a per-user lock,
//! and the UNIQUE index on `refresh_tokens(user_id)` backs that up in the store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{TimeDelta, Utc};
use rand::RngCore;
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use crate::db::{Database, RefreshToken, User};
use crate::jwt::bounded_ttl;

/// Default refresh token lifetime: 7 days.
pub const DEFAULT_REFRESH_TOKEN_TTL: Duration = Duration::from_millis(604_800_000);

/// Random bytes per refresh token.
const TOKEN_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("Refresh token expired")]
    Expired,
    /// The token was consumed by a concurrent rotation or a logout.
    #[error("Refresh token no longer active")]
    Superseded,
    #[error("Refresh token store failure: {0}")]
    Store(#[from] sqlx::Error),
}

/// Per-user async locks. Entries are weak so an idle user costs nothing.
#[derive(Default)]
struct UserLocks {
    locks: Mutex<HashMap<i64, Weak<tokio::sync::Mutex<()>>>>,
}

impl UserLocks {
    async fn acquire(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            // A poisoned map only means another thread panicked mid-insert; the map is still usable.
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.retain(|_, weak| weak.strong_count() > 0);

            match locks.get(&user_id).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(tokio::sync::Mutex::new(()));
                    locks.insert(user_id, Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.retain(|_, weak| weak.strong_count() > 0);
        locks.len()
    }
}

/// Owns the refresh token lifecycle on top of the store.
pub struct RefreshTokenManager {
    db: Database,
    ttl: TimeDelta,
    locks: UserLocks,
}

impl RefreshTokenManager {
    pub fn new(db: Database, ttl: Duration) -> Self {
        Self {
            db,
            ttl: bounded_ttl(ttl),
            locks: UserLocks::default(),
        }
    }

    /// Issue a fresh refresh token for `user`, replacing any existing one.
    pub async fn create(&self, user: &User) -> Result<RefreshToken, RefreshError> {
        let _guard = self.locks.acquire(user.id).await;

        let now = Utc::now();
        let token = self
            .db
            .refresh_tokens()
            .replace_for_user(user.id, &generate_token(), now + self.ttl, now)
            .await?;

        debug!(user_id = user.id, "Issued refresh token");
        Ok(token)
    }

    /// Check a token's expiry. An expired token is deleted before returning the error.
    pub async fn verify_expiration(&self, token: RefreshToken) -> Result<RefreshToken, RefreshError> {
        if token.expiry_date < Utc::now() {
            self.db.refresh_tokens().delete_by_id(token.id).await?;
            debug!(user_id = token.user_id, "Deleted expired refresh token");
            return Err(RefreshError::Expired);
        }
        Ok(token)
    }

    /// Consume `old` and issue its replacement.
    ///
    /// Fails with [`RefreshError::Superseded`] if `old` is no longer stored, so
    /// two requests racing with the same token cannot both succeed.
    pub async fn rotate(&self, old: &RefreshToken, user: &User) -> Result<RefreshToken, RefreshError> {
        let _guard = self.locks.acquire(user.id).await;

        let now = Utc::now();
        let token = self
            .db
            .refresh_tokens()
            .rotate(old.id, user.id, &generate_token(), now + self.ttl, now)
            .await?
            .ok_or(RefreshError::Superseded)?;

        debug!(user_id = user.id, "Rotated refresh token");
        Ok(token)
    }

    /// Delete every refresh token of `user`. Returns the number removed.
    pub async fn revoke_all(&self, user: &User) -> Result<u64, RefreshError> {
        let _guard = self.locks.acquire(user.id).await;
        Ok(self.db.refresh_tokens().delete_all_by_user(user.id).await?)
    }
}

/// 32 bytes from the thread-local CSPRNG, base64url without padding.
fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
