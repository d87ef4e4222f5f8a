//! Password hashing with bcrypt.
//!
//! bcrypt is deliberately slow, so both operations run on the blocking pool.

use thiserror::Error;

/// Default bcrypt work factor.
pub const DEFAULT_BCRYPT_COST: u32 = 12;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("bcrypt failure: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
    #[error("hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// One-way password hashing with a matching verify.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub async fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let password = password.to_string();
        let cost = self.cost;
        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
        Ok(hash)
    }

    /// Returns `Ok(false)` on mismatch; errors only for malformed hashes.
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let password = password.to_string();
        let hash = hash.to_string();
        let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;
        Ok(matches)
    }
}
