//! Account and session operations behind the `/auth` endpoints.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Map;
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::Identity;
use crate::db::{Database, NewUser, User, UserProfile};
use crate::jwt::{TokenCodec, TokenError};
use crate::password::{PasswordError, PasswordHasher};
use crate::refresh::{RefreshError, RefreshTokenManager};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("User not found")]
    UserNotFound,
    #[error("Refresh token not found")]
    RefreshTokenNotFound,
    #[error("Refresh token expired")]
    RefreshTokenExpired,
    /// Stored token whose owner no longer exists.
    #[error("Refresh token has no owner")]
    OrphanedRefreshToken,
    #[error("Email already in use")]
    EmailTaken,
    #[error("Username already in use")]
    UsernameTaken,
    #[error("User already exists")]
    AlreadyExists,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<RefreshError> for AuthError {
    fn from(e: RefreshError) -> Self {
        match e {
            RefreshError::Expired => Self::RefreshTokenExpired,
            RefreshError::Superseded => Self::RefreshTokenNotFound,
            RefreshError::Store(e) => Self::Database(e),
        }
    }
}

/// Access and refresh token issued together.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Validated input for a new account.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub name: String,
    pub username: String,
    pub password: String,
}

pub struct AuthService {
    db: Database,
    codec: Arc<TokenCodec>,
    refresh_tokens: RefreshTokenManager,
    hasher: PasswordHasher,
}

impl AuthService {
    pub fn new(
        db: Database,
        codec: Arc<TokenCodec>,
        refresh_tokens: RefreshTokenManager,
        hasher: PasswordHasher,
    ) -> Self {
        Self {
            db,
            codec,
            refresh_tokens,
            hasher,
        }
    }

    pub async fn register(&self, registration: Registration) -> Result<UserProfile, AuthError> {
        let users = self.db.users();

        if users.email_exists(&registration.email).await? {
            return Err(AuthError::EmailTaken);
        }
        if users.username_exists(&registration.username).await? {
            return Err(AuthError::UsernameTaken);
        }

        let password_hash = self.hasher.hash(&registration.password).await?;

        let new_user = NewUser {
            name: &registration.name,
            username: &registration.username,
            email: &registration.email,
            password_hash: &password_hash,
        };
        let id = match users.create(&new_user).await {
            Ok(id) => id,
            // Lost a race with a concurrent registration
            Err(e) if e.as_database_error().is_some_and(|d| d.is_unique_violation()) => {
                return Err(AuthError::AlreadyExists);
            }
            Err(e) => return Err(e.into()),
        };

        info!(user_id = id, username = %registration.username, "User registered");

        Ok(UserProfile {
            email: registration.email,
            name: registration.name,
            username: registration.username,
        })
    }

    pub async fn login(&self, email_or_username: &str, password: &str) -> Result<TokenPair, AuthError> {
        let user = self
            .db
            .users()
            .get_by_email_or_username(email_or_username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.hasher.verify(password, &user.password_hash).await? {
            return Err(AuthError::InvalidCredentials);
        }

        let access_token = self.codec.issue(&user.username, Map::new())?;
        let refresh_token = self.refresh_tokens.create(&user).await?;

        info!(user_id = user.id, "User logged in");

        Ok(TokenPair {
            access_token,
            refresh_token: refresh_token.token,
        })
    }

    /// Exchange a refresh token for a new pair. The presented token is consumed.
    pub async fn refresh(&self, token: &str) -> Result<TokenPair, AuthError> {
        let stored = self
            .db
            .refresh_tokens()
            .get_by_token(token)
            .await?
            .ok_or(AuthError::RefreshTokenNotFound)?;

        let stored = self.refresh_tokens.verify_expiration(stored).await?;

        let Some(user) = self.db.users().get_by_id(stored.user_id).await? else {
            warn!(token_id = stored.id, user_id = stored.user_id, "Refresh token owner is missing");
            return Err(AuthError::OrphanedRefreshToken);
        };

        let access_token = self.codec.issue(&user.username, Map::new())?;
        let refresh_token = self.refresh_tokens.rotate(&stored, &user).await?;

        Ok(TokenPair {
            access_token,
            refresh_token: refresh_token.token,
        })
    }

    /// Revoke every refresh token of the caller.
    pub async fn logout(&self, identity: &Identity) -> Result<(), AuthError> {
        let user = self.current_user(identity).await?;
        let revoked = self.refresh_tokens.revoke_all(&user).await?;

        info!(user_id = user.id, revoked, "User logged out");
        Ok(())
    }

    pub async fn profile(&self, identity: &Identity) -> Result<UserProfile, AuthError> {
        self.current_user(identity).await.map(UserProfile::from)
    }

    async fn current_user(&self, identity: &Identity) -> Result<User, AuthError> {
        let principal = identity.principal().ok_or(AuthError::NotAuthenticated)?;

        self.db
            .users()
            .get_by_username(&principal.username)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}
