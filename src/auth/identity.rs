//! Per-request authenticated identity.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

/// The authenticated caller of a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    /// Always empty; access tokens carry no role claims.
    pub roles: Vec<String>,
}

impl Principal {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            roles: Vec::new(),
        }
    }
}

/// Extractor for the request's principal, if the request was authenticated.
///
/// Never rejects. Public paths and unauthenticated requests yield `Identity(None)`.
#[derive(Debug, Clone, Default)]
pub struct Identity(pub Option<Principal>);

impl Identity {
    pub fn principal(&self) -> Option<&Principal> {
        self.0.as_ref()
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Identity(parts.extensions.get::<Principal>().cloned()))
    }
}
