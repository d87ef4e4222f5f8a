//! Request authentication middleware.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use super::errors::{AuthRejection, RejectionKind};
use super::identity::Principal;
use super::paths::PublicPaths;
use crate::jwt::TokenCodec;

/// Request header carrying the authenticated username to downstream handlers.
pub const AUTH_USERNAME_HEADER: HeaderName = HeaderName::from_static("x-auth-username");

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Clone)]
pub struct InterceptorState {
    pub codec: Arc<TokenCodec>,
    pub public_paths: Arc<PublicPaths>,
}

/// Gate every request: public paths pass through, everything else needs a valid bearer token.
pub async fn authenticate(
    State(state): State<InterceptorState>,
    mut request: Request,
    next: Next,
) -> Response {
    // Only this middleware may set the identity header.
    request.headers_mut().remove(&AUTH_USERNAME_HEADER);

    let path = request.uri().path().to_string();
    if state.public_paths.is_public(&path) {
        return next.run(request).await;
    }

    let Some(token) = bearer_token(request.headers()) else {
        debug!(path = %path, "Rejected request without bearer token");
        return AuthRejection::new(RejectionKind::MissingHeader, path).into_response();
    };

    let claims = match state.codec.verify(token) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(path = %path, error = %e, "Rejected request with bad token");
            return AuthRejection::new(RejectionKind::InvalidToken, path).into_response();
        }
    };

    match HeaderValue::from_str(&claims.sub) {
        Ok(value) => {
            request.headers_mut().insert(AUTH_USERNAME_HEADER, value);
        }
        Err(_) => warn!(path = %path, "Subject is not a valid header value, not forwarding it"),
    }
    request.extensions_mut().insert(Principal::new(claims.sub));

    next.run(request).await
}

/// Parse `Authorization: Bearer <token>`.
///
/// The scheme is case-sensitive, followed by exactly one space and a non-empty
/// token with no further spaces.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix(BEARER_PREFIX)?;

    if token.is_empty() || token.contains(' ') {
        return None;
    }
    Some(token)
}
