//! Shared error handling for API endpoints.
//!
//! Every error leaves as the same JSON envelope (see [`ErrorBody`]). Handlers
//! don't know the request path, so [`error_envelope`] fills it in on the way out.

use axum::{
    Json,
    extract::{Request, rejection::JsonRejection},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::error;
use validator::ValidationErrors;

use crate::auth::{AUTHENTICATION_EXCEPTION, ErrorBody};
use crate::service::AuthError;

pub const VALIDATION_EXCEPTION: &str = "VALIDATION_EXCEPTION";
pub const CONFLICT_EXCEPTION: &str = "CONFLICT_EXCEPTION";
pub const DEFAULT_EXCEPTION: &str = "DEFAULT_EXCEPTION";

/// API error type with automatic response conversion.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Conflict(String),
    /// Details are logged where the error is created; the client gets a generic message.
    Internal,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::Internal
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials
            | AuthError::NotAuthenticated
            | AuthError::UserNotFound
            | AuthError::RefreshTokenNotFound
            | AuthError::RefreshTokenExpired => Self::unauthorized(e.to_string()),
            AuthError::OrphanedRefreshToken => {
                Self::unauthorized(AuthError::RefreshTokenNotFound.to_string())
            }
            AuthError::EmailTaken | AuthError::UsernameTaken | AuthError::AlreadyExists => {
                Self::conflict(e.to_string())
            }
            AuthError::Token(e) => Self::internal("Failed to issue access token", e),
            AuthError::Password(e) => Self::internal("Password hashing failed", e),
            AuthError::Database(e) => Self::internal("Database error", e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::bad_request(validation_message(&errors))
    }
}

/// `field: message` for every violation, sorted by field.
fn validation_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by_key(|(field, _)| *field);

    fields
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(msg) => format!("{}: {}", field, msg),
                None => format!("{}: {}", field, e.code),
            })
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Error body waiting for its request path, attached to the response by [`ApiError`].
#[derive(Clone)]
struct PendingError(ErrorBody);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, code) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, VALIDATION_EXCEPTION),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, AUTHENTICATION_EXCEPTION),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg, CONFLICT_EXCEPTION),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                DEFAULT_EXCEPTION,
            ),
        };

        let body = ErrorBody::new(message, "", code);
        let mut response = (status, Json(body.clone())).into_response();
        response.extensions_mut().insert(PendingError(body));
        response
    }
}

/// Middleware that stamps the request path into API error bodies.
pub async fn error_envelope(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let mut response = next.run(request).await;

    match response.extensions_mut().remove::<PendingError>() {
        Some(PendingError(mut body)) => {
            body.path = path;
            (response.status(), Json(body)).into_response()
        }
        None => response,
    }
}
