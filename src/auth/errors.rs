//! Authentication error types and the shared error envelope.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

/// Error code carried by every 401.
pub const AUTHENTICATION_EXCEPTION: &str = "AUTHENTICATION_EXCEPTION";

/// JSON body of every error response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub message: String,
    /// RFC 3339, UTC, millisecond precision
    pub timestamp: String,
    pub path: String,
    pub error_code: &'static str,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>, path: impl Into<String>, error_code: &'static str) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            path: path.into(),
            error_code,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    MissingHeader,
    InvalidToken,
}

/// Interceptor rejection of a protected request.
#[derive(Debug)]
pub struct AuthRejection {
    kind: RejectionKind,
    path: String,
}

impl AuthRejection {
    pub fn new(kind: RejectionKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    fn message(&self) -> &'static str {
        match self.kind {
            RejectionKind::MissingHeader => "Missing or invalid Authorization header",
            RejectionKind::InvalidToken => "Invalid or expired token",
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let body = ErrorBody::new(self.message(), self.path, AUTHENTICATION_EXCEPTION);
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}
