mod auth;
mod error;

use axum::Router;
use std::sync::Arc;

use crate::service::AuthService;

pub use error::{
    ApiError, CONFLICT_EXCEPTION, DEFAULT_EXCEPTION, VALIDATION_EXCEPTION, error_envelope,
};

/// Create the API router.
pub fn create_api_router(service: Arc<AuthService>) -> Router {
    Router::new().nest("/auth", auth::router(service))
}
