use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::Deserialize;
use validator::Validate;

use super::error::ApiError;
use crate::auth::Identity;
use crate::db::UserProfile;
use crate::service::{AuthService, Registration, TokenPair};

pub fn router(service: Arc<AuthService>) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/refresh/{token}", get(refresh))
        .route("/logout", delete(logout))
        .route("/me", get(me))
        .with_state(service)
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    #[validate(length(min = 1, message = "email or username must not be empty"))]
    email_username: String,
    #[validate(length(min = 1, message = "password must not be empty"))]
    password: String,
}

#[derive(Deserialize, Validate)]
struct RegisterRequest {
    #[validate(
        length(min = 1, message = "email address is required"),
        email(message = "a valid email address is required")
    )]
    email: String,
    #[validate(length(min = 1, message = "name is required"))]
    name: String,
    #[validate(length(min = 1, message = "username is required"))]
    username: String,
    #[validate(length(min = 1, message = "password is required"))]
    password: String,
}

async fn login(
    State(service): State<Arc<AuthService>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, ApiError> {
    let Json(payload) = payload?;
    payload.validate()?;

    let pair = service
        .login(&payload.email_username, &payload.password)
        .await?;
    Ok(Json(pair))
}

async fn register(
    State(service): State<Arc<AuthService>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    payload.validate()?;

    let profile = service
        .register(Registration {
            email: payload.email,
            name: payload.name,
            username: payload.username,
            password: payload.password,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(profile)))
}

async fn refresh(
    State(service): State<Arc<AuthService>>,
    Path(token): Path<String>,
) -> Result<Json<TokenPair>, ApiError> {
    Ok(Json(service.refresh(&token).await?))
}

async fn logout(
    State(service): State<Arc<AuthService>>,
    identity: Identity,
) -> Result<StatusCode, ApiError> {
    service.logout(&identity).await?;
    Ok(StatusCode::OK)
}

async fn me(
    State(service): State<Arc<AuthService>>,
    identity: Identity,
) -> Result<Json<UserProfile>, ApiError> {
    Ok(Json(service.profile(&identity).await?))
}
