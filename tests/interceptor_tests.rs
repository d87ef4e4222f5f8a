//! Tests for the request authentication middleware.
//!
//! Tests cover:
//! - Public paths pass without a credential
//! - Missing, malformed and invalid Authorization headers are rejected with 401
//! - Expired and tampered tokens are rejected
//! - The authenticated username reaches downstream handlers
//! - Clients cannot forge the identity header

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    middleware,
    routing::get,
};
use common::*;
use serde_json::Map;
use tower::ServiceExt;
use vaultgate::{
    auth::{
        AUTH_USERNAME_HEADER, AUTHENTICATION_EXCEPTION, Identity, InterceptorState, PublicPaths,
        authenticate,
    },
    jwt::{DEFAULT_ACCESS_TOKEN_TTL, TokenCodec},
};

/// A downstream service that echoes what the interceptor handed it.
fn echo_app(public_paths: &[&str]) -> (Router, TokenCodec) {
    let codec = TokenCodec::new(JWT_SECRET, DEFAULT_ACCESS_TOKEN_TTL);
    let state = InterceptorState {
        codec: Arc::new(codec.clone()),
        public_paths: Arc::new(PublicPaths::new(public_paths)),
    };

    async fn whoami(identity: Identity, headers: HeaderMap) -> String {
        let principal = identity
            .principal()
            .map(|p| p.username.clone())
            .unwrap_or_default();
        let header = headers
            .get(AUTH_USERNAME_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        format!("{}|{}", principal, header)
    }

    let app = Router::new()
        .route("/public/whoami", get(whoami))
        .route("/private/whoami", get(whoami))
        .layer(middleware::from_fn_with_state(state, authenticate));

    (app, codec)
}

fn with_authorization(uri: &str, value: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", value)
        .body(Body::empty())
        .unwrap()
}

async fn body_text(response: axum::http::Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn test_public_path_without_credentials() {
    let (app, _) = echo_app(&["/public"]);

    let response = app.oneshot(get_request("/public/whoami")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "|");
}

#[tokio::test]
async fn test_valid_token_propagates_identity() {
    let (app, codec) = echo_app(&["/public"]);
    let token = codec.issue("alice", Map::new()).unwrap();

    let response = app
        .oneshot(bearer_request("GET", "/private/whoami", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "alice|alice");
}

#[tokio::test]
async fn test_missing_header_rejected() {
    let (app, _) = echo_app(&["/public"]);

    let response = app.oneshot(get_request("/private/whoami")).await.unwrap();

    let body = assert_error(
        response,
        StatusCode::UNAUTHORIZED,
        AUTHENTICATION_EXCEPTION,
        "/private/whoami",
    )
    .await;
    assert_eq!(body["message"], "Missing or invalid Authorization header");
}

#[tokio::test]
async fn test_malformed_headers_rejected() {
    let (app, codec) = echo_app(&["/public"]);
    let token = codec.issue("alice", Map::new()).unwrap();

    let values = [
        format!("bearer {}", token),
        format!("Bearer  {}", token),
        format!("Basic {}", token),
        token.clone(),
        "Bearer ".to_string(),
        format!("Bearer {} extra", token),
    ];

    for value in values {
        let response = app
            .clone()
            .oneshot(with_authorization("/private/whoami", &value))
            .await
            .unwrap();

        let body = assert_error(
            response,
            StatusCode::UNAUTHORIZED,
            AUTHENTICATION_EXCEPTION,
            "/private/whoami",
        )
        .await;
        assert_eq!(
            body["message"], "Missing or invalid Authorization header",
            "header: {}",
            value
        );
    }
}

#[tokio::test]
async fn test_invalid_token_rejected() {
    let (app, _) = echo_app(&["/public"]);

    let response = app
        .oneshot(bearer_request("GET", "/private/whoami", "not.a.jwt"))
        .await
        .unwrap();

    let body = assert_error(
        response,
        StatusCode::UNAUTHORIZED,
        AUTHENTICATION_EXCEPTION,
        "/private/whoami",
    )
    .await;
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn test_token_from_other_secret_rejected() {
    let (app, _) = echo_app(&["/public"]);
    let other = TokenCodec::new(
        b"a-completely-different-secret-value!!",
        DEFAULT_ACCESS_TOKEN_TTL,
    );
    let token = other.issue("alice", Map::new()).unwrap();

    let response = app
        .oneshot(bearer_request("GET", "/private/whoami", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let (app, _) = echo_app(&["/public"]);
    let expired = TokenCodec::new(JWT_SECRET, Duration::ZERO);
    let token = expired.issue("alice", Map::new()).unwrap();

    let response = app
        .oneshot(bearer_request("GET", "/private/whoami", &token))
        .await
        .unwrap();

    let body = assert_error(
        response,
        StatusCode::UNAUTHORIZED,
        AUTHENTICATION_EXCEPTION,
        "/private/whoami",
    )
    .await;
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn test_spoofed_identity_header_stripped() {
    let (app, codec) = echo_app(&["/public"]);

    // Public path: the forged header must not reach the handler
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/public/whoami")
                .header("x-auth-username", "admin")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_text(response).await, "|");

    // Protected path: the header is replaced with the token subject
    let token = codec.issue("alice", Map::new()).unwrap();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/private/whoami")
                .header("authorization", format!("Bearer {}", token))
                .header("x-auth-username", "admin")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_text(response).await, "alice|alice");
}

#[tokio::test]
async fn test_unknown_route_requires_auth() {
    let (app, _) = create_test_app().await;

    let response = app.oneshot(get_request("/does/not/exist")).await.unwrap();

    assert_error(
        response,
        StatusCode::UNAUTHORIZED,
        AUTHENTICATION_EXCEPTION,
        "/does/not/exist",
    )
    .await;
}

#[tokio::test]
async fn test_custom_public_paths() {
    let (app, _) = create_test_app_with(|config| {
        config.public_paths = vec!["/auth/me".to_string()];
    })
    .await;

    // /auth/me is public now: no 401 from the interceptor, the handler reports no identity
    let response = app.clone().oneshot(get_request("/auth/me")).await.unwrap();
    let body = assert_error(
        response,
        StatusCode::UNAUTHORIZED,
        AUTHENTICATION_EXCEPTION,
        "/auth/me",
    )
    .await;
    assert_eq!(body["message"], "Not authenticated");

    // /auth/register is no longer public
    let response = register(&app, "alice").await;
    let body = assert_error(
        response,
        StatusCode::UNAUTHORIZED,
        AUTHENTICATION_EXCEPTION,
        "/auth/register",
    )
    .await;
    assert_eq!(body["message"], "Missing or invalid Authorization header");
}
