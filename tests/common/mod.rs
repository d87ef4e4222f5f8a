#![allow(dead_code)]

use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use vaultgate::{
    ServerConfig, auth::DEFAULT_PUBLIC_PATHS, create_app, db::Database,
    jwt::DEFAULT_ACCESS_TOKEN_TTL, refresh::DEFAULT_REFRESH_TOKEN_TTL,
};

pub const JWT_SECRET: &[u8] = b"test-jwt-secret-that-is-at-least-32-bytes";
pub const PASSWORD: &str = "Secret123!";

pub fn test_config(db: Database) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: JWT_SECRET.to_vec(),
        access_token_ttl: DEFAULT_ACCESS_TOKEN_TTL,
        refresh_token_ttl: DEFAULT_REFRESH_TOKEN_TTL,
        public_paths: DEFAULT_PUBLIC_PATHS.map(String::from).to_vec(),
        bcrypt_cost: 4,
    }
}

/// Create a test app backed by a fresh in-memory database.
pub async fn create_test_app() -> (Router, Database) {
    create_test_app_with(|_| {}).await
}

/// Create a test app after adjusting the default test configuration.
pub async fn create_test_app_with(adjust: impl FnOnce(&mut ServerConfig)) -> (Router, Database) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let mut config = test_config(db.clone());
    adjust(&mut config);
    (create_app(&config), db)
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn bearer_request(method: &str, uri: &str, access_token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", access_token))
        .body(Body::empty())
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

/// Assert the standard error envelope and return it.
pub async fn assert_error(
    response: Response<Body>,
    status: StatusCode,
    error_code: &str,
    path: &str,
) -> Value {
    assert_eq!(response.status(), status);
    let body = body_json(response).await;
    assert_eq!(body["errorCode"], error_code, "body: {}", body);
    assert_eq!(body["path"], path, "body: {}", body);
    assert!(body["message"].is_string(), "body: {}", body);
    let timestamp = body["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
    body
}

pub async fn register(app: &Router, username: &str) -> Response<Body> {
    app.clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            json!({
                "email": format!("{}@example.com", username),
                "name": username,
                "username": username,
                "password": PASSWORD,
            }),
        ))
        .await
        .unwrap()
}

pub async fn login(app: &Router, email_username: &str, password: &str) -> Response<Body> {
    app.clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            json!({ "emailUsername": email_username, "password": password }),
        ))
        .await
        .unwrap()
}

/// Register `username` and log in. Returns (access_token, refresh_token).
pub async fn register_and_login(app: &Router, username: &str) -> (String, String) {
    assert_eq!(register(app, username).await.status(), StatusCode::CREATED);

    let response = login(app, username, PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    (
        body["accessToken"].as_str().unwrap().to_string(),
        body["refreshToken"].as_str().unwrap().to_string(),
    )
}

pub fn short_ttl(config: &mut ServerConfig) {
    config.refresh_token_ttl = Duration::ZERO;
}
