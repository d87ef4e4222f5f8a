pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod password;
pub mod refresh;
pub mod service;

use api::{create_api_router, error_envelope};
use auth::{InterceptorState, PublicPaths, authenticate};
use axum::{Router, middleware};
use db::Database;
use jwt::TokenCodec;
use password::PasswordHasher;
use refresh::RefreshTokenManager;
use service::AuthService;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// HMAC key for signing access tokens
    pub jwt_secret: Vec<u8>,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    /// Path patterns that skip authentication
    pub public_paths: Vec<String>,
    /// bcrypt work factor
    pub bcrypt_cost: u32,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let codec = Arc::new(TokenCodec::new(&config.jwt_secret, config.access_token_ttl));

    let service = Arc::new(AuthService::new(
        config.db.clone(),
        codec.clone(),
        RefreshTokenManager::new(config.db.clone(), config.refresh_token_ttl),
        PasswordHasher::new(config.bcrypt_cost),
    ));

    let interceptor_state = InterceptorState {
        codec,
        public_paths: Arc::new(PublicPaths::new(&config.public_paths)),
    };

    // Outermost first. Nothing but tracing runs ahead of authentication.
    create_api_router(service).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn_with_state(interceptor_state, authenticate))
            .layer(middleware::from_fn(error_envelope)),
    )
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
