//! CLI argument parsing, validation, and startup helpers.

use std::time::Duration;

use crate::ServerConfig;
use crate::auth::DEFAULT_PUBLIC_PATHS;
use crate::db::Database;
use crate::jwt::MAX_TTL_MS;
use crate::password::DEFAULT_BCRYPT_COST;
use clap::Parser;
use tracing::{error, info};

const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "vaultgate",
    about = "Edge authentication with JWT access tokens and rotating refresh tokens"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "DATABASE", default_value = "vaultgate.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Access token lifetime in milliseconds, at most ten years
    #[arg(long, env = "ACCESS_TOKEN_TTL_MS", default_value = "3600000",
        value_parser = clap::value_parser!(u64).range(1..=MAX_TTL_MS))]
    pub access_token_ttl_ms: u64,

    /// Refresh token lifetime in milliseconds, at most ten years
    #[arg(long, env = "REFRESH_TOKEN_TTL_MS", default_value = "604800000",
        value_parser = clap::value_parser!(u64).range(1..=MAX_TTL_MS))]
    pub refresh_token_ttl_ms: u64,

    /// Path pattern reachable without authentication (repeatable). A pattern
    /// without '*' matches by prefix; '*' matches one segment, '**' any depth
    #[arg(long = "public-path", env = "PUBLIC_PATHS", value_delimiter = ',',
        value_parser = validate_public_path,
        default_values_t = DEFAULT_PUBLIC_PATHS.map(String::from))]
    pub public_paths: Vec<String>,

    /// bcrypt work factor for new password hashes
    #[arg(long, env = "BCRYPT_COST", default_value_t = DEFAULT_BCRYPT_COST,
        value_parser = clap::value_parser!(u32).range(4..=31))]
    pub bcrypt_cost: u32,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

fn validate_public_path(s: &str) -> Result<String, String> {
    let s = s.trim();

    if !s.starts_with('/') {
        return Err(format!("Public path must start with '/': {}", s));
    }

    if s.chars().any(|c| !c.is_ascii() || c.is_whitespace()) {
        return Err(format!("Public path contains invalid characters: {}", s));
    }

    Ok(s.to_string())
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: called from main before the runtime spawns any other thread.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} bytes. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, jwt_secret: String) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        access_token_ttl: Duration::from_millis(args.access_token_ttl_ms),
        refresh_token_ttl: Duration::from_millis(args.refresh_token_ttl_ms),
        public_paths: args.public_paths.clone(),
        bcrypt_cost: args.bcrypt_cost,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
