pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod rate_limit;

use api::create_api_router;
use axum::Router;
use db::Database;
use jwt::{DEFAULT_ACCESS_TOKEN_SECS, DEFAULT_REFRESH_TOKEN_SECS, TokenIssuer};
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Access token lifetime in seconds
    pub access_token_secs: u64,
    /// Refresh token lifetime in seconds
    pub refresh_token_secs: u64,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Whether new account signups are disabled
    pub no_signup: bool,
    /// Per-IP limits for login and signup
    pub rate_limits: RateLimitConfig,
}

impl ServerConfig {
    /// Configuration with default token lifetimes and rate limits.
    pub fn new(db: Database, jwt_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            db,
            jwt_secret: jwt_secret.into(),
            access_token_secs: DEFAULT_ACCESS_TOKEN_SECS,
            refresh_token_secs: DEFAULT_REFRESH_TOKEN_SECS,
            secure_cookies: false,
            no_signup: false,
            rate_limits: RateLimitConfig::default(),
        }
    }
}

/// Create the application router with the given configuration.
/// All endpoints live under `/api`.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(TokenIssuer::with_durations(
        &config.jwt_secret,
        config.access_token_secs,
        config.refresh_token_secs,
    ));

    let api_router = create_api_router(
        config.db.clone(),
        jwt,
        config.secure_cookies,
        config.no_signup,
        config.rate_limits.clone(),
    );

    Router::new().nest("/api", api_router).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
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

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    init_cleanup(&config.db).await;

    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
