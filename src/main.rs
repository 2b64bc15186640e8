//! Feed Server
//!
//! Serves the feed API over HTTP with in-memory storage:
//! - Accounts with PBKDF2 password hashes and hashed session tokens
//! - Channels, posts, follows and a per-user feed
//! - Access log written to a file and stdout

use feed_server::{build_router, AccessLog, AppState, Config, MemoryServices};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Initialize structured logging
    init_tracing();

    // Load configuration
    let config = Config::from_env();
    log_startup_info(&config);

    // Initialize core components
    let services = Arc::new(MemoryServices::new(config.clone()));
    services.clone().start_cleanup_task();

    let access_log = Arc::new(
        AccessLog::open(&config.access_log_path).expect("Failed to open access log"),
    );
    let state = AppState::new(services);

    // Build and serve the application
    let app = build_router(state, &config, access_log);
    serve(app, &config).await;
}

/// Initialize tracing with environment-based log levels.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("feed_server=debug,tower_http=info")),
        )
        .init();
}

/// Log startup configuration (no secrets).
fn log_startup_info(config: &Config) {
    info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        storage = "memory",
        allowed_origin = %config.allowed_origin,
        access_log = %config.access_log_path.display(),
        session_ttl_secs = config.session_ttl.as_secs(),
        "Starting feed server"
    );
}

/// Bind to address and serve the application.
async fn serve(app: axum::Router, config: &Config) {
    let bind_addr = format!("{}:{}", config.bind_addr, config.port);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    info!(addr = %bind_addr, "Server listening");

    axum::serve(listener, app).await.expect("Server error");
}
