//! Configuration for the feed server.
//!
//! All configuration is loaded from environment variables (a `.env` file is
//! honoured by `main`). No secrets are logged.

use std::path::PathBuf;
use std::time::Duration;

/// Default origin allowed to make credentialed cross-origin requests
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:5173";

/// Default PBKDF2 iteration count for password hashing
pub const DEFAULT_PASSWORD_ITERATIONS: u32 = 100_000;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub bind_addr: String,

    /// Server port
    pub port: u16,

    /// The single origin granted cross-origin access
    pub allowed_origin: String,

    /// File the access log is written to (alongside stdout)
    pub access_log_path: PathBuf,

    // === Sessions ===
    /// Lifetime of an issued session token (default: 24 hours)
    pub session_ttl: Duration,

    /// Expired session cleanup interval (default: 60 seconds)
    pub cleanup_interval: Duration,

    /// PBKDF2 iterations used for new password hashes
    pub password_iterations: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            allowed_origin: std::env::var("ALLOWED_ORIGIN")
                .unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGIN.to_string()),
            access_log_path: std::env::var("ACCESS_LOG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("access.log")),

            session_ttl: Duration::from_secs(
                std::env::var("SESSION_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(24 * 3600),
            ),
            cleanup_interval: Duration::from_secs(
                std::env::var("CLEANUP_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            password_iterations: std::env::var("PASSWORD_ITERATIONS")
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_PASSWORD_ITERATIONS),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
