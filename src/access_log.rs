//! Per-request access log.
//!
//! One line per request, written to every configured sink (the log file and
//! stdout in production). The sink is owned by the router that was built
//! with it; nothing here is process-global.
//!
//! Line format:
//!
//! ```text
//! 2026-10-19T12:00:00Z | 200 |    0.412ms | GET     /channels
//! ```

use axum::{
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::warn;
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_appender::rolling::{Builder, InitError, Rotation};

/// A single access log entry
#[derive(Debug, Clone)]
pub struct AccessEntry {
    pub at: DateTime<Utc>,
    pub status: StatusCode,
    pub latency: Duration,
    pub method: Method,
    pub path: String,
}

impl fmt::Display for AccessEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {:>3} | {:>8.3}ms | {:<7} {}",
            self.at.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.status.as_u16(),
            self.latency.as_secs_f64() * 1000.0,
            self.method.as_str(),
            self.path
        )
    }
}

/// Access log errors
#[derive(Debug, thiserror::Error)]
pub enum AccessLogError {
    #[error("failed to open access log file: {0}")]
    Open(#[from] InitError),

    #[error("access log path has no file name: {0}")]
    NoFileName(String),
}

/// Line-oriented log sink shared by all request tasks.
///
/// Each line is written with a single `write_all` while holding that sink's
/// lock, so concurrent requests never interleave within a line.
pub struct AccessLog {
    sinks: Vec<Mutex<Box<dyn Write + Send>>>,
    /// Keeps background writers alive; dropping flushes them.
    _guards: Vec<WorkerGuard>,
}

impl AccessLog {
    /// Log to `path` and to stdout.
    ///
    /// Both sinks are backed by non-blocking writers that never drop lines.
    pub fn open(path: &Path) -> Result<Self, AccessLogError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| AccessLogError::NoFileName(path.display().to_string()))?;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let file = Builder::new()
            .rotation(Rotation::NEVER)
            .filename_prefix(file_name)
            .build(dir)?;

        let (file_writer, file_guard) = NonBlockingBuilder::default().lossy(false).finish(file);
        let (stdout_writer, stdout_guard) = NonBlockingBuilder::default()
            .lossy(false)
            .finish(std::io::stdout());

        Ok(Self {
            sinks: vec![
                Mutex::new(Box::new(file_writer)),
                Mutex::new(Box::new(stdout_writer)),
            ],
            _guards: vec![file_guard, stdout_guard],
        })
    }

    /// Log to a single writer.
    pub fn from_writer<W>(writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            sinks: vec![Mutex::new(Box::new(writer))],
            _guards: Vec::new(),
        }
    }

    /// Append one entry to every sink.
    pub fn record(&self, entry: &AccessEntry) {
        let line = format!("{entry}\n");
        for sink in &self.sinks {
            let mut writer = sink.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = writer.write_all(line.as_bytes()) {
                warn!(error = %e, "Failed to write access log line");
            }
        }
    }
}

/// Middleware recording exactly one entry per request, after the response
/// has been produced (including error and recovered-panic responses).
pub async fn record_access(
    State(log): State<Arc<AccessLog>>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let response = next.run(req).await;

    log.record(&AccessEntry {
        at: Utc::now(),
        status: response.status(),
        latency: start.elapsed(),
        method,
        path,
    });

    response
}
