//! Status, health check and metrics endpoints

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;

use crate::dispatcher::RequestOutcome;

/// Name reported by the root status route
pub const SERVICE_NAME: &str = "Instagram Downloader Telegram Bot";

/// Root status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: String,
    pub bot: String,
}

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub uptime_seconds: u64,
    pub bot_ready: bool,
    pub bot_username: Option<String>,
}

/// Request counters
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub requests_received: u64,
    pub requests_rejected: u64,
    pub requests_completed: u64,
    pub requests_failed: u64,
    pub photos_sent: u64,
    pub videos_sent: u64,
    pub archives_sent: u64,
    pub files_skipped: u64,
    /// Conversations with a request in flight or queued
    pub active_conversations: usize,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<RwLock<Metrics>>,
    pub start_time: SystemTime,
    pub bot_username: Arc<RwLock<Option<String>>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(RwLock::new(Metrics::default())),
            start_time: SystemTime::now(),
            bot_username: Arc::new(RwLock::new(None)),
        }
    }

    /// Mark the bot as authenticated; `/ready` answers 200 from now on.
    pub async fn set_bot_username(&self, username: impl Into<String>) {
        *self.bot_username.write().await = Some(username.into());
    }

    pub async fn is_ready(&self) -> bool {
        self.bot_username.read().await.is_some()
    }

    pub async fn increment_requests_received(&self) {
        let mut metrics = self.metrics.write().await;
        metrics.requests_received += 1;
    }

    /// Fold the result of one request into the counters.
    pub async fn record_outcome(&self, outcome: &RequestOutcome) {
        let mut metrics = self.metrics.write().await;
        match outcome {
            RequestOutcome::Rejected(_) => metrics.requests_rejected += 1,
            RequestOutcome::Delivered(_) => metrics.requests_completed += 1,
            RequestOutcome::Failed { .. } => metrics.requests_failed += 1,
        }
        if let Some(report) = outcome.report() {
            metrics.photos_sent += report.photos_sent as u64;
            metrics.videos_sent += report.videos_sent as u64;
            metrics.files_skipped += report.skipped as u64;
            if report.archive_sent {
                metrics.archives_sent += 1;
            }
        }
    }

    pub async fn set_active_conversations(&self, count: usize) {
        let mut metrics = self.metrics.write().await;
        metrics.active_conversations = count;
    }

    pub async fn snapshot(&self) -> Metrics {
        self.metrics.read().await.clone()
    }
}

async fn status_handler() -> Json<ServiceStatus> {
    Json(ServiceStatus {
        status: "Running".to_string(),
        bot: SERVICE_NAME.to_string(),
    })
}

/// Health check endpoint handler
async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    let uptime = state.start_time.elapsed().unwrap_or_default().as_secs();
    let bot_username = state.bot_username.read().await.clone();
    let bot_ready = bot_username.is_some();

    let (status, status_code) = if bot_ready {
        ("healthy", StatusCode::OK)
    } else {
        ("starting", StatusCode::SERVICE_UNAVAILABLE)
    };

    (
        status_code,
        Json(HealthStatus {
            status: status.to_string(),
            uptime_seconds: uptime,
            bot_ready,
            bot_username,
        }),
    )
}

/// Metrics endpoint handler
async fn metrics_handler(State(state): State<AppState>) -> Json<Metrics> {
    Json(state.snapshot().await)
}

/// Readiness check (bot authenticated)
async fn ready_handler(State(state): State<AppState>) -> StatusCode {
    if state.is_ready().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Liveness check (process is alive)
async fn live_handler() -> StatusCode {
    StatusCode::OK
}

/// Create the status router
pub fn create_health_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/ready", get(ready_handler))
        .route("/live", get(live_handler))
        .with_state(state)
}

/// Serve the status router on its own listener (polling mode).
pub async fn start_health_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = create_health_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Status server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
