//! System endpoints: health check and live session statistics.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Always `"healthy"` when the server answers.
    pub status: String,
    /// Current server time (RFC 3339).
    pub timestamp: String,
    /// Crate version.
    pub version: String,
}

/// `GET /health`: Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Live session statistics.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    /// Sessions whose join token is still live.
    pub sessions: usize,
    /// Sessions whose watch token is still live.
    pub watchable_sessions: usize,
    /// Player connections attached to live sessions.
    pub players: usize,
    /// Spectator connections attached to live sessions.
    pub spectators: usize,
    /// Seconds since the server started.
    pub uptime_secs: i64,
}

/// `GET /stats`: Count live sessions.
#[utoipa::path(
    get,
    path = "/stats",
    tag = "System",
    summary = "Session statistics",
    description = "Returns how many sessions are currently joinable and watchable, and how many connections are attached to them.",
    responses(
        (status = 200, description = "Current counts", body = StatsResponse),
    )
)]
pub async fn stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    let (players, spectators) = state.registry.connection_counts();
    (
        StatusCode::OK,
        Json(StatsResponse {
            sessions: state.registry.session_count(),
            watchable_sessions: state.registry.watchable_count(),
            players,
            spectators,
            uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        }),
    )
}

/// System routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
}
