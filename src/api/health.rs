//! Health check endpoint

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde::Serialize;

use crate::api::middleware::AppState;

/// Health report
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub database: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub total_requests: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<i64>,
}

/// GET /api/v1/health - Liveness and store connectivity
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let stats = &state.request_stats;

    match state.gateway.ping().await {
        Ok(()) => {
            let users = state.user_service.count().await.ok();
            (
                StatusCode::OK,
                Json(HealthResponse {
                    status: "healthy",
                    timestamp: Utc::now().to_rfc3339(),
                    database: "connected",
                    version: env!("CARGO_PKG_VERSION"),
                    uptime_seconds: stats.uptime_seconds(),
                    total_requests: stats.total_requests(),
                    users,
                }),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "health check: store unreachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy",
                    timestamp: Utc::now().to_rfc3339(),
                    database: "unreachable",
                    version: env!("CARGO_PKG_VERSION"),
                    uptime_seconds: stats.uptime_seconds(),
                    total_requests: stats.total_requests(),
                    users: None,
                }),
            )
        }
    }
}
