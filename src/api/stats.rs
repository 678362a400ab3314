//! Site statistics API endpoint

use axum::{extract::State, Json};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState};
use crate::db::is_unavailable;
use crate::services::StatsSnapshot;

/// Stats response envelope
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub snapshot: StatsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// GET /api/v1/stats - Aggregated site statistics
///
/// Degradable read: an unreachable store answers a zeroed snapshot with a
/// notice rather than an error.
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    match state.stats_service.get().await {
        Ok(snapshot) => Ok(Json(StatsResponse {
            snapshot,
            message: None,
        })),
        Err(e) if is_unavailable(&e) => {
            tracing::warn!(error = %e, "stats degraded to empty fallback");
            Ok(Json(StatsResponse {
                snapshot: StatsSnapshot::default(),
                message: Some(
                    "Database connection unavailable. Using fallback data.".to_string(),
                ),
            }))
        }
        Err(e) => Err(ApiError::from_internal(e)),
    }
}
