//! Like API endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::LikeStatus;

/// Request body for a like toggle
#[derive(Debug, Deserialize)]
pub struct LikeRequest {
    pub artwork_id: i64,
}

/// Query parameters for the like check
#[derive(Debug, Deserialize)]
pub struct CheckLikeQuery {
    pub artwork_id: i64,
}

/// POST /api/v1/likes - Toggle the caller's like on an artwork
pub async fn toggle_like(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<LikeRequest>,
) -> Result<Json<LikeStatus>, ApiError> {
    let status = state
        .like_service
        .toggle(user.0.id, body.artwork_id)
        .await?;
    Ok(Json(status))
}

/// GET /api/v1/likes/check - Whether the caller liked an artwork
pub async fn check_like(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<CheckLikeQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let liked = state
        .like_service
        .is_liked(user.0.id, query.artwork_id)
        .await?;
    Ok(Json(serde_json::json!({ "liked": liked })))
}
