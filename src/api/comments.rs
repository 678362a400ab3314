//! Comment API endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::db::is_unavailable;
use crate::models::{CommentWithAuthor, CreateCommentInput};
use crate::services::comment::CommentServiceError;

/// Listing response envelope
#[derive(Debug, Serialize)]
pub struct CommentListResponse {
    pub comments: Vec<CommentWithAuthor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// GET /api/v1/artworks/{id}/comments - Comments for an artwork
///
/// Degradable read: an unreachable store answers an empty list with a
/// notice.
pub async fn list_comments(
    State(state): State<AppState>,
    Path(artwork_id): Path<i64>,
) -> Result<Json<CommentListResponse>, ApiError> {
    match state.comment_service.list_for_artwork(artwork_id).await {
        Ok(comments) => Ok(Json(CommentListResponse {
            comments,
            message: None,
        })),
        Err(CommentServiceError::InternalError(e)) if is_unavailable(&e) => {
            tracing::warn!(error = %e, "comment listing degraded to empty fallback");
            Ok(Json(CommentListResponse {
                comments: Vec::new(),
                message: Some(
                    "Database connection unavailable. Showing empty results.".to_string(),
                ),
            }))
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /api/v1/comments - Create a comment
pub async fn create_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateCommentInput>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = state.comment_service.create(&user.0, body).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "comment": comment })),
    ))
}

/// DELETE /api/v1/comments/{id} - Delete a comment
pub async fn delete_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.comment_service.delete(id, &user.0).await?;
    Ok(StatusCode::NO_CONTENT)
}
