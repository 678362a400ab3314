//! Artwork API endpoints
//!
//! Listing, detail, create/update/delete, and view counting. Listing is a
//! degradable read: when the store is unreachable it answers an empty page
//! with a notice instead of an error.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};
use crate::db::is_unavailable;
use crate::models::{
    ArtworkFilter, ArtworkWithMeta, CommentWithAuthor, CreateArtworkInput, Like, PagedResult,
    UpdateArtworkInput,
};
use crate::services::artwork::{ArtworkServiceError, PER_PAGE};

/// Query parameters for the artwork listing
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    /// `current` for the caller's own artworks, otherwise a username
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub published: Option<bool>,
}

/// Page metadata
#[derive(Debug, Serialize)]
pub struct PageMeta {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

/// Listing response envelope
#[derive(Debug, Serialize)]
pub struct ArtworkListResponse {
    pub data: Vec<ArtworkWithMeta>,
    pub meta: PageMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ArtworkListResponse {
    fn from_page(page: PagedResult<ArtworkWithMeta>, message: Option<String>) -> Self {
        Self {
            meta: PageMeta {
                total: page.total,
                page: page.page,
                per_page: page.per_page,
            },
            data: page.data,
            message,
        }
    }
}

/// Artwork detail with comments and like records embedded
#[derive(Debug, Serialize)]
pub struct ArtworkDetailResponse {
    #[serde(flatten)]
    pub artwork: ArtworkWithMeta,
    pub comments: Vec<CommentWithAuthor>,
    pub likes: Vec<Like>,
}

/// GET /api/v1/artworks - List artworks
pub async fn list_artworks(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ArtworkListResponse>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);

    let mut filter = ArtworkFilter {
        query: query.q.clone(),
        tag: query.tag.clone(),
        ..Default::default()
    };

    match query.author.as_deref() {
        Some("current") => {
            let viewer = viewer
                .as_ref()
                .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
            filter.author_id = Some(viewer.id);
        }
        Some(username) => {
            match state.user_service.get_by_username(username).await? {
                Some(author) => filter.author_id = Some(author.id),
                // Unknown author: nothing to list
                None => {
                    return Ok(Json(ArtworkListResponse::from_page(
                        PagedResult::empty(page, PER_PAGE),
                        None,
                    )));
                }
            }
        }
        None => {}
    }

    // An explicit published filter is only honored for callers who could
    // see the unpublished side anyway; otherwise drafts would leak.
    if let Some(published) = query.published {
        let own_scope = match (&filter.author_id, &viewer) {
            (Some(author_id), Some(viewer)) => viewer.can_modify(*author_id),
            _ => false,
        };
        if own_scope {
            filter.published = Some(published);
        }
    }

    match state.artwork_service.list(filter, page).await {
        Ok(result) => Ok(Json(ArtworkListResponse::from_page(result, None))),
        Err(ArtworkServiceError::InternalError(e)) if is_unavailable(&e) => {
            tracing::warn!(error = %e, "artwork listing degraded to empty fallback");
            Ok(Json(ArtworkListResponse::from_page(
                PagedResult::empty(page, PER_PAGE),
                Some("Database connection unavailable. Showing empty results.".to_string()),
            )))
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /api/v1/artworks - Create an artwork
pub async fn create_artwork(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateArtworkInput>,
) -> Result<impl IntoResponse, ApiError> {
    let artwork = state.artwork_service.create(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(artwork)))
}

/// GET /api/v1/artworks/{id} - Artwork detail
pub async fn get_artwork(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<ArtworkDetailResponse>, ApiError> {
    let artwork = state
        .artwork_service
        .get_detail(id, viewer.as_ref())
        .await?;

    let comments = state.comment_service.list_for_artwork(id).await?;
    let likes = state
        .like_service
        .list_for_artwork(id)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(ArtworkDetailResponse {
        artwork,
        comments,
        likes,
    }))
}

/// PUT /api/v1/artworks/{id} - Update an artwork
pub async fn update_artwork(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateArtworkInput>,
) -> Result<Json<ArtworkWithMeta>, ApiError> {
    let artwork = state.artwork_service.update(id, &user.0, body).await?;
    Ok(Json(artwork))
}

/// DELETE /api/v1/artworks/{id} - Delete an artwork
pub async fn delete_artwork(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.artwork_service.delete(id, &user.0).await?;
    Ok(Json(serde_json::json!({"success": true})))
}

/// POST /api/v1/artworks/{id}/view - Record a view
pub async fn increment_view(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.artwork_service.increment_view(id).await?;
    Ok(StatusCode::OK)
}
