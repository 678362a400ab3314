//! Like service
//!
//! Toggle semantics for likes: one call likes, the next unlikes. The
//! repository runs the row write and the counter update in a single
//! transaction.

use crate::db::repositories::LikeRepository;
use crate::models::LikeStatus;
use anyhow::Context;
use std::sync::Arc;

/// Error types for like operations
#[derive(Debug, thiserror::Error)]
pub enum LikeServiceError {
    #[error("Artwork not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Like service
pub struct LikeService {
    repo: Arc<dyn LikeRepository>,
}

impl LikeService {
    /// Create a new like service
    pub fn new(repo: Arc<dyn LikeRepository>) -> Self {
        Self { repo }
    }

    /// Toggle the user's like on an artwork
    pub async fn toggle(
        &self,
        user_id: i64,
        artwork_id: i64,
    ) -> Result<LikeStatus, LikeServiceError> {
        self.repo
            .toggle(user_id, artwork_id)
            .await
            .context("Failed to toggle like")?
            .ok_or(LikeServiceError::NotFound)
    }

    /// Whether the user has liked the artwork
    pub async fn is_liked(
        &self,
        user_id: i64,
        artwork_id: i64,
    ) -> Result<bool, LikeServiceError> {
        Ok(self
            .repo
            .is_liked(user_id, artwork_id)
            .await
            .context("Failed to check like")?)
    }

    /// Like records for an artwork
    pub async fn list_for_artwork(
        &self,
        artwork_id: i64,
    ) -> Result<Vec<crate::models::Like>, LikeServiceError> {
        Ok(self
            .repo
            .list_by_artwork(artwork_id)
            .await
            .context("Failed to list likes")?)
    }
}
