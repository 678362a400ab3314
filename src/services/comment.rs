//! Comment service
//!
//! Validation and moderation rules for comments. A comment may be removed
//! by its author, by the owner of the artwork it sits on, or by an admin.

use crate::db::repositories::{ArtworkRepository, CommentRepository};
use crate::models::{Comment, CommentWithAuthor, CreateCommentInput, User};
use anyhow::Context;
use std::sync::Arc;

const MAX_CONTENT_LENGTH: usize = 1000;

/// Error types for comment operations
#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found")]
    NotFound,

    #[error("Not allowed to delete this comment")]
    Forbidden,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Comment service
pub struct CommentService {
    comments: Arc<dyn CommentRepository>,
    artworks: Arc<dyn ArtworkRepository>,
}

impl CommentService {
    /// Create a new comment service
    pub fn new(
        comments: Arc<dyn CommentRepository>,
        artworks: Arc<dyn ArtworkRepository>,
    ) -> Self {
        Self { comments, artworks }
    }

    /// Create a comment by `user`
    pub async fn create(
        &self,
        user: &User,
        input: CreateCommentInput,
    ) -> Result<Comment, CommentServiceError> {
        let content = input.content.trim().to_string();
        if content.is_empty() {
            return Err(CommentServiceError::ValidationError(
                "Content is required".to_string(),
            ));
        }
        if content.len() > MAX_CONTENT_LENGTH {
            return Err(CommentServiceError::ValidationError(format!(
                "Content must be at most {} characters",
                MAX_CONTENT_LENGTH
            )));
        }

        if let Some(parent_id) = input.parent_id {
            let parent = self
                .comments
                .get_by_id(parent_id)
                .await
                .context("Failed to load parent comment")?
                .ok_or_else(|| {
                    CommentServiceError::ValidationError("Parent comment not found".to_string())
                })?;
            if parent.artwork_id != input.artwork_id {
                return Err(CommentServiceError::ValidationError(
                    "Parent comment belongs to a different artwork".to_string(),
                ));
            }
        }

        self.comments
            .create(input.artwork_id, user.id, input.parent_id, &content)
            .await
            .context("Failed to create comment")?
            .ok_or(CommentServiceError::NotFound)
    }

    /// Comments for an artwork, oldest first
    pub async fn list_for_artwork(
        &self,
        artwork_id: i64,
    ) -> Result<Vec<CommentWithAuthor>, CommentServiceError> {
        Ok(self
            .comments
            .list_by_artwork(artwork_id)
            .await
            .context("Failed to list comments")?)
    }

    /// Delete a comment (with its replies)
    pub async fn delete(&self, id: i64, caller: &User) -> Result<(), CommentServiceError> {
        let comment = self
            .comments
            .get_by_id(id)
            .await
            .context("Failed to load comment")?
            .ok_or(CommentServiceError::NotFound)?;

        let allowed = if caller.can_modify(comment.user_id) {
            true
        } else {
            // The artwork's owner moderates their own piece
            let artwork = self
                .artworks
                .get_by_id(comment.artwork_id)
                .await
                .context("Failed to load artwork")?;
            artwork.map(|a| a.author_id == caller.id).unwrap_or(false)
        };

        if !allowed {
            return Err(CommentServiceError::Forbidden);
        }

        let deleted = self
            .comments
            .delete(id)
            .await
            .context("Failed to delete comment")?;
        if !deleted {
            return Err(CommentServiceError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrated_test_gateway;
    use crate::db::repositories::{
        SqlxArtworkRepository, SqlxCommentRepository, SqlxUserRepository, UserRepository,
    };
    use crate::models::{Artwork, UserRole};
    use chrono::Utc;

    struct Fixture {
        service: CommentService,
        owner: User,
        commenter: User,
        artwork_id: i64,
    }

    async fn setup() -> Fixture {
        let gateway = migrated_test_gateway().await;
        let users = SqlxUserRepository::new(gateway.clone());
        let owner = users
            .create(&User::new(
                "vermeer".to_string(),
                "vermeer@example.com".to_string(),
                "hash".to_string(),
                "Johannes Vermeer".to_string(),
                UserRole::Artist,
            ))
            .await
            .expect("owner");
        let commenter = users
            .create(&User::new(
                "visitor".to_string(),
                "visitor@example.com".to_string(),
                "hash".to_string(),
                "Gallery Visitor".to_string(),
                UserRole::User,
            ))
            .await
            .expect("commenter");

        let artworks = SqlxArtworkRepository::new(gateway.clone());
        let now = Utc::now();
        let artwork_id = crate::db::repositories::ArtworkRepository::create(
            &artworks,
            &Artwork {
                id: 0,
                title: "Woman Reading a Letter".to_string(),
                description: None,
                author_id: owner.id,
                is_published: true,
                view_count: 0,
                like_count: 0,
                comment_count: 0,
                created_at: now,
                updated_at: now,
            },
            &[],
            &[],
        )
        .await
        .expect("artwork");

        Fixture {
            service: CommentService::new(
                SqlxCommentRepository::boxed(gateway.clone()),
                SqlxArtworkRepository::boxed(gateway),
            ),
            owner,
            commenter,
            artwork_id,
        }
    }

    fn input(artwork_id: i64, content: &str) -> CreateCommentInput {
        CreateCommentInput {
            artwork_id,
            parent_id: None,
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let fx = setup().await;
        fx.service
            .create(&fx.commenter, input(fx.artwork_id, "Wonderful light"))
            .await
            .expect("create");

        let comments = fx
            .service
            .list_for_artwork(fx.artwork_id)
            .await
            .expect("list");
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].author.username, "visitor");
    }

    #[tokio::test]
    async fn test_content_validation() {
        let fx = setup().await;

        let err = fx
            .service
            .create(&fx.commenter, input(fx.artwork_id, "   "))
            .await
            .unwrap_err();
        assert!(matches!(err, CommentServiceError::ValidationError(_)));

        let err = fx
            .service
            .create(&fx.commenter, input(fx.artwork_id, &"x".repeat(1001)))
            .await
            .unwrap_err();
        assert!(matches!(err, CommentServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_missing_artwork() {
        let fx = setup().await;
        let err = fx
            .service
            .create(&fx.commenter, input(9999, "Hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, CommentServiceError::NotFound));
    }

    #[tokio::test]
    async fn test_reply_must_share_artwork() {
        let fx = setup().await;
        let parent = fx
            .service
            .create(&fx.commenter, input(fx.artwork_id, "Parent"))
            .await
            .expect("create");

        // Reply to a parent on a different artwork is rejected
        let err = fx
            .service
            .create(
                &fx.commenter,
                CreateCommentInput {
                    artwork_id: 9999,
                    parent_id: Some(parent.id),
                    content: "Reply".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CommentServiceError::ValidationError(_)));

        // Valid reply works
        fx.service
            .create(
                &fx.commenter,
                CreateCommentInput {
                    artwork_id: fx.artwork_id,
                    parent_id: Some(parent.id),
                    content: "Reply".to_string(),
                },
            )
            .await
            .expect("reply");
    }

    #[tokio::test]
    async fn test_delete_permissions() {
        let fx = setup().await;
        let comment = fx
            .service
            .create(&fx.commenter, input(fx.artwork_id, "To be moderated"))
            .await
            .expect("create");

        // A third unrelated user may not delete
        let mut outsider = fx.commenter.clone();
        outsider.id = 999;
        outsider.role = UserRole::User;
        let err = fx.service.delete(comment.id, &outsider).await.unwrap_err();
        assert!(matches!(err, CommentServiceError::Forbidden));

        // The artwork owner may moderate comments on their piece
        fx.service
            .delete(comment.id, &fx.owner)
            .await
            .expect("owner moderates");

        // Author deletes their own
        let comment = fx
            .service
            .create(&fx.commenter, input(fx.artwork_id, "Mine"))
            .await
            .expect("create");
        fx.service
            .delete(comment.id, &fx.commenter)
            .await
            .expect("author deletes");
    }
}
