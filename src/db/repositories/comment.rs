//! Comment repository
//!
//! Database operations for comments. The artwork's `comment_count` column
//! is adjusted inside the same transaction as every comment write, keeping
//! the cached counter consistent with the rows it summarizes.

use crate::db::DynGateway;
use crate::models::{AuthorSummary, Comment, CommentWithAuthor};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Create a comment and bump the artwork's comment counter.
    ///
    /// Returns `None` when the artwork does not exist.
    async fn create(
        &self,
        artwork_id: i64,
        user_id: i64,
        parent_id: Option<i64>,
        content: &str,
    ) -> Result<Option<Comment>>;

    /// Get comment by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Comments for an artwork, oldest first, with authors embedded
    async fn list_by_artwork(&self, artwork_id: i64) -> Result<Vec<CommentWithAuthor>>;

    /// Delete a comment (replies cascade) and decrement the counter by the
    /// number of rows removed. Returns false when the comment is missing.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Count all comments
    async fn count(&self) -> Result<i64>;
}

/// SQLx-based comment repository implementation
pub struct SqlxCommentRepository {
    gateway: DynGateway,
}

impl SqlxCommentRepository {
    /// Create a new SQLx comment repository
    pub fn new(gateway: DynGateway) -> Self {
        Self { gateway }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(gateway: DynGateway) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(gateway))
    }

    async fn pool(&self) -> Result<SqlitePool> {
        Ok(self.gateway.acquire().await?)
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(
        &self,
        artwork_id: i64,
        user_id: i64,
        parent_id: Option<i64>,
        content: &str,
    ) -> Result<Option<Comment>> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await.context("Failed to begin transaction")?;

        let artwork = sqlx::query("SELECT id FROM artworks WHERE id = ?")
            .bind(artwork_id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to check artwork")?;
        if artwork.is_none() {
            return Ok(None);
        }

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO comments (artwork_id, user_id, parent_id, content, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(artwork_id)
        .bind(user_id)
        .bind(parent_id)
        .bind(content)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create comment")?;

        let id = result.last_insert_rowid();

        sqlx::query("UPDATE artworks SET comment_count = comment_count + 1 WHERE id = ?")
            .bind(artwork_id)
            .execute(&mut *tx)
            .await
            .context("Failed to bump comment count")?;

        tx.commit().await.context("Failed to commit comment")?;

        Ok(Some(Comment {
            id,
            artwork_id,
            user_id,
            parent_id,
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        }))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let pool = self.pool().await?;
        let row = sqlx::query(
            "SELECT id, artwork_id, user_id, parent_id, content, created_at, updated_at \
             FROM comments WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&pool)
        .await
        .context("Failed to get comment by ID")?;

        Ok(row.map(|row| row_to_comment(&row)))
    }

    async fn list_by_artwork(&self, artwork_id: i64) -> Result<Vec<CommentWithAuthor>> {
        let pool = self.pool().await?;
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.artwork_id, c.parent_id, c.content, c.created_at, c.updated_at,
                   u.id as author_id, u.name as author_name, u.username as author_username,
                   u.email as author_email, u.avatar as author_avatar
            FROM comments c
            JOIN users u ON u.id = c.user_id
            WHERE c.artwork_id = ?
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )
        .bind(artwork_id)
        .fetch_all(&pool)
        .await
        .context("Failed to list comments")?;

        let mut comments = Vec::with_capacity(rows.len());
        for row in rows {
            let avatar: Option<String> = row.get("author_avatar");
            let email: String = row.get("author_email");
            comments.push(CommentWithAuthor {
                id: row.get("id"),
                artwork_id: row.get("artwork_id"),
                parent_id: row.get("parent_id"),
                content: row.get("content"),
                author: AuthorSummary {
                    id: row.get("author_id"),
                    name: row.get("author_name"),
                    username: row.get("author_username"),
                    avatar: match avatar {
                        Some(url) if !url.is_empty() => url,
                        _ => {
                            let hash =
                                format!("{:x}", md5::compute(email.trim().to_lowercase()));
                            format!("https://www.gravatar.com/avatar/{}?d=mp&s=80", hash)
                        }
                    },
                },
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            });
        }
        Ok(comments)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await.context("Failed to begin transaction")?;

        let row = sqlx::query("SELECT artwork_id FROM comments WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to load comment")?;
        let Some(row) = row else {
            return Ok(false);
        };
        let artwork_id: i64 = row.get("artwork_id");

        // Replies are removed by the cascade; count them so the cached
        // counter drops by the full number of rows deleted.
        let replies = sqlx::query("SELECT COUNT(*) as count FROM comments WHERE parent_id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to count replies")?;
        let removed: i64 = 1 + replies.get::<i64, _>("count");

        sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete comment")?;

        sqlx::query("UPDATE artworks SET comment_count = MAX(comment_count - ?, 0) WHERE id = ?")
            .bind(removed)
            .bind(artwork_id)
            .execute(&mut *tx)
            .await
            .context("Failed to decrement comment count")?;

        tx.commit().await.context("Failed to commit delete")?;
        Ok(true)
    }

    async fn count(&self) -> Result<i64> {
        let pool = self.pool().await?;
        let row = sqlx::query("SELECT COUNT(*) as count FROM comments")
            .fetch_one(&pool)
            .await
            .context("Failed to count comments")?;
        Ok(row.get("count"))
    }
}

fn row_to_comment(row: &sqlx::sqlite::SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        artwork_id: row.get("artwork_id"),
        user_id: row.get("user_id"),
        parent_id: row.get("parent_id"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrated_test_gateway;
    use crate::db::repositories::artwork::{ArtworkRepository, SqlxArtworkRepository};
    use crate::db::repositories::user::{SqlxUserRepository, UserRepository};
    use crate::models::{Artwork, User, UserRole};

    struct Fixture {
        comments: SqlxCommentRepository,
        artworks: SqlxArtworkRepository,
        user_id: i64,
        artwork_id: i64,
    }

    async fn setup() -> Fixture {
        let gateway = migrated_test_gateway().await;
        let users = SqlxUserRepository::new(gateway.clone());
        let user = users
            .create(&User::new(
                "vermeer".to_string(),
                "vermeer@example.com".to_string(),
                "hash".to_string(),
                "Johannes Vermeer".to_string(),
                UserRole::Artist,
            ))
            .await
            .expect("user");

        let artworks = SqlxArtworkRepository::new(gateway.clone());
        let now = Utc::now();
        let artwork_id = artworks
            .create(
                &Artwork {
                    id: 0,
                    title: "The Concert".to_string(),
                    description: None,
                    author_id: user.id,
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
            comments: SqlxCommentRepository::new(gateway),
            artworks,
            user_id: user.id,
            artwork_id,
        }
    }

    #[tokio::test]
    async fn test_create_bumps_counter() {
        let fx = setup().await;

        let comment = fx
            .comments
            .create(fx.artwork_id, fx.user_id, None, "Remarkable use of light")
            .await
            .expect("create")
            .expect("artwork exists");
        assert!(comment.id > 0);

        let artwork = fx
            .artworks
            .get_by_id(fx.artwork_id)
            .await
            .expect("get")
            .unwrap();
        assert_eq!(artwork.comment_count, 1);
    }

    #[tokio::test]
    async fn test_create_for_missing_artwork() {
        let fx = setup().await;
        let result = fx
            .comments
            .create(9999, fx.user_id, None, "Hello?")
            .await
            .expect("create");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_list_with_authors_in_order() {
        let fx = setup().await;
        fx.comments
            .create(fx.artwork_id, fx.user_id, None, "First")
            .await
            .expect("create")
            .unwrap();
        let parent = fx
            .comments
            .create(fx.artwork_id, fx.user_id, None, "Second")
            .await
            .expect("create")
            .unwrap();
        fx.comments
            .create(fx.artwork_id, fx.user_id, Some(parent.id), "A reply")
            .await
            .expect("create")
            .unwrap();

        let listed = fx
            .comments
            .list_by_artwork(fx.artwork_id)
            .await
            .expect("list");
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].content, "First");
        assert_eq!(listed[2].parent_id, Some(parent.id));
        assert_eq!(listed[0].author.username, "vermeer");
    }

    #[tokio::test]
    async fn test_delete_with_replies_decrements_counter() {
        let fx = setup().await;
        let parent = fx
            .comments
            .create(fx.artwork_id, fx.user_id, None, "Parent")
            .await
            .expect("create")
            .unwrap();
        fx.comments
            .create(fx.artwork_id, fx.user_id, Some(parent.id), "Reply one")
            .await
            .expect("create")
            .unwrap();
        fx.comments
            .create(fx.artwork_id, fx.user_id, Some(parent.id), "Reply two")
            .await
            .expect("create")
            .unwrap();

        assert!(fx.comments.delete(parent.id).await.expect("delete"));

        let artwork = fx
            .artworks
            .get_by_id(fx.artwork_id)
            .await
            .expect("get")
            .unwrap();
        assert_eq!(artwork.comment_count, 0);
        assert_eq!(fx.comments.count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn test_delete_missing_comment() {
        let fx = setup().await;
        assert!(!fx.comments.delete(404).await.expect("delete"));
    }
}
