//! Like repository
//!
//! Database operations for likes. A like toggle runs as one transaction
//! covering both the like row and the artwork's cached `like_count`, so the
//! counter always equals the number of rows even under interleaved toggles.

use crate::db::DynGateway;
use crate::models::{Like, LikeStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Like repository trait
#[async_trait]
pub trait LikeRepository: Send + Sync {
    /// Toggle the caller's like on an artwork.
    ///
    /// Returns `None` when the artwork does not exist; otherwise the new
    /// liked state together with the updated counter.
    async fn toggle(&self, user_id: i64, artwork_id: i64) -> Result<Option<LikeStatus>>;

    /// Whether the user has liked the artwork
    async fn is_liked(&self, user_id: i64, artwork_id: i64) -> Result<bool>;

    /// Like records for an artwork, newest first
    async fn list_by_artwork(&self, artwork_id: i64) -> Result<Vec<Like>>;

    /// Count all likes
    async fn count(&self) -> Result<i64>;
}

/// SQLx-based like repository implementation
pub struct SqlxLikeRepository {
    gateway: DynGateway,
}

impl SqlxLikeRepository {
    /// Create a new SQLx like repository
    pub fn new(gateway: DynGateway) -> Self {
        Self { gateway }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(gateway: DynGateway) -> Arc<dyn LikeRepository> {
        Arc::new(Self::new(gateway))
    }

    async fn pool(&self) -> Result<SqlitePool> {
        Ok(self.gateway.acquire().await?)
    }
}

#[async_trait]
impl LikeRepository for SqlxLikeRepository {
    async fn toggle(&self, user_id: i64, artwork_id: i64) -> Result<Option<LikeStatus>> {
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

        let existing = sqlx::query("SELECT id FROM likes WHERE user_id = ? AND artwork_id = ?")
            .bind(user_id)
            .bind(artwork_id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to check existing like")?;

        let liked = match existing {
            Some(row) => {
                let like_id: i64 = row.get("id");
                sqlx::query("DELETE FROM likes WHERE id = ?")
                    .bind(like_id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to remove like")?;
                sqlx::query("UPDATE artworks SET like_count = MAX(like_count - 1, 0) WHERE id = ?")
                    .bind(artwork_id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to decrement like count")?;
                false
            }
            None => {
                sqlx::query("INSERT INTO likes (user_id, artwork_id, created_at) VALUES (?, ?, ?)")
                    .bind(user_id)
                    .bind(artwork_id)
                    .bind(Utc::now())
                    .execute(&mut *tx)
                    .await
                    .context("Failed to insert like")?;
                sqlx::query("UPDATE artworks SET like_count = like_count + 1 WHERE id = ?")
                    .bind(artwork_id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to increment like count")?;
                true
            }
        };

        let row = sqlx::query("SELECT like_count FROM artworks WHERE id = ?")
            .bind(artwork_id)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to read like count")?;
        let like_count: i64 = row.get("like_count");

        tx.commit().await.context("Failed to commit like toggle")?;

        Ok(Some(LikeStatus { liked, like_count }))
    }

    async fn is_liked(&self, user_id: i64, artwork_id: i64) -> Result<bool> {
        let pool = self.pool().await?;
        let row = sqlx::query("SELECT id FROM likes WHERE user_id = ? AND artwork_id = ?")
            .bind(user_id)
            .bind(artwork_id)
            .fetch_optional(&pool)
            .await
            .context("Failed to check like")?;
        Ok(row.is_some())
    }

    async fn list_by_artwork(&self, artwork_id: i64) -> Result<Vec<Like>> {
        let pool = self.pool().await?;
        let rows = sqlx::query(
            "SELECT id, user_id, artwork_id, created_at FROM likes \
             WHERE artwork_id = ? ORDER BY created_at DESC",
        )
        .bind(artwork_id)
        .fetch_all(&pool)
        .await
        .context("Failed to list likes")?;

        Ok(rows
            .into_iter()
            .map(|row| Like {
                id: row.get("id"),
                user_id: row.get("user_id"),
                artwork_id: row.get("artwork_id"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn count(&self) -> Result<i64> {
        let pool = self.pool().await?;
        let row = sqlx::query("SELECT COUNT(*) as count FROM likes")
            .fetch_one(&pool)
            .await
            .context("Failed to count likes")?;
        Ok(row.get("count"))
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
        likes: Arc<SqlxLikeRepository>,
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
                    title: "The Lacemaker".to_string(),
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
            likes: Arc::new(SqlxLikeRepository::new(gateway)),
            artworks,
            user_id: user.id,
            artwork_id,
        }
    }

    #[tokio::test]
    async fn test_toggle_like_unlike_round_trip() {
        let fx = setup().await;

        // Like: counter goes to 1 and a record exists
        let status = fx
            .likes
            .toggle(fx.user_id, fx.artwork_id)
            .await
            .expect("toggle")
            .expect("artwork exists");
        assert!(status.liked);
        assert_eq!(status.like_count, 1);
        assert!(fx
            .likes
            .is_liked(fx.user_id, fx.artwork_id)
            .await
            .expect("check"));

        // Toggle again: back to the original state
        let status = fx
            .likes
            .toggle(fx.user_id, fx.artwork_id)
            .await
            .expect("toggle")
            .expect("artwork exists");
        assert!(!status.liked);
        assert_eq!(status.like_count, 0);
        assert!(!fx
            .likes
            .is_liked(fx.user_id, fx.artwork_id)
            .await
            .expect("check"));
        assert_eq!(fx.likes.count().await.expect("count"), 0);

        let artwork = fx
            .artworks
            .get_by_id(fx.artwork_id)
            .await
            .expect("get")
            .unwrap();
        assert_eq!(artwork.like_count, 0);
    }

    #[tokio::test]
    async fn test_toggle_missing_artwork() {
        let fx = setup().await;
        let status = fx.likes.toggle(fx.user_id, 9999).await.expect("toggle");
        assert!(status.is_none());
    }

    #[tokio::test]
    async fn test_counter_matches_rows_under_concurrent_toggles() {
        let fx = setup().await;

        // An odd number of toggles from several tasks; whatever the
        // interleaving, the cached counter must equal the row count.
        let mut handles = Vec::new();
        for _ in 0..9 {
            let likes = fx.likes.clone();
            let (user_id, artwork_id) = (fx.user_id, fx.artwork_id);
            handles.push(tokio::spawn(async move {
                likes.toggle(user_id, artwork_id).await
            }));
        }
        for handle in handles {
            handle.await.expect("task").expect("toggle");
        }

        let artwork = fx
            .artworks
            .get_by_id(fx.artwork_id)
            .await
            .expect("get")
            .unwrap();
        let rows = fx.likes.count().await.expect("count");
        assert_eq!(artwork.like_count, rows);
        // Nine toggles starting from unliked end liked
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_list_by_artwork() {
        let fx = setup().await;
        fx.likes
            .toggle(fx.user_id, fx.artwork_id)
            .await
            .expect("toggle")
            .unwrap();

        let likes = fx
            .likes
            .list_by_artwork(fx.artwork_id)
            .await
            .expect("list");
        assert_eq!(likes.len(), 1);
        assert_eq!(likes[0].user_id, fx.user_id);
    }
}
