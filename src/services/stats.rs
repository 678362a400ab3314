//! Site statistics service
//!
//! Aggregates the public numbers shown on the landing pages: totals,
//! trending and recent artworks, featured artists, and popular tags. The
//! snapshot is cached for a short interval so a burst of page loads does
//! not re-run five aggregate queries each time.

use crate::db::repositories::{
    ArtworkRepository, CommentRepository, LikeRepository, UserRepository,
};
use crate::models::{ArtistSummary, ArtworkWithMeta};
use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use moka::future::Cache;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// How far back "trending" looks
const TRENDING_WINDOW_DAYS: i64 = 30;
const TRENDING_LIMIT: i64 = 6;
const FEATURED_ARTISTS_LIMIT: i64 = 6;
const POPULAR_TAGS_LIMIT: i64 = 12;
const RECENT_ACTIVITY_LIMIT: i64 = 8;

/// Snapshot cache TTL
const CACHE_TTL_SECS: u64 = 60;

/// Aggregate totals
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsTotals {
    pub total_artworks: i64,
    pub total_artists: i64,
    pub total_comments: i64,
    pub total_likes: i64,
}

/// Tag with its usage count
#[derive(Debug, Clone, Serialize)]
pub struct TagCount {
    pub name: String,
    pub count: i64,
}

/// The full stats payload
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsSnapshot {
    pub stats: StatsTotals,
    pub trending_artworks: Vec<ArtworkWithMeta>,
    pub featured_artists: Vec<ArtistSummary>,
    pub popular_tags: Vec<TagCount>,
    pub recent_activity: Vec<ArtworkWithMeta>,
}

/// Stats service
pub struct StatsService {
    artworks: Arc<dyn ArtworkRepository>,
    users: Arc<dyn UserRepository>,
    comments: Arc<dyn CommentRepository>,
    likes: Arc<dyn LikeRepository>,
    cache: Cache<&'static str, StatsSnapshot>,
}

impl StatsService {
    /// Create a new stats service
    pub fn new(
        artworks: Arc<dyn ArtworkRepository>,
        users: Arc<dyn UserRepository>,
        comments: Arc<dyn CommentRepository>,
        likes: Arc<dyn LikeRepository>,
    ) -> Self {
        Self {
            artworks,
            users,
            comments,
            likes,
            cache: Cache::builder()
                .max_capacity(1)
                .time_to_live(Duration::from_secs(CACHE_TTL_SECS))
                .build(),
        }
    }

    /// Current snapshot, served from cache when fresh
    pub async fn get(&self) -> Result<StatsSnapshot> {
        if let Some(snapshot) = self.cache.get(&"stats").await {
            return Ok(snapshot);
        }

        let snapshot = self.collect().await?;
        self.cache.insert("stats", snapshot.clone()).await;
        Ok(snapshot)
    }

    async fn collect(&self) -> Result<StatsSnapshot> {
        let total_artworks = self
            .artworks
            .count_published()
            .await
            .context("Failed to count artworks")?;
        let total_artists = self
            .users
            .count_artists()
            .await
            .context("Failed to count artists")?;
        let total_comments = self
            .comments
            .count()
            .await
            .context("Failed to count comments")?;
        let total_likes = self.likes.count().await.context("Failed to count likes")?;

        let since = Utc::now() - ChronoDuration::days(TRENDING_WINDOW_DAYS);
        let trending_artworks = self
            .artworks
            .trending(since, TRENDING_LIMIT)
            .await
            .context("Failed to load trending artworks")?;

        let featured_artists = self
            .users
            .featured_artists(FEATURED_ARTISTS_LIMIT)
            .await
            .context("Failed to load featured artists")?;

        let popular_tags = self
            .artworks
            .popular_tags(POPULAR_TAGS_LIMIT)
            .await
            .context("Failed to load popular tags")?
            .into_iter()
            .map(|(name, count)| TagCount { name, count })
            .collect();

        let recent_activity = self
            .artworks
            .recent(RECENT_ACTIVITY_LIMIT)
            .await
            .context("Failed to load recent artworks")?;

        Ok(StatsSnapshot {
            stats: StatsTotals {
                total_artworks,
                total_artists,
                total_comments,
                total_likes,
            },
            trending_artworks,
            featured_artists,
            popular_tags,
            recent_activity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrated_test_gateway;
    use crate::db::repositories::{
        SqlxArtworkRepository, SqlxCommentRepository, SqlxLikeRepository, SqlxUserRepository,
        UserRepository,
    };
    use crate::models::{Artwork, User, UserRole};

    async fn setup() -> StatsService {
        let gateway = migrated_test_gateway().await;
        let users = SqlxUserRepository::new(gateway.clone());
        let artist = users
            .create(&User::new(
                "vermeer".to_string(),
                "vermeer@example.com".to_string(),
                "hash".to_string(),
                "Johannes Vermeer".to_string(),
                UserRole::Artist,
            ))
            .await
            .expect("artist");
        // A browsing member should not count as an artist
        let viewer = users
            .create(&User::new(
                "viewer".to_string(),
                "viewer@example.com".to_string(),
                "hash".to_string(),
                "Gallery Viewer".to_string(),
                UserRole::User,
            ))
            .await
            .expect("viewer");

        let artworks = SqlxArtworkRepository::new(gateway.clone());
        let likes = SqlxLikeRepository::new(gateway.clone());
        let comments = SqlxCommentRepository::new(gateway.clone());
        let now = Utc::now();

        let mut ids = Vec::new();
        for (title, tags) in [
            ("The Milkmaid", vec!["oil".to_string()]),
            ("View of Delft", vec!["oil".to_string(), "landscape".to_string()]),
        ] {
            let id = crate::db::repositories::ArtworkRepository::create(
                &artworks,
                &Artwork {
                    id: 0,
                    title: title.to_string(),
                    description: None,
                    author_id: artist.id,
                    is_published: true,
                    view_count: 0,
                    like_count: 0,
                    comment_count: 0,
                    created_at: now,
                    updated_at: now,
                },
                &[],
                &tags,
            )
            .await
            .expect("artwork");
            ids.push(id);
        }

        crate::db::repositories::LikeRepository::toggle(&likes, viewer.id, ids[0])
            .await
            .expect("like")
            .unwrap();
        crate::db::repositories::CommentRepository::create(
            &comments,
            ids[0],
            viewer.id,
            None,
            "Beautiful",
        )
        .await
        .expect("comment")
        .unwrap();

        StatsService::new(
            SqlxArtworkRepository::boxed(gateway.clone()),
            SqlxUserRepository::boxed(gateway.clone()),
            SqlxCommentRepository::boxed(gateway.clone()),
            SqlxLikeRepository::boxed(gateway),
        )
    }

    #[tokio::test]
    async fn test_snapshot_contents() {
        let service = setup().await;
        let snapshot = service.get().await.expect("stats");

        assert_eq!(snapshot.stats.total_artworks, 2);
        assert_eq!(snapshot.stats.total_artists, 1);
        assert_eq!(snapshot.stats.total_comments, 1);
        assert_eq!(snapshot.stats.total_likes, 1);

        // Most liked first
        assert_eq!(snapshot.trending_artworks[0].title, "The Milkmaid");
        assert_eq!(snapshot.trending_artworks[0].like_count, 1);

        assert_eq!(snapshot.featured_artists.len(), 1);
        assert_eq!(snapshot.featured_artists[0].username, "vermeer");
        assert_eq!(snapshot.featured_artists[0].artwork_count, 2);

        assert_eq!(snapshot.popular_tags[0].name, "oil");
        assert_eq!(snapshot.popular_tags[0].count, 2);

        assert_eq!(snapshot.recent_activity.len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_is_cached() {
        let service = setup().await;
        let first = service.get().await.expect("stats");
        let second = service.get().await.expect("stats");
        assert_eq!(first.stats.total_artworks, second.stats.total_artworks);
    }
}
