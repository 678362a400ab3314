//! Artwork repository
//!
//! Database operations for artworks and their attached images and tags.
//! Image rows and tag links are written in the same transaction as the
//! artwork itself, so a failed write never leaves a half-attached piece.

use crate::db::DynGateway;
use crate::models::{
    Artwork, ArtworkFilter, ArtworkWithMeta, AuthorSummary, Image, ImageInput, PagedResult,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::collections::HashMap;
use std::sync::Arc;

/// Artwork repository trait
#[async_trait]
pub trait ArtworkRepository: Send + Sync {
    /// Create an artwork together with its images and tags
    async fn create(
        &self,
        artwork: &Artwork,
        images: &[ImageInput],
        tags: &[String],
    ) -> Result<i64>;

    /// Get the stored artwork row
    async fn get_by_id(&self, id: i64) -> Result<Option<Artwork>>;

    /// Get an artwork with author, images, and tags embedded.
    ///
    /// Like/comment counts are recomputed from the underlying tables here
    /// rather than read from the cached columns.
    async fn get_with_meta(&self, id: i64) -> Result<Option<ArtworkWithMeta>>;

    /// List artworks matching `filter`, newest first
    async fn list(
        &self,
        filter: &ArtworkFilter,
        page: i64,
        per_page: i64,
    ) -> Result<PagedResult<ArtworkWithMeta>>;

    /// Update an artwork; `images`/`tags` replace the existing sets when given
    async fn update(
        &self,
        artwork: &Artwork,
        images: Option<&[ImageInput]>,
        tags: Option<&[String]>,
    ) -> Result<()>;

    /// Delete an artwork (images, comments, likes, tag links cascade)
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Increment the view counter
    async fn increment_view(&self, id: i64) -> Result<bool>;

    /// Published artworks created since `since`, most liked first
    async fn trending(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<ArtworkWithMeta>>;

    /// Latest published artworks
    async fn recent(&self, limit: i64) -> Result<Vec<ArtworkWithMeta>>;

    /// Count published artworks
    async fn count_published(&self) -> Result<i64>;

    /// Tags by usage across published artworks, most used first
    async fn popular_tags(&self, limit: i64) -> Result<Vec<(String, i64)>>;
}

/// SQLx-based artwork repository implementation
pub struct SqlxArtworkRepository {
    gateway: DynGateway,
}

impl SqlxArtworkRepository {
    /// Create a new SQLx artwork repository
    pub fn new(gateway: DynGateway) -> Self {
        Self { gateway }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(gateway: DynGateway) -> Arc<dyn ArtworkRepository> {
        Arc::new(Self::new(gateway))
    }

    async fn pool(&self) -> Result<SqlitePool> {
        Ok(self.gateway.acquire().await?)
    }
}

const ARTWORK_COLUMNS: &str = "id, title, description, author_id, is_published, view_count, \
     like_count, comment_count, created_at, updated_at";

#[async_trait]
impl ArtworkRepository for SqlxArtworkRepository {
    async fn create(
        &self,
        artwork: &Artwork,
        images: &[ImageInput],
        tags: &[String],
    ) -> Result<i64> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await.context("Failed to begin transaction")?;
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO artworks (title, description, author_id, is_published, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&artwork.title)
        .bind(&artwork.description)
        .bind(artwork.author_id)
        .bind(artwork.is_published)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create artwork")?;

        let id = result.last_insert_rowid();

        replace_images(&mut tx, id, artwork.author_id, images).await?;
        replace_tags(&mut tx, id, tags).await?;

        tx.commit().await.context("Failed to commit artwork")?;
        Ok(id)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Artwork>> {
        let pool = self.pool().await?;
        let row = sqlx::query(&format!(
            "SELECT {ARTWORK_COLUMNS} FROM artworks WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&pool)
        .await
        .context("Failed to get artwork by ID")?;

        Ok(row.map(|row| row_to_artwork(&row)))
    }

    async fn get_with_meta(&self, id: i64) -> Result<Option<ArtworkWithMeta>> {
        let pool = self.pool().await?;
        let row = sqlx::query(&format!(
            "SELECT {ARTWORK_COLUMNS} FROM artworks WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&pool)
        .await
        .context("Failed to get artwork by ID")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut artwork = row_to_artwork(&row);

        // The detail view reports live counts from the source tables.
        let likes = sqlx::query("SELECT COUNT(*) as count FROM likes WHERE artwork_id = ?")
            .bind(id)
            .fetch_one(&pool)
            .await
            .context("Failed to count likes")?;
        artwork.like_count = likes.get("count");

        let comments = sqlx::query("SELECT COUNT(*) as count FROM comments WHERE artwork_id = ?")
            .bind(id)
            .fetch_one(&pool)
            .await
            .context("Failed to count comments")?;
        artwork.comment_count = comments.get("count");

        let mut authors = HashMap::new();
        Ok(Some(to_meta(&pool, artwork, &mut authors).await?))
    }

    async fn list(
        &self,
        filter: &ArtworkFilter,
        page: i64,
        per_page: i64,
    ) -> Result<PagedResult<ArtworkWithMeta>> {
        let pool = self.pool().await?;

        let mut conditions: Vec<String> = Vec::new();
        let mut binds: Vec<String> = Vec::new();

        if let Some(author_id) = filter.author_id {
            conditions.push(format!("author_id = {}", author_id));
        }
        match filter.published {
            Some(published) => {
                conditions.push(format!("is_published = {}", published as i64));
            }
            // Public listings only show published work
            None if filter.author_id.is_none() => {
                conditions.push("is_published = 1".to_string());
            }
            None => {}
        }
        if let Some(query) = filter.query.as_deref().filter(|q| !q.is_empty()) {
            conditions
                .push("(LOWER(title) LIKE ? OR LOWER(COALESCE(description, '')) LIKE ?)".into());
            let pattern = format!("%{}%", query.to_lowercase());
            binds.push(pattern.clone());
            binds.push(pattern);
        }
        if let Some(tag) = filter.tag.as_deref().filter(|t| !t.is_empty()) {
            conditions.push(
                "id IN (SELECT at.artwork_id FROM artwork_tags at \
                 JOIN tags t ON t.id = at.tag_id WHERE t.name = ?)"
                    .into(),
            );
            binds.push(tag.to_lowercase());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) as count FROM artworks {where_clause}");
        let mut count_query = sqlx::query(&count_sql);
        for bind in &binds {
            count_query = count_query.bind(bind);
        }
        let total: i64 = count_query
            .fetch_one(&pool)
            .await
            .context("Failed to count artworks")?
            .get("count");

        let offset = (page.max(1) - 1) * per_page;
        let list_sql = format!(
            "SELECT {ARTWORK_COLUMNS} FROM artworks {where_clause} \
             ORDER BY created_at DESC LIMIT {per_page} OFFSET {offset}"
        );
        let mut list_query = sqlx::query(&list_sql);
        for bind in &binds {
            list_query = list_query.bind(bind);
        }
        let rows = list_query
            .fetch_all(&pool)
            .await
            .context("Failed to list artworks")?;

        let mut authors = HashMap::new();
        let mut data = Vec::with_capacity(rows.len());
        for row in rows {
            data.push(to_meta(&pool, row_to_artwork(&row), &mut authors).await?);
        }

        Ok(PagedResult {
            data,
            total,
            page: page.max(1),
            per_page,
        })
    }

    async fn update(
        &self,
        artwork: &Artwork,
        images: Option<&[ImageInput]>,
        tags: Option<&[String]>,
    ) -> Result<()> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query(
            r#"
            UPDATE artworks
            SET title = ?, description = ?, is_published = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&artwork.title)
        .bind(&artwork.description)
        .bind(artwork.is_published)
        .bind(Utc::now())
        .bind(artwork.id)
        .execute(&mut *tx)
        .await
        .context("Failed to update artwork")?;

        if let Some(images) = images {
            sqlx::query("DELETE FROM images WHERE artwork_id = ?")
                .bind(artwork.id)
                .execute(&mut *tx)
                .await
                .context("Failed to clear images")?;
            replace_images(&mut tx, artwork.id, artwork.author_id, images).await?;
        }

        if let Some(tags) = tags {
            sqlx::query("DELETE FROM artwork_tags WHERE artwork_id = ?")
                .bind(artwork.id)
                .execute(&mut *tx)
                .await
                .context("Failed to clear tags")?;
            replace_tags(&mut tx, artwork.id, tags).await?;
        }

        tx.commit().await.context("Failed to commit update")?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let pool = self.pool().await?;
        let result = sqlx::query("DELETE FROM artworks WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await
            .context("Failed to delete artwork")?;
        Ok(result.rows_affected() > 0)
    }

    async fn increment_view(&self, id: i64) -> Result<bool> {
        let pool = self.pool().await?;
        let result = sqlx::query("UPDATE artworks SET view_count = view_count + 1 WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await
            .context("Failed to increment view count")?;
        Ok(result.rows_affected() > 0)
    }

    async fn trending(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<ArtworkWithMeta>> {
        let pool = self.pool().await?;
        let rows = sqlx::query(&format!(
            "SELECT {ARTWORK_COLUMNS} FROM artworks \
             WHERE is_published = 1 AND created_at >= ? \
             ORDER BY like_count DESC, created_at DESC LIMIT ?"
        ))
        .bind(since)
        .bind(limit)
        .fetch_all(&pool)
        .await
        .context("Failed to list trending artworks")?;

        let mut authors = HashMap::new();
        let mut data = Vec::with_capacity(rows.len());
        for row in rows {
            data.push(to_meta(&pool, row_to_artwork(&row), &mut authors).await?);
        }
        Ok(data)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<ArtworkWithMeta>> {
        let pool = self.pool().await?;
        let rows = sqlx::query(&format!(
            "SELECT {ARTWORK_COLUMNS} FROM artworks \
             WHERE is_published = 1 ORDER BY created_at DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&pool)
        .await
        .context("Failed to list recent artworks")?;

        let mut authors = HashMap::new();
        let mut data = Vec::with_capacity(rows.len());
        for row in rows {
            data.push(to_meta(&pool, row_to_artwork(&row), &mut authors).await?);
        }
        Ok(data)
    }

    async fn count_published(&self) -> Result<i64> {
        let pool = self.pool().await?;
        let row = sqlx::query("SELECT COUNT(*) as count FROM artworks WHERE is_published = 1")
            .fetch_one(&pool)
            .await
            .context("Failed to count artworks")?;
        Ok(row.get("count"))
    }

    async fn popular_tags(&self, limit: i64) -> Result<Vec<(String, i64)>> {
        let pool = self.pool().await?;
        let rows = sqlx::query(
            r#"
            SELECT t.name, COUNT(*) as count
            FROM artwork_tags at
            JOIN tags t ON t.id = at.tag_id
            JOIN artworks a ON a.id = at.artwork_id
            WHERE a.is_published = 1
            GROUP BY t.id
            ORDER BY count DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&pool)
        .await
        .context("Failed to list popular tags")?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("name"), row.get("count")))
            .collect())
    }
}

async fn replace_images(
    tx: &mut Transaction<'_, Sqlite>,
    artwork_id: i64,
    uploaded_by: i64,
    images: &[ImageInput],
) -> Result<()> {
    for (position, image) in images.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO images (artwork_id, uploaded_by, url, filename, size, mime_type,
                                width, height, alt, position, created_at)
            VALUES (?, ?, ?, ?, 0, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(artwork_id)
        .bind(uploaded_by)
        .bind(&image.url)
        .bind(filename_from_url(&image.url))
        .bind(mime_from_url(&image.url))
        .bind(image.width)
        .bind(image.height)
        .bind(&image.alt)
        .bind(position as i64)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await
        .context("Failed to attach image")?;
    }
    Ok(())
}

async fn replace_tags(
    tx: &mut Transaction<'_, Sqlite>,
    artwork_id: i64,
    tags: &[String],
) -> Result<()> {
    for tag in tags {
        let name = tag.trim().to_lowercase();
        if name.is_empty() {
            continue;
        }

        sqlx::query("INSERT OR IGNORE INTO tags (name) VALUES (?)")
            .bind(&name)
            .execute(&mut **tx)
            .await
            .context("Failed to upsert tag")?;

        let row = sqlx::query("SELECT id FROM tags WHERE name = ?")
            .bind(&name)
            .fetch_one(&mut **tx)
            .await
            .context("Failed to resolve tag")?;
        let tag_id: i64 = row.get("id");

        sqlx::query("INSERT OR IGNORE INTO artwork_tags (artwork_id, tag_id) VALUES (?, ?)")
            .bind(artwork_id)
            .bind(tag_id)
            .execute(&mut **tx)
            .await
            .context("Failed to link tag")?;
    }
    Ok(())
}

/// Last path segment of the image URL, or a stable placeholder
fn filename_from_url(url: &str) -> String {
    url.rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(|s| s.split('?').next().unwrap_or(s).to_string())
        .unwrap_or_else(|| "image".to_string())
}

fn mime_from_url(url: &str) -> &'static str {
    let name = url.split('?').next().unwrap_or(url).to_lowercase();
    if name.ends_with(".png") {
        "image/png"
    } else if name.ends_with(".gif") {
        "image/gif"
    } else if name.ends_with(".webp") {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

fn row_to_artwork(row: &sqlx::sqlite::SqliteRow) -> Artwork {
    Artwork {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        author_id: row.get("author_id"),
        is_published: row.get("is_published"),
        view_count: row.get("view_count"),
        like_count: row.get("like_count"),
        comment_count: row.get("comment_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Load the author embed, caching within one listing
async fn author_summary(
    pool: &SqlitePool,
    authors: &mut HashMap<i64, AuthorSummary>,
    author_id: i64,
) -> Result<AuthorSummary> {
    if let Some(author) = authors.get(&author_id) {
        return Ok(author.clone());
    }

    let row = sqlx::query("SELECT id, name, username, email, avatar FROM users WHERE id = ?")
        .bind(author_id)
        .fetch_one(pool)
        .await
        .context("Failed to load artwork author")?;

    let avatar: Option<String> = row.get("avatar");
    let email: String = row.get("email");
    let summary = AuthorSummary {
        id: row.get("id"),
        name: row.get("name"),
        username: row.get("username"),
        avatar: match avatar {
            Some(url) if !url.is_empty() => url,
            _ => {
                let hash = format!("{:x}", md5::compute(email.trim().to_lowercase()));
                format!("https://www.gravatar.com/avatar/{}?d=mp&s=80", hash)
            }
        },
    };
    authors.insert(author_id, summary.clone());
    Ok(summary)
}

async fn to_meta(
    pool: &SqlitePool,
    artwork: Artwork,
    authors: &mut HashMap<i64, AuthorSummary>,
) -> Result<ArtworkWithMeta> {
    let author = author_summary(pool, authors, artwork.author_id).await?;

    let image_rows = sqlx::query(
        "SELECT id, artwork_id, uploaded_by, url, filename, size, mime_type, width, height, \
         alt, position, created_at FROM images WHERE artwork_id = ? ORDER BY position",
    )
    .bind(artwork.id)
    .fetch_all(pool)
    .await
    .context("Failed to load artwork images")?;

    let images = image_rows
        .iter()
        .map(|row| Image {
            id: row.get("id"),
            artwork_id: row.get("artwork_id"),
            uploaded_by: row.get("uploaded_by"),
            url: row.get("url"),
            filename: row.get("filename"),
            size: row.get("size"),
            mime_type: row.get("mime_type"),
            width: row.get("width"),
            height: row.get("height"),
            alt: row.get("alt"),
            position: row.get("position"),
            created_at: row.get("created_at"),
        })
        .collect();

    let tag_rows = sqlx::query(
        "SELECT t.name FROM artwork_tags at JOIN tags t ON t.id = at.tag_id \
         WHERE at.artwork_id = ? ORDER BY t.name",
    )
    .bind(artwork.id)
    .fetch_all(pool)
    .await
    .context("Failed to load artwork tags")?;

    let tags = tag_rows.iter().map(|row| row.get("name")).collect();

    Ok(ArtworkWithMeta {
        slug: artwork.slug(),
        published_at: artwork.is_published.then_some(artwork.created_at),
        id: artwork.id,
        title: artwork.title,
        description: artwork.description,
        author,
        images,
        tags,
        is_published: artwork.is_published,
        view_count: artwork.view_count,
        like_count: artwork.like_count,
        comment_count: artwork.comment_count,
        created_at: artwork.created_at,
        updated_at: artwork.updated_at,
    })
}
