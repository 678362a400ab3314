//! Artwork service
//!
//! Business logic for publishing and managing artworks: input validation,
//! visibility rules for unpublished work, and ownership checks for
//! mutation.

use crate::db::repositories::ArtworkRepository;
use crate::models::{
    Artwork, ArtworkFilter, ArtworkWithMeta, CreateArtworkInput, PagedResult, UpdateArtworkInput,
    User,
};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

/// Artworks per listing page
pub const PER_PAGE: i64 = 12;

/// Error types for artwork operations
#[derive(Debug, thiserror::Error)]
pub enum ArtworkServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Artwork not found")]
    NotFound,

    #[error("Not allowed to modify this artwork")]
    Forbidden,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Artwork service
pub struct ArtworkService {
    repo: Arc<dyn ArtworkRepository>,
}

impl ArtworkService {
    /// Create a new artwork service
    pub fn new(repo: Arc<dyn ArtworkRepository>) -> Self {
        Self { repo }
    }

    /// Create an artwork for `author`
    pub async fn create(
        &self,
        author: &User,
        input: CreateArtworkInput,
    ) -> Result<ArtworkWithMeta, ArtworkServiceError> {
        let title = input.title.trim().to_string();
        validate_title(&title)?;
        validate_description(input.description.as_deref())?;
        validate_tags(&input.tags)?;
        validate_image_urls(input.images.iter().map(|i| i.url.as_str()))?;

        let now = Utc::now();
        let artwork = Artwork {
            id: 0,
            title,
            description: normalize_description(input.description),
            author_id: author.id,
            is_published: input.is_published,
            view_count: 0,
            like_count: 0,
            comment_count: 0,
            created_at: now,
            updated_at: now,
        };

        let id = self
            .repo
            .create(&artwork, &input.images, &input.tags)
            .await
            .context("Failed to create artwork")?;

        self.repo
            .get_with_meta(id)
            .await
            .context("Failed to load created artwork")?
            .ok_or(ArtworkServiceError::NotFound)
    }

    /// Full artwork detail.
    ///
    /// Unpublished artworks are visible only to their owner and admins.
    pub async fn get_detail(
        &self,
        id: i64,
        viewer: Option<&User>,
    ) -> Result<ArtworkWithMeta, ArtworkServiceError> {
        let artwork = self
            .repo
            .get_with_meta(id)
            .await
            .context("Failed to load artwork")?
            .ok_or(ArtworkServiceError::NotFound)?;

        if !artwork.is_published {
            let visible = viewer
                .map(|user| user.can_modify(artwork.author.id))
                .unwrap_or(false);
            if !visible {
                return Err(ArtworkServiceError::NotFound);
            }
        }

        Ok(artwork)
    }

    /// List artworks, newest first
    pub async fn list(
        &self,
        filter: ArtworkFilter,
        page: i64,
    ) -> Result<PagedResult<ArtworkWithMeta>, ArtworkServiceError> {
        Ok(self
            .repo
            .list(&filter, page, PER_PAGE)
            .await
            .context("Failed to list artworks")?)
    }

    /// Update an artwork; only the owner or an admin may do so
    pub async fn update(
        &self,
        id: i64,
        caller: &User,
        input: UpdateArtworkInput,
    ) -> Result<ArtworkWithMeta, ArtworkServiceError> {
        let mut artwork = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to load artwork")?
            .ok_or(ArtworkServiceError::NotFound)?;

        if !caller.can_modify(artwork.author_id) {
            return Err(ArtworkServiceError::Forbidden);
        }

        if let Some(title) = input.title {
            let title = title.trim().to_string();
            validate_title(&title)?;
            artwork.title = title;
        }
        if let Some(description) = input.description {
            validate_description(Some(&description))?;
            artwork.description = normalize_description(Some(description));
        }
        if let Some(is_published) = input.is_published {
            artwork.is_published = is_published;
        }
        if let Some(tags) = &input.tags {
            validate_tags(tags)?;
        }
        if let Some(images) = &input.images {
            validate_image_urls(images.iter().map(|i| i.url.as_str()))?;
        }

        self.repo
            .update(&artwork, input.images.as_deref(), input.tags.as_deref())
            .await
            .context("Failed to update artwork")?;

        self.repo
            .get_with_meta(id)
            .await
            .context("Failed to load updated artwork")?
            .ok_or(ArtworkServiceError::NotFound)
    }

    /// Delete an artwork; only the owner or an admin may do so
    pub async fn delete(&self, id: i64, caller: &User) -> Result<(), ArtworkServiceError> {
        let artwork = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to load artwork")?
            .ok_or(ArtworkServiceError::NotFound)?;

        if !caller.can_modify(artwork.author_id) {
            return Err(ArtworkServiceError::Forbidden);
        }

        self.repo
            .delete(id)
            .await
            .context("Failed to delete artwork")?;
        Ok(())
    }

    /// Record one view of an artwork
    pub async fn increment_view(&self, id: i64) -> Result<(), ArtworkServiceError> {
        let found = self
            .repo
            .increment_view(id)
            .await
            .context("Failed to increment view count")?;
        if !found {
            return Err(ArtworkServiceError::NotFound);
        }
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<(), ArtworkServiceError> {
    if title.is_empty() {
        return Err(ArtworkServiceError::ValidationError(
            "Title is required".to_string(),
        ));
    }
    if title.len() > 200 {
        return Err(ArtworkServiceError::ValidationError(
            "Title must be at most 200 characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_description(description: Option<&str>) -> Result<(), ArtworkServiceError> {
    if let Some(description) = description {
        if description.len() > 2000 {
            return Err(ArtworkServiceError::ValidationError(
                "Description must be at most 2000 characters".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_tags(tags: &[String]) -> Result<(), ArtworkServiceError> {
    for tag in tags {
        if tag.trim().len() > 50 {
            return Err(ArtworkServiceError::ValidationError(
                "Tags must be at most 50 characters".to_string(),
            ));
        }
    }
    Ok(())
}

/// Image URLs must be absolute http(s) or a local upload path
fn validate_image_urls<'a>(urls: impl Iterator<Item = &'a str>) -> Result<(), ArtworkServiceError> {
    for url in urls {
        let ok = url.starts_with("http://") || url.starts_with("https://") || url.starts_with('/');
        if !ok {
            return Err(ArtworkServiceError::ValidationError(format!(
                "Invalid image URL: {}",
                url
            )));
        }
    }
    Ok(())
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrated_test_gateway;
    use crate::db::repositories::{SqlxArtworkRepository, SqlxUserRepository, UserRepository};
    use crate::models::{ImageInput, UserRole};

    async fn setup() -> (ArtworkService, User, User) {
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
        let other = users
            .create(&User::new(
                "rembrandt".to_string(),
                "rembrandt@example.com".to_string(),
                "hash".to_string(),
                "Rembrandt van Rijn".to_string(),
                UserRole::Artist,
            ))
            .await
            .expect("other");

        (
            ArtworkService::new(SqlxArtworkRepository::boxed(gateway)),
            owner,
            other,
        )
    }

    fn create_input(title: &str, published: bool) -> CreateArtworkInput {
        CreateArtworkInput {
            title: title.to_string(),
            description: Some("Oil on canvas".to_string()),
            images: vec![ImageInput {
                url: "/uploads/abc.jpg".to_string(),
                alt: None,
                width: None,
                height: None,
            }],
            tags: vec!["baroque".to_string()],
            is_published: published,
        }
    }

    #[tokio::test]
    async fn test_create_and_detail() {
        let (service, owner, _) = setup().await;
        let created = service
            .create(&owner, create_input("The Astronomer", true))
            .await
            .expect("create");

        assert_eq!(created.slug, "the-astronomer");
        assert_eq!(created.images.len(), 1);

        let detail = service
            .get_detail(created.id, None)
            .await
            .expect("detail");
        assert_eq!(detail.title, "The Astronomer");
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (service, owner, _) = setup().await;

        let err = service
            .create(&owner, create_input("   ", true))
            .await
            .unwrap_err();
        assert!(matches!(err, ArtworkServiceError::ValidationError(_)));

        let mut input = create_input("Valid", true);
        input.images[0].url = "javascript:alert(1)".to_string();
        let err = service.create(&owner, input).await.unwrap_err();
        assert!(matches!(err, ArtworkServiceError::ValidationError(_)));

        let mut input = create_input("Valid", true);
        input.title = "x".repeat(201);
        let err = service.create(&owner, input).await.unwrap_err();
        assert!(matches!(err, ArtworkServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_unpublished_visibility() {
        let (service, owner, other) = setup().await;
        let draft = service
            .create(&owner, create_input("Draft", false))
            .await
            .expect("create");

        // Anonymous viewers and other users see a 404
        assert!(matches!(
            service.get_detail(draft.id, None).await.unwrap_err(),
            ArtworkServiceError::NotFound
        ));
        assert!(matches!(
            service.get_detail(draft.id, Some(&other)).await.unwrap_err(),
            ArtworkServiceError::NotFound
        ));

        // The owner sees the draft
        service
            .get_detail(draft.id, Some(&owner))
            .await
            .expect("owner sees draft");
    }

    #[tokio::test]
    async fn test_update_ownership() {
        let (service, owner, other) = setup().await;
        let artwork = service
            .create(&owner, create_input("Original", true))
            .await
            .expect("create");

        let err = service
            .update(
                artwork.id,
                &other,
                UpdateArtworkInput {
                    title: Some("Hijacked".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ArtworkServiceError::Forbidden));

        let updated = service
            .update(
                artwork.id,
                &owner,
                UpdateArtworkInput {
                    title: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .expect("update");
        assert_eq!(updated.title, "Renamed");
    }

    #[tokio::test]
    async fn test_admin_can_delete_any() {
        let (service, owner, mut other) = setup().await;
        let artwork = service
            .create(&owner, create_input("Target", true))
            .await
            .expect("create");

        let err = service.delete(artwork.id, &other).await.unwrap_err();
        assert!(matches!(err, ArtworkServiceError::Forbidden));

        other.role = UserRole::Admin;
        service
            .delete(artwork.id, &other)
            .await
            .expect("admin delete");

        assert!(matches!(
            service.get_detail(artwork.id, Some(&owner)).await.unwrap_err(),
            ArtworkServiceError::NotFound
        ));
    }

    #[tokio::test]
    async fn test_increment_view() {
        let (service, owner, _) = setup().await;
        let artwork = service
            .create(&owner, create_input("Watched", true))
            .await
            .expect("create");

        service.increment_view(artwork.id).await.expect("view");
        let detail = service
            .get_detail(artwork.id, None)
            .await
            .expect("detail");
        assert_eq!(detail.view_count, 1);

        assert!(matches!(
            service.increment_view(9999).await.unwrap_err(),
            ArtworkServiceError::NotFound
        ));
    }
}
