//! Artwork model
//!
//! An artwork is a published piece with attached images and tags. The
//! `like_count` / `comment_count` columns are a derived cache of the
//! underlying like/comment rows, maintained in the same transaction as
//! those rows so the two can never drift apart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::image::{Image, ImageInput};
use super::user::AuthorSummary;

/// Artwork entity as stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artwork {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub author_id: i64,
    pub is_published: bool,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Artwork {
    /// URL slug derived from the title
    pub fn slug(&self) -> String {
        generate_slug(&self.title)
    }
}

/// Derive a URL slug: lowercase, runs of non-alphanumerics collapsed to `-`.
pub fn generate_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = true; // suppress a leading dash
    for c in title.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Artwork wire form with author, images, and tags embedded
#[derive(Debug, Clone, Serialize)]
pub struct ArtworkWithMeta {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub author: AuthorSummary,
    pub images: Vec<Image>,
    pub tags: Vec<String>,
    pub is_published: bool,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Input for creating an artwork
#[derive(Debug, Clone, Deserialize)]
pub struct CreateArtworkInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<ImageInput>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_published: bool,
}

/// Input for updating an artwork. `images`/`tags` replace the existing
/// sets when present and leave them untouched when absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateArtworkInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub images: Option<Vec<ImageInput>>,
    pub tags: Option<Vec<String>>,
    pub is_published: Option<bool>,
}

/// Filter for artwork listings
#[derive(Debug, Clone, Default)]
pub struct ArtworkFilter {
    /// Case-insensitive match against title/description
    pub query: Option<String>,
    /// Restrict to artworks carrying this tag
    pub tag: Option<String>,
    /// Restrict to this author
    pub author_id: Option<i64>,
    /// Explicit published filter; `None` means "published only" unless the
    /// listing is scoped to the requesting author
    pub published: Option<bool>,
}

/// A page of results
#[derive(Debug, Clone, Serialize)]
pub struct PagedResult<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

impl<T> PagedResult<T> {
    /// Empty page, used as the read-path fallback payload
    pub fn empty(page: i64, per_page: i64) -> Self {
        Self {
            data: Vec::new(),
            total: 0,
            page,
            per_page,
        }
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn slug_contains_only_url_safe_chars(title in ".{0,80}") {
            let slug = generate_slug(&title);
            prop_assert!(slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
        }

        #[test]
        fn slug_generation_is_idempotent(title in ".{0,80}") {
            let slug = generate_slug(&title);
            prop_assert_eq!(generate_slug(&slug), slug);
        }
    }
}
