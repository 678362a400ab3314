//! Image model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Image attached to an artwork
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: i64,
    pub artwork_id: i64,
    pub uploaded_by: i64,
    pub url: String,
    pub filename: String,
    pub size: i64,
    pub mime_type: String,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub alt: Option<String>,
    /// Display order within the artwork
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

/// Input for attaching an image to an artwork
#[derive(Debug, Clone, Deserialize)]
pub struct ImageInput {
    pub url: String,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
}
