//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::AuthorSummary;

/// Comment entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub artwork_id: i64,
    pub user_id: i64,
    /// Parent comment for replies (one level deep)
    pub parent_id: Option<i64>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Comment wire form with its author embedded
#[derive(Debug, Clone, Serialize)]
pub struct CommentWithAuthor {
    pub id: i64,
    pub artwork_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub author: AuthorSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a comment
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentInput {
    pub artwork_id: i64,
    #[serde(default)]
    pub parent_id: Option<i64>,
    pub content: String,
}
