//! Like model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Like entity. At most one per (user, artwork) pair, enforced by a unique
/// index in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    pub id: i64,
    pub user_id: i64,
    pub artwork_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a like toggle
#[derive(Debug, Clone, Serialize)]
pub struct LikeStatus {
    pub liked: bool,
    pub like_count: i64,
}
