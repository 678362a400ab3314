//! User model
//!
//! Defines the User entity and related types. Users own artworks, comments,
//! and likes; roles determine moderation rights.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User entity representing a registered member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique, lowercase)
    pub username: String,
    /// Email address (unique, lowercase)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Display name
    pub name: String,
    /// User role
    pub role: UserRole,
    /// Short biography
    pub bio: Option<String>,
    /// Personal website (http/https)
    pub website: Option<String>,
    /// Free-form location
    pub location: Option<String>,
    /// Avatar URL
    pub avatar: Option<String>,
    /// SHA-256 digest of the outstanding password-reset token
    #[serde(skip_serializing)]
    pub reset_token_hash: Option<String>,
    /// When the outstanding reset token stops being accepted
    #[serde(skip_serializing)]
    pub reset_token_expires_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User. The password must already be hashed
    /// (`services::password::hash_password`).
    pub fn new(
        username: String,
        email: String,
        password_hash: String,
        name: String,
        role: UserRole,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Set by the database
            username,
            email,
            password_hash,
            name,
            role,
            bio: None,
            website: None,
            location: None,
            avatar: None,
            reset_token_hash: None,
            reset_token_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the user is an administrator
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Check if the user may modify content owned by `author_id`.
    ///
    /// Admins can modify anything; everyone else only their own.
    pub fn can_modify(&self, author_id: i64) -> bool {
        self.is_admin() || self.id == author_id
    }

    /// Avatar URL, falling back to a Gravatar derived from the email
    pub fn avatar_or_gravatar(&self) -> String {
        match &self.avatar {
            Some(url) if !url.is_empty() => url.clone(),
            _ => {
                let hash = format!("{:x}", md5::compute(self.email.trim().to_lowercase()));
                format!("https://www.gravatar.com/avatar/{}?d=mp&s=80", hash)
            }
        }
    }

    /// Compact wire form used when embedding an author in responses
    pub fn summary(&self) -> AuthorSummary {
        AuthorSummary {
            id: self.id,
            name: self.name.clone(),
            username: self.username.clone(),
            avatar: self.avatar_or_gravatar(),
        }
    }
}

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Browsing member
    User,
    /// Publishing member (default for new registrations)
    #[default]
    Artist,
    /// Administrator - full moderation access
    Admin,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::User => write!(f, "user"),
            UserRole::Artist => write!(f, "artist"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(UserRole::User),
            "artist" => Ok(UserRole::Artist),
            "admin" => Ok(UserRole::Admin),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Author embed used by artwork and comment responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub avatar: String,
}

/// Featured-artist entry for the stats endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistSummary {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub avatar: String,
    pub bio: Option<String>,
    pub artwork_count: i64,
}

/// Input for updating a user's profile
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileInput {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub avatar: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(role: UserRole) -> User {
        User::new(
            "vermeer".to_string(),
            "vermeer@example.com".to_string(),
            "hash".to_string(),
            "Johannes Vermeer".to_string(),
            role,
        )
    }

    #[test]
    fn test_user_new_defaults() {
        let user = sample_user(UserRole::Artist);
        assert_eq!(user.id, 0);
        assert_eq!(user.username, "vermeer");
        assert_eq!(user.role, UserRole::Artist);
        assert!(user.bio.is_none());
        assert!(user.reset_token_hash.is_none());
    }

    #[test]
    fn test_can_modify() {
        let mut admin = sample_user(UserRole::Admin);
        admin.id = 1;
        let mut artist = sample_user(UserRole::Artist);
        artist.id = 2;

        assert!(admin.can_modify(1));
        assert!(admin.can_modify(2));
        assert!(admin.can_modify(999));

        assert!(artist.can_modify(2));
        assert!(!artist.can_modify(1));
    }

    #[test]
    fn test_avatar_or_gravatar() {
        let mut user = sample_user(UserRole::Artist);
        assert!(user
            .avatar_or_gravatar()
            .starts_with("https://www.gravatar.com/avatar/"));

        user.avatar = Some("https://cdn.example.com/me.png".to_string());
        assert_eq!(user.avatar_or_gravatar(), "https://cdn.example.com/me.png");
    }

    #[test]
    fn test_role_round_trip() {
        for role in [UserRole::User, UserRole::Artist, UserRole::Admin] {
            assert_eq!(UserRole::from_str(&role.to_string()).unwrap(), role);
        }
        assert!(UserRole::from_str("editor").is_err());
        assert_eq!(UserRole::from_str("ADMIN").unwrap(), UserRole::Admin);
    }

    #[test]
    fn test_role_default() {
        assert_eq!(UserRole::default(), UserRole::Artist);
    }
}
