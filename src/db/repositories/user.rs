//! User repository
//!
//! Database operations for users.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait against the gateway

use crate::db::DynGateway;
use crate::models::{ArtistSummary, User, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by username
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Get user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Update profile fields, password hash, and reset-token columns
    async fn update(&self, user: &User) -> Result<User>;

    /// Store a password-reset token digest with its expiry
    async fn set_reset_token(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Look up the user holding this reset-token digest
    async fn get_by_reset_token(&self, token_hash: &str) -> Result<Option<User>>;

    /// Count total users
    async fn count(&self) -> Result<i64>;

    /// Count publishing members (artists and admins)
    async fn count_artists(&self) -> Result<i64>;

    /// Artists with at least one artwork, most prolific first
    async fn featured_artists(&self, limit: i64) -> Result<Vec<ArtistSummary>>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    gateway: DynGateway,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(gateway: DynGateway) -> Self {
        Self { gateway }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(gateway: DynGateway) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(gateway))
    }

    async fn pool(&self) -> Result<SqlitePool> {
        Ok(self.gateway.acquire().await?)
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, name, role, bio, website, \
     location, avatar, reset_token_hash, reset_token_expires_at, created_at, updated_at";

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let pool = self.pool().await?;
        let now = Utc::now();
        let role_str = user.role.to_string();

        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash, name, role, bio, website,
                               location, avatar, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(&role_str)
        .bind(&user.bio)
        .bind(&user.website)
        .bind(&user.location)
        .bind(&user.avatar)
        .bind(now)
        .bind(now)
        .execute(&pool)
        .await
        .context("Failed to create user")?;

        let id = result.last_insert_rowid();

        Ok(User {
            id,
            created_at: now,
            updated_at: now,
            ..user.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let pool = self.pool().await?;
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&pool)
            .await
            .context("Failed to get user by ID")?;

        row.map(|row| row_to_user(&row)).transpose()
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let pool = self.pool().await?;
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&pool)
        .await
        .context("Failed to get user by username")?;

        row.map(|row| row_to_user(&row)).transpose()
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let pool = self.pool().await?;
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
            .bind(email)
            .fetch_optional(&pool)
            .await
            .context("Failed to get user by email")?;

        row.map(|row| row_to_user(&row)).transpose()
    }

    async fn update(&self, user: &User) -> Result<User> {
        let pool = self.pool().await?;
        let now = Utc::now();
        let role_str = user.role.to_string();

        sqlx::query(
            r#"
            UPDATE users
            SET username = ?, email = ?, password_hash = ?, name = ?, role = ?, bio = ?,
                website = ?, location = ?, avatar = ?, reset_token_hash = ?,
                reset_token_expires_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(&role_str)
        .bind(&user.bio)
        .bind(&user.website)
        .bind(&user.location)
        .bind(&user.avatar)
        .bind(&user.reset_token_hash)
        .bind(user.reset_token_expires_at)
        .bind(now)
        .bind(user.id)
        .execute(&pool)
        .await
        .context("Failed to update user")?;

        self.get_by_id(user.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after update"))
    }

    async fn set_reset_token(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let pool = self.pool().await?;
        sqlx::query(
            "UPDATE users SET reset_token_hash = ?, reset_token_expires_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(token_hash)
        .bind(expires_at)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&pool)
        .await
        .context("Failed to set reset token")?;
        Ok(())
    }

    async fn get_by_reset_token(&self, token_hash: &str) -> Result<Option<User>> {
        let pool = self.pool().await?;
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE reset_token_hash = ?"
        ))
        .bind(token_hash)
        .fetch_optional(&pool)
        .await
        .context("Failed to get user by reset token")?;

        row.map(|row| row_to_user(&row)).transpose()
    }

    async fn count(&self) -> Result<i64> {
        let pool = self.pool().await?;
        let row = sqlx::query("SELECT COUNT(*) as count FROM users")
            .fetch_one(&pool)
            .await
            .context("Failed to count users")?;
        Ok(row.get("count"))
    }

    async fn count_artists(&self) -> Result<i64> {
        let pool = self.pool().await?;
        let row = sqlx::query("SELECT COUNT(*) as count FROM users WHERE role IN ('artist', 'admin')")
            .fetch_one(&pool)
            .await
            .context("Failed to count artists")?;
        Ok(row.get("count"))
    }

    async fn featured_artists(&self, limit: i64) -> Result<Vec<ArtistSummary>> {
        let pool = self.pool().await?;
        let rows = sqlx::query(
            r#"
            SELECT u.id, u.name, u.username, u.email, u.avatar, u.bio,
                   COUNT(a.id) as artwork_count
            FROM users u
            JOIN artworks a ON a.author_id = u.id
            WHERE u.role IN ('artist', 'admin')
            GROUP BY u.id
            HAVING artwork_count > 0
            ORDER BY artwork_count DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&pool)
        .await
        .context("Failed to list featured artists")?;

        let mut artists = Vec::with_capacity(rows.len());
        for row in rows {
            let avatar: Option<String> = row.get("avatar");
            let email: String = row.get("email");
            artists.push(ArtistSummary {
                id: row.get("id"),
                name: row.get("name"),
                username: row.get("username"),
                avatar: avatar_or_gravatar(avatar, &email),
                bio: row.get("bio"),
                artwork_count: row.get("artwork_count"),
            });
        }
        Ok(artists)
    }
}

fn avatar_or_gravatar(avatar: Option<String>, email: &str) -> String {
    match avatar {
        Some(url) if !url.is_empty() => url,
        _ => {
            let hash = format!("{:x}", md5::compute(email.trim().to_lowercase()));
            format!("https://www.gravatar.com/avatar/{}?d=mp&s=80", hash)
        }
    }
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let role_str: String = row.get("role");
    let role = UserRole::from_str(&role_str)
        .with_context(|| format!("Invalid role in database: {}", role_str))?;

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        name: row.get("name"),
        role,
        bio: row.get("bio"),
        website: row.get("website"),
        location: row.get("location"),
        avatar: row.get("avatar"),
        reset_token_hash: row.get("reset_token_hash"),
        reset_token_expires_at: row.get("reset_token_expires_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
