//! Session repository
//!
//! Database operations for user sessions.

use crate::db::DynGateway;
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Create a new session
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Get session by ID (token)
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    /// Delete a session
    async fn delete(&self, id: &str) -> Result<()>;

    /// Delete all sessions for a user
    async fn delete_by_user(&self, user_id: i64) -> Result<()>;

    /// Delete expired sessions
    async fn delete_expired(&self) -> Result<i64>;
}

/// SQLx-based session repository implementation
pub struct SqlxSessionRepository {
    gateway: DynGateway,
}

impl SqlxSessionRepository {
    /// Create a new SQLx session repository
    pub fn new(gateway: DynGateway) -> Self {
        Self { gateway }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(gateway: DynGateway) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(gateway))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        let pool = self.gateway.acquire().await?;
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, expires_at, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(session.user_id)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&pool)
        .await
        .context("Failed to create session")?;

        Ok(session.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        let pool = self.gateway.acquire().await?;
        let row = sqlx::query(
            r#"
            SELECT id, user_id, expires_at, created_at
            FROM sessions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&pool)
        .await
        .context("Failed to get session by ID")?;

        Ok(row.map(|row| Session {
            id: row.get("id"),
            user_id: row.get("user_id"),
            expires_at: row.get("expires_at"),
            created_at: row.get("created_at"),
        }))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let pool = self.gateway.acquire().await?;
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await
            .context("Failed to delete session")?;

        Ok(())
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<()> {
        let pool = self.gateway.acquire().await?;
        sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&pool)
            .await
            .context("Failed to delete sessions by user")?;

        Ok(())
    }

    async fn delete_expired(&self) -> Result<i64> {
        let pool = self.gateway.acquire().await?;
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
            .bind(Utc::now())
            .execute(&pool)
            .await
            .context("Failed to delete expired sessions")?;

        Ok(result.rows_affected() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrated_test_gateway;
    use crate::db::repositories::user::{SqlxUserRepository, UserRepository};
    use crate::models::{User, UserRole};
    use chrono::Duration;

    async fn setup() -> (SqlxSessionRepository, i64) {
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
        (SqlxSessionRepository::new(gateway), user.id)
    }

    fn session_for(user_id: i64, ttl: Duration) -> Session {
        let now = Utc::now();
        Session {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + ttl,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let (repo, user_id) = setup().await;
        let session = session_for(user_id, Duration::days(7));

        repo.create(&session).await.expect("create");

        let found = repo.get_by_id(&session.id).await.expect("get").unwrap();
        assert_eq!(found.user_id, user_id);
        assert!(!found.is_expired());
    }

    #[tokio::test]
    async fn test_delete_session() {
        let (repo, user_id) = setup().await;
        let session = session_for(user_id, Duration::days(7));
        repo.create(&session).await.expect("create");

        repo.delete(&session.id).await.expect("delete");
        assert!(repo.get_by_id(&session.id).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_delete_by_user() {
        let (repo, user_id) = setup().await;
        repo.create(&session_for(user_id, Duration::days(7)))
            .await
            .expect("create");
        repo.create(&session_for(user_id, Duration::days(7)))
            .await
            .expect("create");

        repo.delete_by_user(user_id).await.expect("delete");
        assert_eq!(repo.delete_expired().await.expect("sweep"), 0);
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let (repo, user_id) = setup().await;
        repo.create(&session_for(user_id, Duration::days(-1)))
            .await
            .expect("create expired");
        repo.create(&session_for(user_id, Duration::days(7)))
            .await
            .expect("create live");

        let removed = repo.delete_expired().await.expect("sweep");
        assert_eq!(removed, 1);
    }
}
