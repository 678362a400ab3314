//! Database migrations
//!
//! Code-based migrations for the Atelier server. All migrations are embedded
//! as SQL strings so a single binary can bootstrap its own store.
//!
//! Each migration carries a unique, sequential `version`; applied versions
//! are tracked in the `_migrations` table and skipped on later runs.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements to apply
    pub up: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// All migrations for the Atelier server.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username VARCHAR(30) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                name VARCHAR(100) NOT NULL,
                role VARCHAR(20) NOT NULL DEFAULT 'artist',
                bio VARCHAR(500),
                website VARCHAR(500),
                location VARCHAR(100),
                avatar VARCHAR(500),
                reset_token_hash VARCHAR(64),
                reset_token_expires_at TIMESTAMP,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_users_username ON users(username);
            CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
            CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
        "#,
    },
    Migration {
        version: 2,
        name: "create_sessions",
        up: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
        "#,
    },
    Migration {
        version: 3,
        name: "create_artworks",
        up: r#"
            CREATE TABLE IF NOT EXISTS artworks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(200) NOT NULL,
                description VARCHAR(2000),
                author_id INTEGER NOT NULL,
                is_published INTEGER NOT NULL DEFAULT 1,
                view_count INTEGER NOT NULL DEFAULT 0,
                like_count INTEGER NOT NULL DEFAULT 0,
                comment_count INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_artworks_author_created ON artworks(author_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_artworks_published_created ON artworks(is_published, created_at);
            CREATE INDEX IF NOT EXISTS idx_artworks_like_count ON artworks(like_count);
        "#,
    },
    Migration {
        version: 4,
        name: "create_images",
        up: r#"
            CREATE TABLE IF NOT EXISTS images (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                artwork_id INTEGER NOT NULL,
                uploaded_by INTEGER NOT NULL,
                url VARCHAR(500) NOT NULL,
                filename VARCHAR(255) NOT NULL,
                size INTEGER NOT NULL DEFAULT 0,
                mime_type VARCHAR(50) NOT NULL,
                width INTEGER,
                height INTEGER,
                alt VARCHAR(200),
                position INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (artwork_id) REFERENCES artworks(id) ON DELETE CASCADE,
                FOREIGN KEY (uploaded_by) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_images_artwork_id ON images(artwork_id);
            CREATE INDEX IF NOT EXISTS idx_images_uploaded_by ON images(uploaded_by);
        "#,
    },
    Migration {
        version: 5,
        name: "create_tags",
        up: r#"
            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(50) NOT NULL UNIQUE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS artwork_tags (
                artwork_id INTEGER NOT NULL,
                tag_id INTEGER NOT NULL,
                PRIMARY KEY (artwork_id, tag_id),
                FOREIGN KEY (artwork_id) REFERENCES artworks(id) ON DELETE CASCADE,
                FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_artwork_tags_tag_id ON artwork_tags(tag_id);
        "#,
    },
    Migration {
        version: 6,
        name: "create_comments",
        up: r#"
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                artwork_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                parent_id INTEGER,
                content VARCHAR(1000) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (artwork_id) REFERENCES artworks(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (parent_id) REFERENCES comments(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_comments_artwork_created ON comments(artwork_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_comments_user_id ON comments(user_id);
            CREATE INDEX IF NOT EXISTS idx_comments_parent_id ON comments(parent_id);
        "#,
    },
    Migration {
        version: 7,
        name: "create_likes",
        up: r#"
            CREATE TABLE IF NOT EXISTS likes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                artwork_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (artwork_id) REFERENCES artworks(id) ON DELETE CASCADE,
                UNIQUE(user_id, artwork_id)
            );
            CREATE INDEX IF NOT EXISTS idx_likes_artwork_created ON likes(artwork_id, created_at);
        "#,
    },
];

/// Run all pending migrations, returning the number applied.
pub async fn run_migrations(pool: &SqlitePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version as i32).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

async fn create_migrations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create migrations table")?;
    Ok(())
}

async fn get_applied_migrations(pool: &SqlitePool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;

    let mut records = Vec::new();
    for row in rows {
        records.push(MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        });
    }

    Ok(records)
}

async fn apply_migration(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    // Migration SQL may contain multiple statements
    for statement in split_sql_statements(migration.up) {
        let statement = statement.trim();
        if !statement.is_empty() {
            sqlx::query(statement)
                .execute(pool)
                .await
                .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
        }
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(pool)
        .await?;

    Ok(())
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    if sql.len() > 100 {
        format!("{}...", &sql[..100])
    } else {
        sql.to_string()
    }
}

/// Split SQL into individual statements, handling comments properly
fn split_sql_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut current_start = 0;
    let mut in_statement = false;

    for (i, c) in sql.char_indices() {
        match c {
            ';' => {
                if in_statement {
                    let stmt = sql[current_start..i].trim();
                    if !stmt.is_empty() && !is_comment_only(stmt) {
                        statements.push(stmt);
                    }
                    in_statement = false;
                }
                current_start = i + 1;
            }
            _ if !c.is_whitespace() && !in_statement => {
                current_start = i;
                in_statement = true;
            }
            _ => {}
        }
    }

    if in_statement {
        let stmt = sql[current_start..].trim();
        if !stmt.is_empty() && !is_comment_only(stmt) {
            statements.push(stmt);
        }
    }

    statements
}

/// Check if a string contains only SQL comments
fn is_comment_only(s: &str) -> bool {
    for line in s.lines() {
        let trimmed = line.trim();
        if !trimmed.is_empty() && !trimmed.starts_with("--") {
            return false;
        }
    }
    true
}

/// Get the total number of migrations defined
pub fn total_migrations() -> usize {
    MIGRATIONS.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = test_pool().await;

        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, MIGRATIONS.len());

        // Running again should apply 0 migrations
        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_users_table_created() {
        let pool = test_pool().await;
        run_migrations(&pool).await.expect("Failed to run migrations");

        let result = sqlx::query(
            "INSERT INTO users (username, email, password_hash, name, role) VALUES (?, ?, ?, ?, ?)",
        )
        .bind("vermeer")
        .bind("vermeer@example.com")
        .bind("hash123")
        .bind("Johannes Vermeer")
        .bind("artist")
        .execute(&pool)
        .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_user_uniqueness_constraints() {
        let pool = test_pool().await;
        run_migrations(&pool).await.expect("Failed to run migrations");

        sqlx::query(
            "INSERT INTO users (username, email, password_hash, name) VALUES (?, ?, ?, ?)",
        )
        .bind("vermeer")
        .bind("vermeer@example.com")
        .bind("hash123")
        .bind("Johannes Vermeer")
        .execute(&pool)
        .await
        .expect("Failed to create first user");

        // Duplicate username rejected
        let result = sqlx::query(
            "INSERT INTO users (username, email, password_hash, name) VALUES (?, ?, ?, ?)",
        )
        .bind("vermeer")
        .bind("other@example.com")
        .bind("hash456")
        .bind("Someone Else")
        .execute(&pool)
        .await;
        assert!(result.is_err());

        // Duplicate email rejected
        let result = sqlx::query(
            "INSERT INTO users (username, email, password_hash, name) VALUES (?, ?, ?, ?)",
        )
        .bind("rembrandt")
        .bind("vermeer@example.com")
        .bind("hash456")
        .bind("Someone Else")
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_like_uniqueness_constraint() {
        let pool = test_pool().await;
        run_migrations(&pool).await.expect("Failed to run migrations");

        sqlx::query(
            "INSERT INTO users (username, email, password_hash, name) VALUES (?, ?, ?, ?)",
        )
        .bind("vermeer")
        .bind("vermeer@example.com")
        .bind("hash")
        .bind("Johannes Vermeer")
        .execute(&pool)
        .await
        .expect("user");

        sqlx::query("INSERT INTO artworks (title, author_id) VALUES (?, ?)")
            .bind("Girl with a Pearl Earring")
            .bind(1i64)
            .execute(&pool)
            .await
            .expect("artwork");

        sqlx::query("INSERT INTO likes (user_id, artwork_id) VALUES (?, ?)")
            .bind(1i64)
            .bind(1i64)
            .execute(&pool)
            .await
            .expect("first like");

        // Second like from the same user for the same artwork must fail
        let result = sqlx::query("INSERT INTO likes (user_id, artwork_id) VALUES (?, ?)")
            .bind(1i64)
            .bind(1i64)
            .execute(&pool)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_foreign_key_constraints() {
        let pool = test_pool().await;
        run_migrations(&pool).await.expect("Failed to run migrations");

        // Session referencing a non-existent user must fail
        let result = sqlx::query(
            "INSERT INTO sessions (id, user_id, expires_at) VALUES (?, ?, datetime('now', '+1 day'))",
        )
        .bind("session123")
        .bind(999i64)
        .execute(&pool)
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_artwork_cascade_delete() {
        let pool = test_pool().await;
        run_migrations(&pool).await.expect("Failed to run migrations");

        sqlx::query(
            "INSERT INTO users (username, email, password_hash, name) VALUES (?, ?, ?, ?)",
        )
        .bind("vermeer")
        .bind("vermeer@example.com")
        .bind("hash")
        .bind("Johannes Vermeer")
        .execute(&pool)
        .await
        .expect("user");

        sqlx::query("INSERT INTO artworks (title, author_id) VALUES (?, ?)")
            .bind("Study")
            .bind(1i64)
            .execute(&pool)
            .await
            .expect("artwork");

        sqlx::query(
            "INSERT INTO images (artwork_id, uploaded_by, url, filename, mime_type) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(1i64)
        .bind(1i64)
        .bind("https://example.com/a.jpg")
        .bind("a.jpg")
        .bind("image/jpeg")
        .execute(&pool)
        .await
        .expect("image");

        sqlx::query("DELETE FROM artworks WHERE id = 1")
            .execute(&pool)
            .await
            .expect("delete");

        let row = sqlx::query("SELECT COUNT(*) as count FROM images")
            .fetch_one(&pool)
            .await
            .expect("count");
        let count: i64 = row.get("count");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_total_migrations() {
        assert_eq!(total_migrations(), 7);
    }

    #[test]
    fn test_split_sql_statements() {
        let sql = "CREATE TABLE a (id INT); CREATE TABLE b (id INT);";
        let statements = split_sql_statements(sql);
        assert_eq!(statements.len(), 2);

        let sql_with_comments = "-- Comment\nCREATE TABLE a (id INT);";
        let statements = split_sql_statements(sql_with_comments);
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn test_is_comment_only() {
        assert!(is_comment_only("-- This is a comment"));
        assert!(is_comment_only("-- Line 1\n-- Line 2"));
        assert!(!is_comment_only("CREATE TABLE test"));
        assert!(!is_comment_only("-- Comment\nCREATE TABLE test"));
    }
}
