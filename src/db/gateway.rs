//! Resilient data-access gateway
//!
//! This module owns the single shared connection pool to the SQLite store
//! and hands it out to repositories. The pool is opened lazily: nothing is
//! connected until the first caller asks, and a failed attempt leaves the
//! gateway ready to try again on the next request instead of wedging the
//! process.
//!
//! Connection state machine:
//!
//! ```text
//!   Disconnected --acquire()--> Connecting --ok--> Connected
//!        ^                          |
//!        +---------- error ---------+
//! ```
//!
//! While `Connecting`, every concurrent caller awaits the same in-flight
//! attempt; at most one connect is ever outstanding, so a burst of requests
//! against a cold or unreachable store produces a single connection attempt
//! rather than a storm.

use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tokio::sync::Mutex;

use crate::config::DatabaseConfig;

/// Error acquiring a store connection.
///
/// Clonable because a single failed attempt is delivered to every caller
/// that was awaiting it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    /// The driver reported a failure while connecting
    #[error("database connection failed: {0}")]
    Connect(#[source] Arc<sqlx::Error>),
    /// The connection attempt exceeded the configured bound
    #[error("database connection attempt timed out after {0}s")]
    Timeout(u64),
    /// The store accepted the connection but a probe query failed
    #[error("database ping failed: {0}")]
    Ping(#[source] Arc<sqlx::Error>),
}

type ConnectFuture = Shared<BoxFuture<'static, Result<SqlitePool, GatewayError>>>;

enum ConnState {
    Disconnected,
    /// An attempt is in flight; the generation number identifies it so a
    /// late waiter of an old attempt cannot disturb a newer one.
    Connecting(u64, ConnectFuture),
    Connected(SqlitePool),
}

/// Gateway to the document store.
///
/// Constructed once in `main` and injected into every repository; there is
/// no process-global handle.
pub struct Gateway {
    config: DatabaseConfig,
    state: Mutex<ConnState>,
    connect_attempts: AtomicU64,
}

/// Shared gateway handle
pub type DynGateway = Arc<Gateway>;

impl Gateway {
    /// Create a gateway for the configured store. Does not connect.
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ConnState::Disconnected),
            connect_attempts: AtomicU64::new(0),
        }
    }

    /// Create a shared gateway handle
    pub fn shared(config: DatabaseConfig) -> DynGateway {
        Arc::new(Self::new(config))
    }

    /// Acquire the shared connection pool.
    ///
    /// Returns the cached pool immediately when connected. When a connect is
    /// already in flight, awaits that same attempt. Otherwise starts a new
    /// bounded attempt and transitions the state machine on its outcome.
    pub async fn acquire(&self) -> Result<SqlitePool, GatewayError> {
        let (generation, attempt) = {
            let mut state = self.state.lock().await;
            match &*state {
                ConnState::Connected(pool) => return Ok(pool.clone()),
                ConnState::Connecting(generation, attempt) => (*generation, attempt.clone()),
                ConnState::Disconnected => {
                    let generation = self.connect_attempts.fetch_add(1, Ordering::Relaxed) + 1;
                    let attempt = connect(self.config.clone()).boxed().shared();
                    *state = ConnState::Connecting(generation, attempt.clone());
                    (generation, attempt)
                }
            }
        };

        match attempt.await {
            Ok(pool) => {
                let mut state = self.state.lock().await;
                if matches!(&*state, ConnState::Connecting(current, _) if *current == generation)
                {
                    tracing::info!(url = %self.config.url, "connected to database");
                    *state = ConnState::Connected(pool.clone());
                }
                Ok(pool)
            }
            Err(e) => {
                // Clear the dead attempt so the next caller starts fresh.
                // Only this generation may be cleared: a late waiter of an
                // old attempt must not stomp a newer in-flight one.
                let mut state = self.state.lock().await;
                if matches!(&*state, ConnState::Connecting(current, _) if *current == generation)
                {
                    *state = ConnState::Disconnected;
                }
                tracing::warn!(url = %self.config.url, error = %e, "database connection failed");
                Err(e)
            }
        }
    }

    /// Run `op` against the store, substituting `fallback` on any failure.
    ///
    /// Returns `fallback` if and only if the connection cannot be acquired
    /// or `op` itself errors; otherwise returns `op`'s result unchanged.
    /// The failure reason is logged either way. Callers that need to
    /// distinguish outcomes should use `acquire()` and propagate instead.
    pub async fn with_fallback<T, F, Fut>(&self, op: F, fallback: T) -> T
    where
        F: FnOnce(SqlitePool) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        match self.acquire().await {
            Ok(pool) => match op(pool).await {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(error = %format!("{e:#}"), "store operation failed, using fallback");
                    fallback
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "store unreachable, using fallback");
                fallback
            }
        }
    }

    /// Probe store connectivity (used by the health endpoint)
    pub async fn ping(&self) -> Result<(), GatewayError> {
        let pool = self.acquire().await?;
        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| GatewayError::Ping(Arc::new(e)))?;
        Ok(())
    }

    /// Number of underlying connect attempts issued so far
    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts.load(Ordering::Relaxed)
    }

    /// Close the pool and return to `Disconnected`
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if let ConnState::Connected(pool) = &*state {
            pool.close().await;
        }
        *state = ConnState::Disconnected;
    }
}

/// One bounded connection attempt.
async fn connect(config: DatabaseConfig) -> Result<SqlitePool, GatewayError> {
    let options = SqliteConnectOptions::from_str(&connection_url(&config.url))
        .map_err(|e| GatewayError::Connect(Arc::new(e)))?
        .create_if_missing(true)
        .foreign_keys(true);

    // Each pooled connection to ":memory:" would get its own private
    // database, so in-memory stores are pinned to a single connection.
    let max_connections = if is_memory_url(&config.url) {
        1
    } else {
        config.max_connections
    };

    if let Some(parent) = parent_dir(&config.url) {
        std::fs::create_dir_all(&parent)
            .map_err(|e| GatewayError::Connect(Arc::new(sqlx::Error::Io(e))))?;
    }

    let pool_future = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options);

    match tokio::time::timeout(
        Duration::from_secs(config.connect_timeout_secs),
        pool_future,
    )
    .await
    {
        Ok(Ok(pool)) => Ok(pool),
        Ok(Err(e)) => Err(GatewayError::Connect(Arc::new(e))),
        Err(_) => Err(GatewayError::Timeout(config.connect_timeout_secs)),
    }
}

fn is_memory_url(url: &str) -> bool {
    url == ":memory:" || url == "sqlite::memory:" || url.contains("mode=memory")
}

/// Normalize a bare file path into a sqlite URL
fn connection_url(url: &str) -> String {
    if url == ":memory:" {
        "sqlite::memory:".to_string()
    } else if url.starts_with("sqlite:") {
        url.to_string()
    } else {
        format!("sqlite:{}", url)
    }
}

/// Parent directory for file-backed stores, if one needs creating
fn parent_dir(url: &str) -> Option<std::path::PathBuf> {
    if is_memory_url(url) {
        return None;
    }
    let path = url.trim_start_matches("sqlite:");
    let parent = std::path::Path::new(path).parent()?;
    if parent.as_os_str().is_empty() {
        return None;
    }
    Some(parent.to_path_buf())
}

/// Whether an error chain bottoms out in a gateway failure.
///
/// Handlers use this to apply the boundary policy: reads degrade to a
/// fallback payload, writes answer 503.
pub fn is_unavailable(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.downcast_ref::<GatewayError>().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_gateway() -> Gateway {
        Gateway::new(DatabaseConfig::in_memory())
    }

    fn broken_gateway() -> Gateway {
        // A database file can never be created under /dev/null.
        Gateway::new(DatabaseConfig {
            url: "/dev/null/atelier/broken.db".to_string(),
            connect_timeout_secs: 2,
            max_connections: 5,
        })
    }

    #[tokio::test]
    async fn test_acquire_connects_once_and_caches() {
        let gateway = memory_gateway();

        let pool = gateway.acquire().await.expect("first acquire");
        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .expect("pool usable");

        // Second acquire reuses the cached pool without a new attempt.
        gateway.acquire().await.expect("second acquire");
        assert_eq!(gateway.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_acquire_deduplicates_attempts() {
        let gateway = Arc::new(memory_gateway());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let gateway = gateway.clone();
            handles.push(tokio::spawn(async move { gateway.acquire().await }));
        }

        for handle in handles {
            handle.await.expect("task").expect("acquire");
        }

        assert_eq!(gateway.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_acquire_shares_failure() {
        let gateway = Arc::new(broken_gateway());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let gateway = gateway.clone();
            handles.push(tokio::spawn(async move { gateway.acquire().await }));
        }

        for handle in handles {
            let result = handle.await.expect("task");
            assert!(result.is_err());
        }

        // All eight callers shared the one failed attempt.
        assert_eq!(gateway.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn test_failed_attempt_resets_state() {
        let gateway = broken_gateway();

        assert!(gateway.acquire().await.is_err());
        assert_eq!(gateway.connect_attempts(), 1);

        // The dead attempt was cleared; the next caller starts a fresh one.
        assert!(gateway.acquire().await.is_err());
        assert_eq!(gateway.connect_attempts(), 2);
    }

    #[tokio::test]
    async fn test_with_fallback_passes_through_success() {
        let gateway = memory_gateway();

        let value = gateway
            .with_fallback(
                |pool| async move {
                    let row: (i64,) = sqlx::query_as("SELECT 41 + 1")
                        .fetch_one(&pool)
                        .await?;
                    Ok(row.0)
                },
                -1,
            )
            .await;

        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_with_fallback_on_operation_error() {
        let gateway = memory_gateway();

        let value = gateway
            .with_fallback(
                |_pool| async move { anyhow::bail!("operation exploded") },
                7,
            )
            .await;

        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_with_fallback_on_unreachable_store() {
        let gateway = broken_gateway();

        let value = gateway
            .with_fallback(|_pool| async move { Ok(1) }, 0)
            .await;

        assert_eq!(value, 0);
    }

    #[tokio::test]
    async fn test_ping() {
        let gateway = memory_gateway();
        gateway.ping().await.expect("ping should succeed");

        let broken = broken_gateway();
        assert!(broken.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_is_unavailable_detects_gateway_errors() {
        let gateway = broken_gateway();
        let err = gateway.acquire().await.unwrap_err();

        let wrapped = anyhow::Error::from(err).context("while listing artworks");
        assert!(is_unavailable(&wrapped));

        let plain = anyhow::anyhow!("some other failure");
        assert!(!is_unavailable(&plain));
    }

    #[tokio::test]
    async fn test_close_returns_to_disconnected() {
        let gateway = memory_gateway();
        gateway.acquire().await.expect("acquire");
        gateway.close().await;

        // A fresh attempt is issued after close.
        gateway.acquire().await.expect("reacquire");
        assert_eq!(gateway.connect_attempts(), 2);
    }
}
