//! Database layer
//!
//! Persistence for the Atelier server, built on SQLite via sqlx. All access
//! goes through the [`gateway::Gateway`]: repositories acquire the shared
//! pool per operation, so a store that is down at startup (or that drops
//! away later) degrades service instead of taking the process with it.

pub mod gateway;
pub mod migrations;
pub mod repositories;

pub use gateway::{is_unavailable, DynGateway, Gateway, GatewayError};

/// Create an in-memory gateway for tests
#[cfg(test)]
pub fn test_gateway() -> DynGateway {
    Gateway::shared(crate::config::DatabaseConfig::in_memory())
}

/// Create a migrated in-memory pool for tests
#[cfg(test)]
pub async fn test_pool() -> sqlx::SqlitePool {
    let gateway = test_gateway();
    gateway.acquire().await.expect("in-memory store")
}

/// Create a migrated in-memory gateway for tests
#[cfg(test)]
pub async fn migrated_test_gateway() -> DynGateway {
    let gateway = test_gateway();
    let pool = gateway.acquire().await.expect("in-memory store");
    migrations::run_migrations(&pool)
        .await
        .expect("migrations");
    gateway
}
