//! Database access: connection pool, migrations and shared query helpers.
//!
//! Repositories live next to their domain modules; this module holds what
//! they share. Every deletable table carries a nullable `deleted_at` column
//! and live reads filter on [`LIVE`].

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

pub mod config;
pub mod locking;
pub mod pagination;
pub mod soft_delete;
pub mod timeouts;

pub use config::DatabaseConfig;
pub use locking::{VersionOutcome, classify_update};
pub use pagination::{MAX_PER_PAGE, Page, PageRequest};
pub use soft_delete::{LIVE, SoftDeletable};

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect a new pool
    ///
    /// ```no_run
    /// use kart_league::db::{Database, DatabaseConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), sqlx::Error> {
    ///     let db = Database::new(&DatabaseConfig::from_env()).await?;
    ///     db.migrate().await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = Self::options(config).connect(&config.database_url).await?;
        Ok(Self { pool })
    }

    /// Create a pool that connects on first use
    pub fn new_lazy(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = Self::options(config).connect_lazy(&config.database_url)?;
        Ok(Self { pool })
    }

    fn options(config: &DatabaseConfig) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
    }

    /// Apply pending migrations
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check that the database answers within the query timeout
    pub async fn health_check(&self) -> timeouts::TimeoutResult<()> {
        timeouts::with_default_timeout(sqlx::query("SELECT 1").execute(&self.pool)).await?;
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "Requires database setup"]
    async fn test_database_connection() {
        let db = Database::new(&DatabaseConfig::from_env())
            .await
            .expect("Failed to connect to database");
        db.migrate().await.expect("Migrations failed");
        db.health_check().await.expect("Health check failed");
        db.close().await;
    }

    #[tokio::test]
    async fn test_lazy_pool_does_not_connect() {
        let config = DatabaseConfig {
            database_url: "postgres://nobody@127.0.0.1:1/none".to_string(),
            ..DatabaseConfig::development()
        };
        let db = Database::new_lazy(&config).unwrap();
        assert_eq!(db.pool().size(), 0);
    }
}
