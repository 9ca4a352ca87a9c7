pub mod admins;
pub mod comments;
pub mod models;
pub mod posts;
pub mod subscribers;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::{str::FromStr, time::Duration};

use crate::config::AppConfig;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique column already holds this value; the string names the field.
    #[error("{0} already exists")]
    Duplicate(String),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Map a unique-constraint violation to [`StoreError::Duplicate`].
pub(crate) fn map_unique(err: sqlx::Error, what: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::Duplicate(what.to_string())
        }
        _ => StoreError::Sqlx(err),
    }
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl DbConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            url: config.database_url.clone(),
            max_connections: config.db_pool_max.max(1),
            acquire_timeout_secs: 3,
        }
    }

    fn is_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

/// Handle to the embedded SQLite database. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open the pool and make sure the schema exists.
    pub async fn connect(config: &DbConfig) -> Result<Self, sqlx::Error> {
        tracing::info!("Initializing database connection pool...");

        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs));

        // An in-memory database lives only as long as its connection.
        pool_options = if config.is_memory() {
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options
                .max_connections(config.max_connections)
                .idle_timeout(Duration::from_secs(300))
                .max_lifetime(Duration::from_secs(1800))
        };

        let pool = pool_options.connect_with(options).await?;
        sqlx::query("SELECT 1").fetch_one(&pool).await?;

        let store = Self { pool };
        store.run_migrations().await?;

        tracing::info!("Database connection pool initialized successfully");
        Ok(store)
    }

    /// Fresh in-memory store, used by tests.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        Self::connect(&DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            acquire_timeout_secs: 3,
        })
        .await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<Duration, sqlx::Error> {
        let start = std::time::Instant::now();
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(start.elapsed())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Database connection pool closed");
    }

    async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        tracing::info!("Running database migrations...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS admins (
                id BLOB PRIMARY KEY NOT NULL,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id BLOB PRIMARY KEY NOT NULL,
                title TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                body TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id BLOB PRIMARY KEY NOT NULL,
                post_id BLOB NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                author_name TEXT NOT NULL,
                body TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_post_id ON comments(post_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscribers (
                id BLOB PRIMARY KEY NOT NULL,
                email TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Database migrations completed successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_config_from_app_keeps_pool_size_positive() {
        let mut app = AppConfig::for_tests();
        app.db_pool_max = 0;
        let config = DbConfig::from_app(&app);
        assert_eq!(config.max_connections, 1);
        assert!(config.is_memory());
    }

    #[tokio::test]
    async fn test_in_memory_store_is_healthy() {
        let store = Store::in_memory().await.unwrap();
        assert!(store.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let store = Store::in_memory().await.unwrap();
        assert!(store.run_migrations().await.is_ok());
    }

    #[tokio::test]
    async fn test_health_check_fails_after_close() {
        let store = Store::in_memory().await.unwrap();
        store.close().await;
        assert!(store.health_check().await.is_err());
    }
}
