//! Postgres pool for the engine binary
//!
//! The pool is proven with a round trip before the embedded schema is
//! applied. The same round trip gates every stale-order sweep.

use sqlx::{Pool, Postgres};
use std::time::Duration;
use crate::config::settings::DatabaseSettings;
use crate::utils::errors::FelicityError;

pub type DatabasePool = Pool<Postgres>;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/felicity".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
        }
    }
}

impl From<&DatabaseSettings> for DatabaseConfig {
    fn from(settings: &DatabaseSettings) -> Self {
        Self {
            url: settings.url.clone(),
            max_connections: settings.max_connections,
            min_connections: settings.min_connections,
            acquire_timeout: Duration::from_secs(settings.acquire_timeout_seconds),
            ..Self::default()
        }
    }
}

/// Connect a pool sized from `[database]` settings
pub async fn create_pool(config: &DatabaseConfig) -> Result<DatabasePool, FelicityError> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .connect(&config.url)
        .await?;

    health_check(&pool).await?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Connected to Postgres"
    );
    Ok(pool)
}

/// Apply pending schema migrations from `migrations/`
pub async fn run_migrations(pool: &DatabasePool) -> Result<(), FelicityError> {
    let migrator = sqlx::migrate!("./migrations");
    tracing::debug!(known = migrator.iter().count(), "Applying schema migrations");
    migrator.run(pool).await?;

    tracing::info!("Schema is up to date");
    Ok(())
}

/// One round trip; the sweeper skips its tick when this fails
pub async fn health_check(pool: &DatabasePool) -> Result<(), FelicityError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await?;

    Ok(())
}
