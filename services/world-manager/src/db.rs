//! Postgres pool shared by the registry and the configuration store.
//!
//! The schema (`world_sessions`, `world_configs`) is kept as SQL files under
//! `migrations/` and applied when the pool is opened.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::migrate::{MigrateError, Migrator};
use sqlx::postgres::{PgPool, PgPoolOptions};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("failed to load migrations from {dir}: {source}")]
    LoadMigrations {
        dir: String,
        #[source]
        source: MigrateError,
    },

    #[error("migration failed: {0}")]
    Migrate(#[source] MigrateError),
}

/// Pool settings. Read from the environment by [`crate::config::Config`].
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub migrations_dir: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/worldfleet".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            migrations_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations"),
        }
    }
}

/// Open the pool and bring the world tables up to date.
pub async fn connect(config: &DbConfig) -> Result<PgPool, DbError> {
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Connecting to database"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.database_url)
        .await
        .map_err(DbError::Connect)?;

    let migrator = load_migrations(&config.migrations_dir).await?;
    migrator.run(&pool).await.map_err(DbError::Migrate)?;
    info!("World tables up to date");

    Ok(pool)
}

async fn load_migrations(dir: &Path) -> Result<Migrator, DbError> {
    let migrator = Migrator::new(dir.to_path_buf())
        .await
        .map_err(|source| DbError::LoadMigrations {
            dir: dir.display().to_string(),
            source,
        })?;

    info!(
        migrations_dir = %dir.display(),
        migrations = migrator.iter().count(),
        "Loaded migrations"
    );
    Ok(migrator)
}
