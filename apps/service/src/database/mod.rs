//! libsql persistence for monitors, results and the activity log.

pub mod migrations;
pub mod models;
pub mod repository;

pub use repository::{DeletedMonitor, Repository, TupleColumn};

use anyhow::{Context, Result};

use crate::config::DatabaseConfig;
use crate::pool::create_pool;

/// Open (or create) the database file, migrate it and wrap it in a repository
pub async fn open(config: &DatabaseConfig) -> Result<Repository> {
    if let Some(parent) = config.path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let database = libsql::Builder::new_local(&config.path)
        .build()
        .await
        .with_context(|| format!("failed to open database {}", config.path.display()))?;

    let pool = create_pool(database, config.pool_size)?;
    let conn = pool.get().await.map_err(|e| anyhow::anyhow!("failed to get connection: {e}"))?;
    migrations::run_migrations(&conn).await?;

    tracing::info!(path = %config.path.display(), "Database ready");
    Ok(Repository::new(pool))
}
