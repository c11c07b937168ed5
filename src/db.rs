use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use gemstore_core::store::memory::InMemoryStore;
use gemstore_core::store::DocumentStore;

use crate::config::{Backend, Config};
use crate::migrate;
use crate::sqlite_store::SqliteStore;

pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Opens the configured document store. The SQLite schema is applied on
/// open, so `serve` works against a fresh database file.
pub async fn open_store(config: &Config) -> Result<Arc<dyn DocumentStore>> {
    match config.db.backend {
        Backend::Memory => {
            tracing::warn!("using in-memory document store; data is lost on exit");
            Ok(Arc::new(InMemoryStore::new()))
        }
        Backend::Sqlite => {
            let pool = connect(config).await?;
            migrate::apply(&pool).await?;
            tracing::info!(path = %config.db.path.display(), "opened sqlite document store");
            Ok(Arc::new(SqliteStore::new(pool)))
        }
    }
}
