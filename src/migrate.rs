use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Creates the schema. Every statement is idempotent.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // One row per document; `data` holds the JSON field map.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            data TEXT NOT NULL DEFAULT '{}',
            UNIQUE(collection, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection)")
        .execute(pool)
        .await?;

    // Expression indexes for the lookups every request path performs.
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_created_at \
         ON documents(collection, json_extract(data, '$.createdAt'))",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_name \
         ON documents(collection, json_extract(data, '$.name'))",
    )
    .execute(pool)
    .await?;

    Ok(())
}
