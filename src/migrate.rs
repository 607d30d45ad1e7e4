//! Schema for the `sqlite` store backend.
//!
//! `docvec init` runs [`run_migrations`]; [`SqliteStore`](crate::store::SqliteStore)
//! applies the same schema when it opens, so `init` is optional.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::StoreConfig;
use crate::db;

/// Create the SQLite schema used by the `sqlite` store backend.
pub async fn run_migrations(config: &StoreConfig) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Idempotent; safe to run on every connect.
pub(crate) async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            dims INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            collection TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            content TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            hash TEXT NOT NULL,
            embedding BLOB NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (collection) REFERENCES collections(name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_collection ON chunks(collection)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_hash ON chunks(hash)")
        .execute(pool)
        .await?;

    Ok(())
}
