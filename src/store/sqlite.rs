//! Local SQLite backend.
//!
//! One `collections` row per collection (with its vector dimension) and one
//! `chunks` row per record. Vectors are stored as little-endian f32 BLOBs.
//! A whole upsert runs in one transaction.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;

use super::{batch_dims, VectorStore};
use crate::collection::CollectionName;
use crate::config::StoreConfig;
use crate::db;
use crate::embedding::vec_to_blob;
use crate::migrate::apply_schema;
use crate::models::EmbeddedChunk;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open the database at `store.path`, creating the schema if missing.
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let pool = db::connect(config).await?;
        apply_schema(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    fn backend(&self) -> &str {
        "sqlite"
    }

    async fn upsert(&self, collection: &CollectionName, records: &[EmbeddedChunk]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let dims = batch_dims(records)?;
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT dims FROM collections WHERE name = ?")
                .bind(collection.as_str())
                .fetch_optional(&mut *tx)
                .await?;
        match existing {
            Some(d) if d as usize != dims => bail!(
                "collection {} stores {}-dimensional vectors, got {}",
                collection,
                d,
                dims
            ),
            Some(_) => {}
            None => {
                sqlx::query("INSERT INTO collections (name, dims, created_at) VALUES (?, ?, ?)")
                    .bind(collection.as_str())
                    .bind(dims as i64)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        for record in records {
            let metadata_json = serde_json::to_string(&record.chunk.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO chunks (id, collection, chunk_index, content, metadata_json, hash, embedding, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    collection = excluded.collection,
                    chunk_index = excluded.chunk_index,
                    content = excluded.content,
                    metadata_json = excluded.metadata_json,
                    hash = excluded.hash,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&record.chunk.id)
            .bind(collection.as_str())
            .bind(record.chunk.chunk_index)
            .bind(&record.chunk.text)
            .bind(&metadata_json)
            .bind(&record.chunk.hash)
            .bind(vec_to_blob(&record.vector))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(records.len())
    }

    async fn count(&self, collection: &CollectionName) -> Result<Option<u64>> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE collection = ?")
            .bind(collection.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(Some(count as u64))
    }
}
