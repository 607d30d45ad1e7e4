//! Vector store abstraction and backends.
//!
//! The pipeline hands every run's embedded chunks to one
//! [`VectorStore::upsert`] call. Backends:
//!
//! | Config Value | Backend |
//! |-------------|---------|
//! | `"astra"` | [`AstraStore`]: Astra DB Data API over HTTP |
//! | `"sqlite"` | [`SqliteStore`]: local file via sqlx |
//! | (library only) | [`MemoryStore`]: in-process map |
//!
//! Collections are created on first write. Re-ingesting the same content
//! adds new records (chunk ids are fresh UUIDs); nothing is deduplicated.

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::collection::CollectionName;
use crate::config::StoreConfig;
use crate::models::EmbeddedChunk;

mod astra;
mod memory;
mod sqlite;

pub use astra::AstraStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Persists embedded chunks into named collections.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend identifier (e.g. `"astra"`).
    fn backend(&self) -> &str;

    /// Write `records` into `collection`, creating it if needed.
    /// Returns the number of records written.
    async fn upsert(&self, collection: &CollectionName, records: &[EmbeddedChunk])
        -> Result<usize>;

    /// Number of records currently in `collection`, if the backend can tell.
    async fn count(&self, _collection: &CollectionName) -> Result<Option<u64>> {
        Ok(None)
    }
}

/// Build the store named by `config.backend`.
///
/// Credentials and connectivity problems surface here, at startup, before
/// any file is processed.
pub async fn create_store(config: &StoreConfig) -> Result<Box<dyn VectorStore>> {
    match config.backend.as_str() {
        "astra" => Ok(Box::new(AstraStore::from_config(config)?)),
        "sqlite" => Ok(Box::new(SqliteStore::open(config).await?)),
        other => bail!("Unknown store backend: {}", other),
    }
}

/// Vector dimensionality of a batch; all records must agree.
pub(crate) fn batch_dims(records: &[EmbeddedChunk]) -> Result<usize> {
    let dims = records.first().map(|r| r.vector.len()).unwrap_or(0);
    if let Some(bad) = records.iter().find(|r| r.vector.len() != dims) {
        bail!(
            "inconsistent vector dimensions: expected {}, chunk {} has {}",
            dims,
            bad.chunk.id,
            bad.vector.len()
        );
    }
    Ok(dims)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::models::{Chunk, EmbeddedChunk, Metadata, MetadataValue};

    pub fn record(id: &str, text: &str, vector: Vec<f32>) -> EmbeddedChunk {
        let mut metadata = Metadata::new();
        metadata.insert("filename".to_string(), MetadataValue::from("a.txt"));
        EmbeddedChunk {
            chunk: Chunk {
                id: id.to_string(),
                chunk_index: 0,
                text: text.to_string(),
                metadata,
                hash: format!("hash-{}", id),
            },
            vector,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::record;
    use super::*;

    #[test]
    fn test_batch_dims_consistent() {
        let records = vec![record("a", "x", vec![0.0; 3]), record("b", "y", vec![1.0; 3])];
        assert_eq!(batch_dims(&records).unwrap(), 3);
    }

    #[test]
    fn test_batch_dims_mismatch() {
        let records = vec![record("a", "x", vec![0.0; 3]), record("b", "y", vec![1.0; 2])];
        let err = batch_dims(&records).unwrap_err();
        assert!(err.to_string().contains("chunk b"));
    }

    #[tokio::test]
    async fn test_create_store_astra_requires_credentials() {
        let config = StoreConfig {
            api_endpoint: None,
            token: None,
            ..StoreConfig::default()
        };
        // Only meaningful when the environment does not provide them.
        if std::env::var("ASTRA_DB_API_ENDPOINT").is_err() {
            assert!(create_store(&config).await.is_err());
        }
    }
}
