//! In-memory backend for tests and dry runs.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{batch_dims, VectorStore};
use crate::collection::CollectionName;
use crate::models::EmbeddedChunk;

/// In-process store. Records are appended per collection and never persisted.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<EmbeddedChunk>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written to `collection`, in write order.
    pub fn records(&self, collection: &str) -> Vec<EmbeddedChunk> {
        self.collections
            .read()
            .map(|c| c.get(collection).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .collections
            .read()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn upsert(&self, collection: &CollectionName, records: &[EmbeddedChunk]) -> Result<usize> {
        batch_dims(records)?;
        let mut collections = self
            .collections
            .write()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        collections
            .entry(collection.to_string())
            .or_default()
            .extend_from_slice(records);
        Ok(records.len())
    }

    async fn count(&self, collection: &CollectionName) -> Result<Option<u64>> {
        Ok(Some(self.records(collection.as_str()).len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::record;
    use super::*;
    use crate::collection::collection_name;

    #[tokio::test]
    async fn test_appends_per_collection() {
        let store = MemoryStore::new();
        let a = collection_name("alpha");
        let b = collection_name("beta");

        store.upsert(&a, &[record("1", "x", vec![1.0])]).await.unwrap();
        store.upsert(&a, &[record("2", "y", vec![2.0])]).await.unwrap();
        store.upsert(&b, &[record("3", "z", vec![3.0])]).await.unwrap();

        let ids: Vec<String> = store
            .records("rag_alpha")
            .into_iter()
            .map(|r| r.chunk.id)
            .collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(store.collection_names(), vec!["rag_alpha", "rag_beta"]);
        assert_eq!(store.count(&b).await.unwrap(), Some(1));
    }
}
