//! Astra DB Data API backend.
//!
//! Talks JSON over HTTPS to `{endpoint}/api/json/v1/{keyspace}`, with the
//! application token in the `Token` header. Each upsert first issues an
//! idempotent `createCollection` carrying the vector dimension, then writes
//! the records with `insertMany` in pages of [`INSERT_PAGE_SIZE`].

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use super::{batch_dims, VectorStore};
use crate::collection::CollectionName;
use crate::config::StoreConfig;
use crate::error::ConfigError;
use crate::models::EmbeddedChunk;

pub const ENV_ENDPOINT: &str = "ASTRA_DB_API_ENDPOINT";
pub const ENV_TOKEN: &str = "ASTRA_DB_APPLICATION_TOKEN";
pub const ENV_NAMESPACE: &str = "ASTRA_DB_NAMESPACE";
pub const DEFAULT_KEYSPACE: &str = "default_keyspace";

/// Data API limit on documents per `insertMany`.
pub const INSERT_PAGE_SIZE: usize = 20;
/// Data API limit on collection name length.
pub const MAX_COLLECTION_NAME_LEN: usize = 48;

pub struct AstraStore {
    endpoint: String,
    token: String,
    keyspace: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for AstraStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AstraStore")
            .field("endpoint", &self.endpoint)
            .field("keyspace", &self.keyspace)
            .finish_non_exhaustive()
    }
}

impl AstraStore {
    /// Build from config, falling back to the `ASTRA_DB_*` environment.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Self::from_config_with_env(config, |key| std::env::var(key).ok())
    }

    /// Build from config with an explicit environment lookup.
    ///
    /// The endpoint and keyspace prefer the config file; the token prefers
    /// the environment so secrets need not live in the file. A missing
    /// endpoint or token is a [`ConfigError::Missing`].
    pub fn from_config_with_env<F>(config: &StoreConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = config
            .api_endpoint
            .clone()
            .or_else(|| env(ENV_ENDPOINT))
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                ConfigError::Missing(format!(
                    "store.api_endpoint or {} (astra backend)",
                    ENV_ENDPOINT
                ))
            })?;
        let token = env(ENV_TOKEN)
            .or_else(|| config.token.clone())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing(format!("{} (astra backend)", ENV_TOKEN)))?;
        let keyspace = config
            .namespace
            .clone()
            .or_else(|| env(ENV_NAMESPACE))
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_KEYSPACE.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
            keyspace,
            client,
        })
    }

    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    fn keyspace_url(&self) -> String {
        format!("{}/api/json/v1/{}", self.endpoint, self.keyspace)
    }

    async fn command(&self, url: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(url)
            .header("Token", &self.token)
            .json(&body)
            .send()
            .await
            .context("Astra DB request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Astra DB API error {}: {}", status, text);
        }

        let json: serde_json::Value = response.json().await?;
        check_errors(&json)?;
        Ok(json)
    }

    async fn create_collection(&self, collection: &CollectionName, dims: usize) -> Result<()> {
        let body = serde_json::json!({
            "createCollection": {
                "name": collection.as_str(),
                "options": {
                    "vector": { "dimension": dims, "metric": "cosine" }
                }
            }
        });
        self.command(&self.keyspace_url(), body)
            .await
            .with_context(|| format!("Failed to create collection {}", collection))?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for AstraStore {
    fn backend(&self) -> &str {
        "astra"
    }

    async fn upsert(&self, collection: &CollectionName, records: &[EmbeddedChunk]) -> Result<usize> {
        validate_collection_name(collection.as_str())?;
        if records.is_empty() {
            return Ok(0);
        }
        let dims = batch_dims(records)?;
        self.create_collection(collection, dims).await?;

        let url = format!("{}/{}", self.keyspace_url(), collection);
        let mut inserted = 0;

        for page in records.chunks(INSERT_PAGE_SIZE) {
            let documents: Vec<serde_json::Value> = page.iter().map(document_payload).collect();
            let body = serde_json::json!({
                "insertMany": {
                    "documents": documents,
                    "options": { "ordered": true }
                }
            });
            let json = self.command(&url, body).await?;
            let count = json
                .pointer("/status/insertedIds")
                .and_then(|ids| ids.as_array())
                .map(|ids| ids.len())
                .unwrap_or(page.len());
            inserted += count;
            tracing::debug!(collection = %collection, inserted, "astra insertMany page");
        }

        Ok(inserted)
    }

    async fn count(&self, collection: &CollectionName) -> Result<Option<u64>> {
        validate_collection_name(collection.as_str())?;
        let url = format!("{}/{}", self.keyspace_url(), collection);
        let body = serde_json::json!({ "countDocuments": {} });
        let json = self.command(&url, body).await?;
        Ok(json.pointer("/status/count").and_then(|c| c.as_u64()))
    }
}

/// Reject names the Data API would refuse, before any request is made.
pub fn validate_collection_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid_start || !valid_rest {
        bail!(
            "invalid collection name '{}': must start with a letter and contain only ASCII letters, digits, and underscores",
            name
        );
    }
    if name.len() > MAX_COLLECTION_NAME_LEN {
        bail!(
            "invalid collection name '{}': longer than {} characters",
            name,
            MAX_COLLECTION_NAME_LEN
        );
    }
    Ok(())
}

fn document_payload(record: &EmbeddedChunk) -> serde_json::Value {
    serde_json::json!({
        "_id": record.chunk.id,
        "content": record.chunk.text,
        "metadata": record.chunk.metadata,
        "$vector": record.vector,
    })
}

/// The Data API reports command failures in an `errors` array, often with
/// HTTP 200.
fn check_errors(json: &serde_json::Value) -> Result<()> {
    let Some(errors) = json.get("errors").and_then(|e| e.as_array()) else {
        return Ok(());
    };
    if errors.is_empty() {
        return Ok(());
    }
    let messages: Vec<String> = errors
        .iter()
        .map(|e| {
            e.get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| e.to_string())
        })
        .collect();
    bail!("Astra DB error: {}", messages.join("; "))
}
