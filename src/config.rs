//! TOML configuration.
//!
//! Loaded once at startup by [`load_config`] and passed by reference to
//! everything that needs it. Every section has defaults, so an empty file
//! (or [`Config::default`]) describes the stock setup: 256/50 chunking,
//! local MiniLM embeddings, and an Astra DB store.
//!
//! Credentials are never read from the file alone: the Astra token and the
//! OpenAI key come from the environment (see [`StoreConfig`] and
//! [`crate::embedding`]).

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::chunk::{RecursiveSplitter, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

/// Vector store settings.
///
/// For the `astra` backend, `api_endpoint`, `token`, and `namespace` fall
/// back to `ASTRA_DB_API_ENDPOINT`, `ASTRA_DB_APPLICATION_TOKEN`, and
/// `ASTRA_DB_NAMESPACE`; the environment wins when both are set for the
/// token.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub api_endpoint: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default = "default_store_timeout_secs")]
    pub timeout_secs: u64,
    /// SQLite database file for the `sqlite` backend.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            api_endpoint: None,
            token: None,
            namespace: None,
            timeout_secs: default_store_timeout_secs(),
            path: default_db_path(),
        }
    }
}

fn default_backend() -> String {
    "astra".to_string()
}
fn default_store_timeout_secs() -> u64 {
    60
}
fn default_db_path() -> PathBuf {
    PathBuf::from("./data/docvec.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Label used when the caller leaves the use case blank.
    #[serde(default = "default_use_case")]
    pub default_use_case: String,
    /// Skip files whose extraction fails instead of aborting the run.
    #[serde(default = "default_isolate")]
    pub isolate_load_failures: bool,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            default_use_case: default_use_case(),
            isolate_load_failures: true,
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_use_case() -> String {
    "default".to_string()
}
fn default_isolate() -> bool {
    true
}
fn default_max_file_size() -> u64 {
    50 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}
fn default_max_upload_bytes() -> usize {
    100 * 1024 * 1024
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    RecursiveSplitter::from_config(&config.chunking)?;

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, local, openai, or ollama.",
            other
        ),
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    // Validate store
    match config.store.backend.as_str() {
        "astra" | "sqlite" => {}
        other => bail!(
            "Unknown store backend: '{}'. Must be astra or sqlite.",
            other
        ),
    }

    if config.ingest.default_use_case.trim().is_empty() {
        bail!("ingest.default_use_case must not be blank");
    }

    Ok(())
}
