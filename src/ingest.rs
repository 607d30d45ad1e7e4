//! Ingestion pipeline orchestration.
//!
//! Coordinates one run: uploaded files → loading and enrichment → splitting →
//! embedding → storage, all into the collection derived from the run's
//! use-case label. Files are processed one at a time, in order.
//!
//! Per-file problems (unsupported type, and load failures when
//! `isolate_load_failures` is on) become [`IngestWarning`]s and the run
//! continues. Anything else ends the run with an [`IngestError`] naming the
//! stage; nothing is stored unless embedding succeeded for every chunk.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::Path;

use crate::chunk::RecursiveSplitter;
use crate::collection::{collection_name, CollectionName};
use crate::config::Config;
use crate::embedding::Embedder;
use crate::enrich::enrich;
use crate::error::{IngestError, LoadError, Stage};
use crate::extract::DocumentLoader;
use crate::models::{Chunk, EmbeddedChunk, EnrichedDocument, FileType, UploadedFile};
use crate::store::VectorStore;

/// Source of upload timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A file that was skipped without ending the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IngestWarning {
    UnsupportedType {
        filename: String,
        content_type: String,
    },
    LoadFailed {
        filename: String,
        reason: String,
    },
}

impl IngestWarning {
    pub fn filename(&self) -> &str {
        match self {
            IngestWarning::UnsupportedType { filename, .. } => filename,
            IngestWarning::LoadFailed { filename, .. } => filename,
        }
    }
}

impl fmt::Display for IngestWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestWarning::UnsupportedType { content_type, .. } => {
                write!(f, "Unsupported file type: {}", content_type)
            }
            IngestWarning::LoadFailed { filename, reason } => {
                write!(f, "Failed to load {}: {}", filename, reason)
            }
        }
    }
}

/// How a run ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// No files were given; nothing was attempted.
    AwaitingInput,
    /// Files were given but produced no text to store.
    NoDocuments { warnings: Vec<IngestWarning> },
    Stored {
        collection: CollectionName,
        documents: usize,
        chunks_stored: usize,
        warnings: Vec<IngestWarning>,
    },
}

impl IngestOutcome {
    pub fn warnings(&self) -> &[IngestWarning] {
        match self {
            IngestOutcome::AwaitingInput => &[],
            IngestOutcome::NoDocuments { warnings } => warnings,
            IngestOutcome::Stored { warnings, .. } => warnings,
        }
    }
}

impl fmt::Display for IngestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestOutcome::AwaitingInput => f.write_str("Please upload documents to proceed"),
            IngestOutcome::NoDocuments { .. } => f.write_str("No documents were processed"),
            IngestOutcome::Stored { collection, .. } => write!(
                f,
                "Documents successfully vectorized and stored in collection {}",
                collection
            ),
        }
    }
}

/// Result of the loading and splitting stages alone.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub collection: CollectionName,
    pub documents: usize,
    pub chunks: Vec<Chunk>,
    pub warnings: Vec<IngestWarning>,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Record per-file load failures as warnings instead of aborting.
    pub isolate_load_failures: bool,
    /// Chunks per embedder call.
    pub batch_size: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            isolate_load_failures: true,
            batch_size: 64,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            isolate_load_failures: config.ingest.isolate_load_failures,
            batch_size: config.embedding.batch_size.max(1),
        }
    }
}

pub struct IngestionPipeline<'a> {
    splitter: RecursiveSplitter,
    loader: &'a dyn DocumentLoader,
    embedder: &'a dyn Embedder,
    store: &'a dyn VectorStore,
    options: PipelineOptions,
}

impl<'a> IngestionPipeline<'a> {
    pub fn new(
        splitter: RecursiveSplitter,
        loader: &'a dyn DocumentLoader,
        embedder: &'a dyn Embedder,
        store: &'a dyn VectorStore,
        options: PipelineOptions,
    ) -> Self {
        Self {
            splitter,
            loader,
            embedder,
            store,
            options,
        }
    }

    /// Run the whole pipeline for one batch of uploads.
    ///
    /// `use_case` is taken as given; blank labels should be resolved by the
    /// caller (see [`crate::collection::resolve_use_case`]).
    pub async fn ingest(
        &self,
        files: &[UploadedFile],
        use_case: &str,
        clock: &dyn Clock,
    ) -> Result<IngestOutcome, IngestError> {
        if files.is_empty() {
            tracing::info!(stage = %Stage::NoFiles, "no files given");
            return Ok(IngestOutcome::AwaitingInput);
        }

        let prepared = self.prepare(files, use_case, clock).await?;
        if prepared.chunks.is_empty() {
            tracing::info!(stage = %Stage::Done, "no documents were processed");
            return Ok(IngestOutcome::NoDocuments {
                warnings: prepared.warnings,
            });
        }

        let records = self.embed(prepared.chunks).await?;

        tracing::info!(
            stage = %Stage::Storing,
            collection = %prepared.collection,
            backend = self.store.backend(),
            records = records.len(),
            "storing"
        );
        let chunks_stored = self
            .store
            .upsert(&prepared.collection, &records)
            .await
            .map_err(|e| IngestError::Storage(format!("{:#}", e)))?;

        tracing::info!(
            stage = %Stage::Done,
            collection = %prepared.collection,
            documents = prepared.documents,
            chunks = chunks_stored,
            "ingest complete"
        );

        Ok(IngestOutcome::Stored {
            collection: prepared.collection,
            documents: prepared.documents,
            chunks_stored,
            warnings: prepared.warnings,
        })
    }

    /// Load, enrich and split without embedding or storing anything.
    pub async fn prepare(
        &self,
        files: &[UploadedFile],
        use_case: &str,
        clock: &dyn Clock,
    ) -> Result<Prepared, IngestError> {
        let collection = collection_name(use_case);
        let (documents, warnings) = self.load_all(files, clock).await?;

        tracing::info!(
            stage = %Stage::Splitting,
            documents = documents.len(),
            chunk_size = self.splitter.chunk_size(),
            chunk_overlap = self.splitter.chunk_overlap(),
            "splitting"
        );
        let chunks = self.splitter.split_documents(&documents);

        Ok(Prepared {
            collection,
            documents: documents.len(),
            chunks,
            warnings,
        })
    }

    async fn load_all(
        &self,
        files: &[UploadedFile],
        clock: &dyn Clock,
    ) -> Result<(Vec<EnrichedDocument>, Vec<IngestWarning>), IngestError> {
        let mut documents = Vec::new();
        let mut warnings = Vec::new();

        for file in files {
            let Some(file_type) = FileType::from_mime(&file.content_type) else {
                tracing::warn!(
                    stage = %Stage::Loading,
                    filename = %file.name,
                    content_type = %file.content_type,
                    "unsupported file type, skipping"
                );
                warnings.push(IngestWarning::UnsupportedType {
                    filename: file.name.clone(),
                    content_type: file.content_type.clone(),
                });
                continue;
            };

            match self.load_file(file, file_type).await {
                Ok(raw) => {
                    let uploaded_at = clock.now();
                    tracing::info!(
                        stage = %Stage::Loading,
                        filename = %file.name,
                        documents = raw.len(),
                        "loaded file"
                    );
                    documents.extend(
                        raw.into_iter()
                            .map(|doc| enrich(doc, &file.name, &file.content_type, uploaded_at)),
                    );
                }
                Err(source) if self.options.isolate_load_failures => {
                    tracing::warn!(
                        stage = %Stage::Loading,
                        filename = %file.name,
                        error = %source,
                        "failed to load file, skipping"
                    );
                    warnings.push(IngestWarning::LoadFailed {
                        filename: file.name.clone(),
                        reason: source.to_string(),
                    });
                }
                Err(source) => {
                    return Err(IngestError::Load {
                        filename: file.name.clone(),
                        source,
                    });
                }
            }
        }

        Ok((documents, warnings))
    }

    /// Stage the upload in a scoped temp file and hand it to the loader.
    /// The temp file is removed when this returns, on every path.
    async fn load_file(
        &self,
        file: &UploadedFile,
        file_type: FileType,
    ) -> Result<Vec<crate::models::RawDocument>, LoadError> {
        let temp = tempfile::Builder::new()
            .prefix("docvec-")
            .suffix(&temp_suffix(&file.name))
            .tempfile()?;
        tokio::fs::write(temp.path(), &file.bytes).await?;
        self.loader.load(temp.path(), file_type).await
    }

    async fn embed(&self, chunks: Vec<Chunk>) -> Result<Vec<EmbeddedChunk>, IngestError> {
        tracing::info!(
            stage = %Stage::Embedding,
            model = self.embedder.model_name(),
            chunks = chunks.len(),
            "embedding"
        );

        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.options.batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let batch_vectors = self
                .embedder
                .embed(&texts)
                .await
                .map_err(|e| IngestError::Embedding(format!("{:#}", e)))?;
            if batch_vectors.len() != batch.len() {
                return Err(IngestError::Embedding(format!(
                    "expected {} vectors, got {}",
                    batch.len(),
                    batch_vectors.len()
                )));
            }
            vectors.extend(batch_vectors);
        }

        Ok(chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddedChunk { chunk, vector })
            .collect())
    }
}

/// `-<basename>`, so loaders that sniff the extension see the original one.
fn temp_suffix(filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");
    format!("-{}", base)
}
