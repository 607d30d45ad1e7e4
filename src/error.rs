//! Error taxonomy for the ingestion pipeline.
//!
//! Fatal conditions are [`IngestError`] variants, each tied to the pipeline
//! [`Stage`] it originated in. Per-file problems that do not stop a run are
//! reported as [`IngestWarning`](crate::ingest::IngestWarning)s instead.

use std::fmt;

/// Pipeline stage, used for progress logging and to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Startup,
    NoFiles,
    Loading,
    Splitting,
    Embedding,
    Storing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Startup => "startup",
            Stage::NoFiles => "no_files",
            Stage::Loading => "loading",
            Stage::Splitting => "splitting",
            Stage::Embedding => "embedding",
            Stage::Storing => "storing",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Invalid or missing settings. Raised before any file is touched.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0}")]
    Invalid(String),

    #[error("missing setting: {0}")]
    Missing(String),
}

/// Extraction failure for a single file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("file too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },
}

/// A fatal pipeline failure.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to load {filename}: {source}")]
    Load {
        filename: String,
        #[source]
        source: LoadError,
    },

    #[error("Failed to compute embeddings: {0}")]
    Embedding(String),

    #[error("Failed to store documents: {0}")]
    Storage(String),
}

impl IngestError {
    /// Wrap a failure to build a run's collaborators (splitter, embedder,
    /// store). A [`ConfigError`] anywhere in the chain is kept as is.
    pub fn startup(err: anyhow::Error) -> Self {
        match err.downcast::<ConfigError>() {
            Ok(config) => IngestError::Config(config),
            Err(other) => IngestError::Config(ConfigError::Invalid(format!("{:#}", other))),
        }
    }

    /// The stage the run was in when it failed.
    pub fn stage(&self) -> Stage {
        match self {
            IngestError::Config(_) => Stage::Startup,
            IngestError::Load { .. } => Stage::Loading,
            IngestError::Embedding(_) => Stage::Embedding,
            IngestError::Storage(_) => Stage::Storing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_follows_variant() {
        let err = IngestError::Storage("connection refused".into());
        assert_eq!(err.stage(), Stage::Storing);
        assert_eq!(err.stage().to_string(), "storing");

        let err = IngestError::Load {
            filename: "a.pdf".into(),
            source: LoadError::Pdf("bad xref".into()),
        };
        assert_eq!(err.stage(), Stage::Loading);
        assert_eq!(
            err.to_string(),
            "Failed to load a.pdf: PDF extraction failed: bad xref"
        );
    }

    #[test]
    fn startup_keeps_config_errors() {
        let err = IngestError::startup(anyhow::Error::new(ConfigError::Missing(
            "ASTRA_DB_APPLICATION_TOKEN".into(),
        )));
        assert!(matches!(err, IngestError::Config(ConfigError::Missing(_))));
        assert_eq!(err.stage(), Stage::Startup);
        assert_eq!(
            err.to_string(),
            "configuration error: missing setting: ASTRA_DB_APPLICATION_TOKEN"
        );
    }

    #[test]
    fn startup_wraps_other_failures() {
        let err = IngestError::startup(
            anyhow::anyhow!("connection refused").context("Failed to open database"),
        );
        assert!(matches!(err, IngestError::Config(ConfigError::Invalid(_))));
        assert_eq!(err.stage().to_string(), "startup");
        assert!(err.to_string().contains("connection refused"));
    }
}
