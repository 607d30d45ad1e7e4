//! Text extraction for uploaded files.
//!
//! The pipeline hands each supported file to a [`DocumentLoader`] as a path
//! on disk plus its [`FileType`], and gets back one [`RawDocument`] per
//! logical unit:
//!
//! | Format | Units | Extractor metadata |
//! |--------|-------|--------------------|
//! | PDF | one per page | `source`, `page` (0-based), `total_pages` |
//! | Plain text / Markdown | whole file | `source` |
//! | JSON | one per top-level array element, else whole file | `source`, `seq_num` (1-based, arrays only) |
//!
//! Failures are returned as [`LoadError`]s and never panic; whether a
//! failure aborts the run is decided by the pipeline.

use std::path::Path;

use async_trait::async_trait;

use crate::error::LoadError;
use crate::models::{FileType, Metadata, MetadataValue, RawDocument};

pub const KEY_SOURCE: &str = "source";
pub const KEY_PAGE: &str = "page";
pub const KEY_TOTAL_PAGES: &str = "total_pages";
pub const KEY_SEQ_NUM: &str = "seq_num";

/// Default maximum file size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Turns a file on disk into raw documents.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self, path: &Path, file_type: FileType) -> Result<Vec<RawDocument>, LoadError>;
}

/// The built-in loader for the four supported formats.
pub struct FileLoader {
    pub max_file_size: u64,
}

impl Default for FileLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl FileLoader {
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }
}

#[async_trait]
impl DocumentLoader for FileLoader {
    async fn load(&self, path: &Path, file_type: FileType) -> Result<Vec<RawDocument>, LoadError> {
        let meta = tokio::fs::metadata(path).await?;
        if meta.len() > self.max_file_size {
            return Err(LoadError::TooLarge {
                size: meta.len(),
                limit: self.max_file_size,
            });
        }

        let source = path.display().to_string();
        let bytes = tokio::fs::read(path).await?;

        match file_type {
            FileType::Pdf => {
                tokio::task::spawn_blocking(move || extract_pdf(&bytes, &source))
                    .await
                    .map_err(|e| LoadError::Io(std::io::Error::other(e)))?
            }
            FileType::PlainText | FileType::Markdown => extract_text(bytes, &source),
            FileType::Json => extract_json(&bytes, &source),
        }
    }
}

fn source_metadata(source: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(KEY_SOURCE.to_string(), MetadataValue::from(source));
    metadata
}

fn extract_text(bytes: Vec<u8>, source: &str) -> Result<Vec<RawDocument>, LoadError> {
    let text = String::from_utf8(bytes)
        .map_err(|e| LoadError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    Ok(vec![RawDocument {
        text,
        source_metadata: source_metadata(source),
    }])
}

/// One document per page via lopdf. A page whose content lopdf cannot
/// decode fails the whole file. If every page decodes but none yields
/// text, the file is re-read with pdf-extract, which handles more font
/// encodings, as a single page-0 document.
fn extract_pdf(bytes: &[u8], source: &str) -> Result<Vec<RawDocument>, LoadError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| LoadError::Pdf(e.to_string()))?;
    let pages = doc.get_pages();
    let total_pages = pages.len() as i64;

    let mut docs = Vec::with_capacity(pages.len());
    for (idx, page_number) in pages.keys().enumerate() {
        let text = doc.extract_text(&[*page_number]).map_err(|e| {
            tracing::warn!(source, page = *page_number, error = %e, "pdf page extraction failed");
            LoadError::Pdf(format!("page {}: {}", page_number, e))
        })?;
        let mut metadata = source_metadata(source);
        metadata.insert(KEY_PAGE.to_string(), MetadataValue::Integer(idx as i64));
        metadata.insert(KEY_TOTAL_PAGES.to_string(), MetadataValue::Integer(total_pages));
        docs.push(RawDocument {
            text,
            source_metadata: metadata,
        });
    }

    if docs.iter().all(|d| d.text.trim().is_empty()) {
        let text =
            pdf_extract::extract_text_from_mem(bytes).map_err(|e| LoadError::Pdf(e.to_string()))?;
        let mut metadata = source_metadata(source);
        metadata.insert(KEY_PAGE.to_string(), MetadataValue::Integer(0));
        metadata.insert(KEY_TOTAL_PAGES.to_string(), MetadataValue::Integer(total_pages));
        return Ok(vec![RawDocument {
            text,
            source_metadata: metadata,
        }]);
    }

    Ok(docs)
}

fn extract_json(bytes: &[u8], source: &str) -> Result<Vec<RawDocument>, LoadError> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;

    match value {
        serde_json::Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let mut metadata = source_metadata(source);
                metadata.insert(KEY_SEQ_NUM.to_string(), MetadataValue::Integer(i as i64 + 1));
                Ok(RawDocument {
                    text: json_text(item)?,
                    source_metadata: metadata,
                })
            })
            .collect(),
        other => Ok(vec![RawDocument {
            text: json_text(&other)?,
            source_metadata: source_metadata(source),
        }]),
    }
}

fn json_text(value: &serde_json::Value) -> Result<String, LoadError> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Null => Ok(String::new()),
        other => Ok(serde_json::to_string_pretty(other)?),
    }
}
