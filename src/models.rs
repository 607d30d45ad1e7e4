//! Core data models used throughout docvec.
//!
//! These types represent the uploads, documents, and chunks that flow
//! through the ingestion pipeline, in the order they appear:
//! [`UploadedFile`] → [`RawDocument`] → [`EnrichedDocument`] → [`Chunk`] →
//! [`EmbeddedChunk`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";
pub const MIME_JSON: &str = "application/json";
/// Assigned by the CLI to files whose extension maps to no supported type.
pub const MIME_UNKNOWN: &str = "application/octet-stream";

/// A single metadata value attached to a document or chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    Integer(i64),
    #[serde(serialize_with = "serialize_timestamp")]
    Timestamp(DateTime<Utc>),
}

/// RFC 3339 in UTC with a `Z` suffix, e.g. `2024-05-01T12:00:00Z`. Shared
/// by `Display` and serialization so both spell a timestamp the same way.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(ts))
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Text(s) => f.write_str(s),
            MetadataValue::Integer(i) => write!(f, "{}", i),
            MetadataValue::Timestamp(ts) => f.write_str(&format_timestamp(ts)),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::Text(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::Text(s)
    }
}

impl From<i64> for MetadataValue {
    fn from(i: i64) -> Self {
        MetadataValue::Integer(i)
    }
}

impl From<DateTime<Utc>> for MetadataValue {
    fn from(ts: DateTime<Utc>) -> Self {
        MetadataValue::Timestamp(ts)
    }
}

/// Ordered metadata map. Ordering keeps serialized payloads stable.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// The closed set of formats the loader can extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Pdf,
    PlainText,
    Markdown,
    Json,
}

impl FileType {
    /// Map a MIME type string to a supported format.
    ///
    /// Parameters such as `; charset=utf-8` are ignored. Returns `None` for
    /// anything outside the four supported types.
    pub fn from_mime(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            MIME_PDF => Some(FileType::Pdf),
            MIME_TEXT => Some(FileType::PlainText),
            MIME_MARKDOWN => Some(FileType::Markdown),
            MIME_JSON => Some(FileType::Json),
            _ => None,
        }
    }

    /// Map a file extension (without the dot) to a supported format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(FileType::Pdf),
            "txt" | "text" => Some(FileType::PlainText),
            "md" | "markdown" => Some(FileType::Markdown),
            "json" => Some(FileType::Json),
            _ => None,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            FileType::Pdf => MIME_PDF,
            FileType::PlainText => MIME_TEXT,
            FileType::Markdown => MIME_MARKDOWN,
            FileType::Json => MIME_JSON,
        }
    }
}

/// A file handed to the pipeline: name, declared MIME type, and content.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

/// One logically distinct unit extracted from a file (a PDF page, a whole
/// text file, a JSON record).
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub text: String,
    pub source_metadata: Metadata,
}

/// A [`RawDocument`] with upload provenance merged into its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedDocument {
    pub text: String,
    pub metadata: Metadata,
}

/// A bounded slice of an [`EnrichedDocument`]'s text.
///
/// `metadata` is an exact copy of the parent document's metadata; the
/// positional and identity fields live beside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub chunk_index: i64,
    pub text: String,
    pub metadata: Metadata,
    pub hash: String,
}

/// A chunk paired with its embedding vector, ready for storage.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}
