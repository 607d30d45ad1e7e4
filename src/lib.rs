//! # docvec
//!
//! Document ingestion for retrieval-augmented generation.
//!
//! docvec takes a batch of uploaded files and a use-case label, extracts
//! text from each file, attaches upload provenance, splits the text into
//! overlapping chunks, embeds every chunk, and stores the results in a
//! vector collection named after the use case.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌────────┐   ┌──────────┐   ┌────────────┐
//! │ Uploads  │──▶│ Loader  │──▶│ Enrich │──▶│ Splitter │──▶│  Embedder  │
//! │ CLI/HTTP │   │ pdf/txt │   │        │   │ 256 / 50 │   │ local/http │
//! └──────────┘   │ md/json │   └────────┘   └──────────┘   └─────┬──────┘
//!                └─────────┘                                     ▼
//!                                                   ┌──────────────────────┐
//!                                                   │ VectorStore          │
//!                                                   │ rag_<use_case>       │
//!                                                   │ Astra DB / SQLite    │
//!                                                   └──────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docvec collection "Technical Docs"       # rag_technical_docs
//! docvec ingest ./manuals --use-case "Technical Docs"
//! docvec serve                             # HTTP uploads on 127.0.0.1:8787
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`collection`] | Use-case label → collection name |
//! | [`extract`] | Per-format text extraction |
//! | [`enrich`] | Upload provenance metadata |
//! | [`chunk`] | Recursive character splitting |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector store backends |
//! | [`ingest`] | Pipeline orchestration |
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`server`] | HTTP upload server |

pub mod chunk;
pub mod collection;
pub mod config;
pub mod db;
pub mod embedding;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod ingest_cmd;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod scan;
pub mod server;
pub mod store;
