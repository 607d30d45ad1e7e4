//! `docvec ingest`: the command-line driver for the pipeline.
//!
//! Paths are expanded by [`crate::scan`], then run through an
//! [`IngestionPipeline`] built from the config. With `--dry-run` only
//! loading and splitting happen, so no provider or store is touched.

use anyhow::{anyhow, Result};
use std::path::PathBuf;

use crate::chunk::RecursiveSplitter;
use crate::collection::resolve_use_case;
use crate::config::Config;
use crate::embedding::{self, DisabledEmbedder};
use crate::error::IngestError;
use crate::extract::FileLoader;
use crate::ingest::{IngestOutcome, IngestWarning, IngestionPipeline, PipelineOptions, SystemClock};
use crate::scan;
use crate::store::{self, MemoryStore};

/// `docvec ingest`: collect files, run the pipeline, print a summary.
///
/// Pipeline failures come back as errors naming the stage, so the process
/// exits non-zero. Collaborator setup failures (bad chunking settings,
/// missing credentials) are reported at stage `startup`.
pub async fn run_ingest(
    config: &Config,
    paths: &[PathBuf],
    excludes: &[String],
    use_case: Option<&str>,
    dry_run: bool,
) -> Result<()> {
    let use_case = resolve_use_case(use_case, &config.ingest.default_use_case);
    let splitter = RecursiveSplitter::from_config(&config.chunking)
        .map_err(|e| stage_error(IngestError::Config(e)))?;
    let loader = FileLoader::new(config.ingest.max_file_size);
    let options = PipelineOptions::from_config(config);

    let files = scan::collect_paths(paths, excludes)?;
    let uploads = scan::read_uploads(&files)?;

    if dry_run {
        // Nothing past splitting runs, so no provider or store is needed.
        let embedder = DisabledEmbedder;
        let store = MemoryStore::new();
        let pipeline = IngestionPipeline::new(splitter, &loader, &embedder, &store, options);
        let prepared = pipeline
            .prepare(&uploads, use_case, &SystemClock)
            .await
            .map_err(stage_error)?;

        println!("ingest {} (dry-run)", prepared.collection);
        println!("  files: {}", uploads.len());
        println!("  documents: {}", prepared.documents);
        println!("  chunks: {}", prepared.chunks.len());
        print_warnings(&prepared.warnings);
        return Ok(());
    }

    if uploads.is_empty() {
        // Nothing to ingest: do not open the store.
        println!("{}", IngestOutcome::AwaitingInput);
        return Ok(());
    }

    let embedder = embedding::create_embedder(&config.embedding)
        .map_err(|e| stage_error(IngestError::startup(e)))?;
    let store = store::create_store(&config.store)
        .await
        .map_err(|e| stage_error(IngestError::startup(e)))?;
    let pipeline =
        IngestionPipeline::new(splitter, &loader, embedder.as_ref(), store.as_ref(), options);

    let outcome = pipeline
        .ingest(&uploads, use_case, &SystemClock)
        .await
        .map_err(stage_error)?;

    if let IngestOutcome::Stored {
        collection,
        documents,
        chunks_stored,
        ..
    } = &outcome
    {
        println!("ingest {}", collection);
        println!("  files: {}", uploads.len());
        println!("  documents: {}", documents);
        println!("  chunks stored: {}", chunks_stored);
        println!("  backend: {}", store.backend());
    }
    print_warnings(outcome.warnings());
    println!("{}", outcome);

    Ok(())
}

fn stage_error(err: IngestError) -> anyhow::Error {
    anyhow!("ingest failed at stage {}: {}", err.stage(), err)
}

fn print_warnings(warnings: &[IngestWarning]) {
    for warning in warnings {
        println!("  skipped {}: {}", warning.filename(), warning);
    }
}
