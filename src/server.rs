//! HTTP upload server.
//!
//! Accepts document uploads over multipart HTTP and runs them through the
//! ingestion pipeline, one request per run.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/ingest` | Multipart upload: a `use_case` text field plus one or more file parts |
//! | `GET`  | `/collections/{label}` | Collection name (and record count, if known) for a use-case label |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "embedding_failed", "message": "Failed to compute embeddings: ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `load_failed` (422), `embedding_failed` (502),
//! `storage_failed` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser upload forms
//! can post directly.
//!
//! ```bash
//! curl -F use_case="Technical Docs" -F file=@manual.pdf http://127.0.0.1:8787/ingest
//! ```

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::chunk::RecursiveSplitter;
use crate::collection::{collection_name, resolve_use_case};
use crate::config::Config;
use crate::embedding::{create_embedder, Embedder};
use crate::error::IngestError;
use crate::extract::FileLoader;
use crate::ingest::{IngestionPipeline, PipelineOptions, SystemClock};
use crate::models::{UploadedFile, MIME_UNKNOWN};
use crate::store::{create_store, VectorStore};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    splitter: RecursiveSplitter,
    loader: Arc<FileLoader>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl AppState {
    pub fn new(
        config: Config,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> anyhow::Result<Self> {
        let splitter = RecursiveSplitter::from_config(&config.chunking)?;
        let loader = Arc::new(FileLoader::new(config.ingest.max_file_size));
        Ok(Self {
            config: Arc::new(config),
            splitter,
            loader,
            embedder,
            store,
        })
    }
}

/// Build the router with all routes and layers.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.config.server.max_upload_bytes;

    Router::new()
        .route("/health", get(handle_health))
        .route("/ingest", post(handle_ingest))
        .route("/collections/{label}", get(handle_collection))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the upload server on `[server].bind`.
///
/// The embedder and store are built before binding, so credential and
/// provider problems fail startup instead of the first upload.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let embedder: Arc<dyn Embedder> =
        Arc::from(create_embedder(&config.embedding).map_err(IngestError::startup)?);
    let store: Arc<dyn VectorStore> =
        Arc::from(create_store(&config.store).await.map_err(IngestError::startup)?);
    let bind_addr = config.server.bind.clone();

    let state = AppState::new(config.clone(), embedder, store)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("docvec listening on http://{}", listener.local_addr()?);
    tracing::info!(bind = %bind_addr, "server started");

    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

fn storage_failed(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "storage_failed".to_string(),
        message: message.into(),
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        let (status, code) = match &err {
            IngestError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            IngestError::Load { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "load_failed"),
            IngestError::Embedding(_) => (StatusCode::BAD_GATEWAY, "embedding_failed"),
            IngestError::Storage(_) => (StatusCode::BAD_GATEWAY, "storage_failed"),
        };
        AppError {
            status,
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /ingest ============

/// Handler for `POST /ingest`.
///
/// Reads every multipart field: `use_case` is the label, any field with a
/// filename is an upload (its part `Content-Type` is the declared type).
/// Responds with the serialized outcome plus a human-readable `message`.
async fn handle_ingest(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut use_case: Option<String> = None;
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() == Some("use_case") {
            let text = field
                .text()
                .await
                .map_err(|e| bad_request(format!("invalid use_case field: {}", e)))?;
            use_case = Some(text);
            continue;
        }

        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().unwrap_or(MIME_UNKNOWN).to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read {}: {}", name, e)))?;
        files.push(UploadedFile::new(name, content_type, bytes.to_vec()));
    }

    let use_case = resolve_use_case(use_case.as_deref(), &state.config.ingest.default_use_case);

    let pipeline = IngestionPipeline::new(
        state.splitter.clone(),
        state.loader.as_ref(),
        state.embedder.as_ref(),
        state.store.as_ref(),
        PipelineOptions::from_config(&state.config),
    );
    let outcome = pipeline.ingest(&files, use_case, &SystemClock).await?;

    let mut body = serde_json::to_value(&outcome)
        .map_err(|e| internal_error(format!("failed to encode response: {}", e)))?;
    body["message"] = serde_json::Value::String(outcome.to_string());
    Ok(Json(body))
}

// ============ GET /collections/{label} ============

#[derive(Serialize)]
struct CollectionResponse {
    use_case: String,
    collection: String,
    backend: String,
    /// `null` when the backend cannot count.
    records: Option<u64>,
}

async fn handle_collection(
    State(state): State<AppState>,
    Path(label): Path<String>,
) -> Result<Json<CollectionResponse>, AppError> {
    let use_case = resolve_use_case(Some(&label), &state.config.ingest.default_use_case);
    let collection = collection_name(use_case);
    let records = state
        .store
        .count(&collection)
        .await
        .map_err(|e| storage_failed(format!("{:#}", e)))?;

    Ok(Json(CollectionResponse {
        use_case: use_case.to_string(),
        collection: collection.to_string(),
        backend: state.store.backend().to_string(),
        records,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::DisabledEmbedder;
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    struct ConstEmbedder;

    #[async_trait]
    impl Embedder for ConstEmbedder {
        fn model_name(&self) -> &str {
            "const"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    const BOUNDARY: &str = "docvecboundary";

    fn multipart_body(use_case: &str, files: &[(&str, &str, &str)]) -> String {
        let mut body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"use_case\"\r\n\r\n{u}\r\n",
            b = BOUNDARY,
            u = use_case
        );
        for (name, content_type, content) in files {
            body.push_str(&format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{n}\"\r\nContent-Type: {t}\r\n\r\n{c}\r\n",
                b = BOUNDARY,
                n = name,
                t = content_type,
                c = content
            ));
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));
        body
    }

    async fn spawn(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> String {
        let state = AppState::new(Config::default(), embedder, store).unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn post_ingest(base: &str, body: String) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{}/ingest", base))
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(body)
            .send()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let base = spawn(Arc::new(ConstEmbedder), Arc::new(MemoryStore::new())).await;
        let json: serde_json::Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_ingest_upload_stores_records() {
        let store = Arc::new(MemoryStore::new());
        let base = spawn(Arc::new(ConstEmbedder), store.clone()).await;

        let body = multipart_body(
            "Technical Docs",
            &[
                ("guide.md", "text/markdown", "# Guide\n\nInstall it."),
                ("logo.png", "image/png", "PNG"),
            ],
        );
        let response = post_ingest(&base, body).await;
        assert_eq!(response.status(), 200);

        let json: serde_json::Value = response.json().await.unwrap();
        assert_eq!(json["status"], "stored");
        assert_eq!(json["collection"], "rag_technical_docs");
        assert_eq!(json["chunks_stored"], 1);
        assert_eq!(json["warnings"][0]["kind"], "unsupported_type");
        assert_eq!(
            json["message"],
            "Documents successfully vectorized and stored in collection rag_technical_docs"
        );

        let records = store.records("rag_technical_docs");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].chunk.metadata["filename"], "guide.md".into());
    }

    #[tokio::test]
    async fn test_ingest_without_files_awaits_input() {
        let base = spawn(Arc::new(ConstEmbedder), Arc::new(MemoryStore::new())).await;
        let response = post_ingest(&base, multipart_body("docs", &[])).await;
        assert_eq!(response.status(), 200);
        let json: serde_json::Value = response.json().await.unwrap();
        assert_eq!(json["status"], "awaiting_input");
        assert_eq!(json["message"], "Please upload documents to proceed");
    }

    #[tokio::test]
    async fn test_embedding_failure_maps_to_502() {
        let base = spawn(Arc::new(DisabledEmbedder), Arc::new(MemoryStore::new())).await;
        let body = multipart_body("docs", &[("a.txt", "text/plain", "hello")]);
        let response = post_ingest(&base, body).await;
        assert_eq!(response.status(), 502);
        let json: serde_json::Value = response.json().await.unwrap();
        assert_eq!(json["error"]["code"], "embedding_failed");
    }

    #[tokio::test]
    async fn test_blank_use_case_uses_default() {
        let store = Arc::new(MemoryStore::new());
        let base = spawn(Arc::new(ConstEmbedder), store.clone()).await;
        let body = multipart_body("   ", &[("a.txt", "text/plain", "hello")]);
        let json: serde_json::Value = post_ingest(&base, body).await.json().await.unwrap();
        assert_eq!(json["collection"], "rag_default");
        assert_eq!(store.records("rag_default").len(), 1);
    }

    #[tokio::test]
    async fn test_collection_lookup() {
        let base = spawn(Arc::new(ConstEmbedder), Arc::new(MemoryStore::new())).await;
        let json: serde_json::Value = reqwest::get(format!("{}/collections/Team%20Wiki", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(json["use_case"], "Team Wiki");
        assert_eq!(json["collection"], "rag_team_wiki");
        assert_eq!(json["backend"], "memory");
        assert_eq!(json["records"], 0);
    }

    #[test]
    fn test_ingest_error_codes() {
        let err: AppError = IngestError::Storage("down".into()).into();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.code, "storage_failed");

        let err: AppError = IngestError::Load {
            filename: "a.pdf".into(),
            source: crate::error::LoadError::Pdf("bad".into()),
        }
        .into();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code, "load_failed");

        let err: AppError = IngestError::Config(crate::error::ConfigError::Missing(
            "ASTRA_DB_APPLICATION_TOKEN".into(),
        ))
        .into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "internal");
    }

    #[test]
    fn test_internal_error_is_500() {
        let err = internal_error("failed to encode response: key must be a string");
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "internal");

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
