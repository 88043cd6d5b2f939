//! HTTP surface for Ragline.
//!
//! This module exposes a compact Axum router:
//!
//! - `GET /` – Liveness banner.
//! - `POST /ingest_document` (alias `POST /upload_document`) – Multipart upload with a `file`
//!   field; the file is saved, chunked, embedded, and stored.
//! - `POST /ingest_url` – Fetch a web page and ingest its text.
//! - `POST /ask_question` – Answer a question from the stored documents.
//! - `GET /metrics` – Ingestion and question counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//!
//! Every ingestion and question response carries a `status` of `SUCCESS` or `FAILED`; a
//! `FAILED` body is returned with `500 Internal Server Error`.

use crate::metrics::MetricsSnapshot;
use crate::processing::{AnswerReport, IngestReport, RagApi, RagError, Status};
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::MultipartRejection,
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Banner returned by `GET /`.
pub const ACTIVE_BANNER: &str = "Ragline API is active now";

/// Room left for multipart framing on top of the raw upload limit.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the HTTP router; request bodies are capped near `max_upload_bytes`.
pub fn create_router<S>(service: Arc<S>, max_upload_bytes: u64) -> Router
where
    S: RagApi + 'static,
{
    let body_limit = usize::try_from(max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/", get(root))
        .route("/ingest_document", post(ingest_document::<S>))
        .route("/upload_document", post(ingest_document::<S>))
        .route("/ingest_url", post(ingest_url::<S>))
        .route("/ask_question", post(ask_question::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(service)
}

async fn root() -> Json<&'static str> {
    Json(ACTIVE_BANNER)
}

/// Accept a multipart upload and ingest the `file` field.
async fn ingest_document<S>(
    State(service): State<Arc<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response
where
    S: RagApi,
{
    let upload = match multipart {
        Ok(mut multipart) => read_file_field(&mut multipart).await,
        Err(rejection) => {
            tracing::debug!(error = %rejection.body_text(), "Rejected multipart request");
            Err(RagError::InvalidRequest("Malformed multipart body.".into()))
        }
    };
    let upload = match upload {
        Ok(upload) => upload,
        Err(error) => return report_response(IngestReport::from_result(Err(error))),
    };
    let (filename, bytes) = upload;
    tracing::debug!(filename, bytes = bytes.len(), "Upload received");

    let result = service.ingest_upload(&filename, &bytes).await;
    report_response(IngestReport::from_result(result))
}

async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Vec<u8>), RagError> {
    let invalid = |error: axum::extract::multipart::MultipartError| {
        tracing::debug!(error = %error, "Unreadable multipart body");
        RagError::InvalidRequest("Malformed multipart body.".into())
    };

    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| RagError::InvalidRequest("Upload is missing a filename.".into()))?;
        let bytes = field.bytes().await.map_err(invalid)?;
        return Ok((filename, bytes.to_vec()));
    }

    Err(RagError::InvalidRequest(
        "Multipart body has no `file` field.".into(),
    ))
}

/// Request body for `POST /ingest_url`.
#[derive(Deserialize)]
struct IngestUrlRequest {
    /// Absolute `http(s)` URL of the page to ingest.
    url: String,
}

async fn ingest_url<S>(
    State(service): State<Arc<S>>,
    request: Result<Json<IngestUrlRequest>, JsonRejection>,
) -> Response
where
    S: RagApi,
{
    let result = match json_body(request) {
        Ok(request) => service.ingest_url(&request.url).await,
        Err(error) => Err(error),
    };
    report_response(IngestReport::from_result(result))
}

/// Request body for `POST /ask_question`.
#[derive(Deserialize)]
struct AskRequest {
    question: String,
    /// Passages to retrieve; defaults to `SEARCH_DEFAULT_K`.
    #[serde(default)]
    k: Option<usize>,
}

async fn ask_question<S>(
    State(service): State<Arc<S>>,
    request: Result<Json<AskRequest>, JsonRejection>,
) -> Response
where
    S: RagApi,
{
    let result = match json_body(request) {
        Ok(request) => service.answer_question(&request.question, request.k).await,
        Err(error) => Err(error),
    };
    report_response(AnswerReport::from_result(result))
}

/// Unwrap a JSON body; rejections keep their detail in the logs, not in the response.
fn json_body<T>(request: Result<Json<T>, JsonRejection>) -> Result<T, RagError> {
    request.map(|Json(body)| body).map_err(|rejection| {
        tracing::debug!(
            status = %rejection.status(),
            error = %rejection.body_text(),
            "Rejected request body"
        );
        RagError::InvalidRequest("Malformed request body.".into())
    })
}

/// Response body for `GET /metrics`.
#[derive(Serialize)]
struct MetricsResponse {
    documents_in_store: usize,
    #[serde(flatten)]
    counters: MetricsSnapshot,
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsResponse>
where
    S: RagApi,
{
    Json(MetricsResponse {
        documents_in_store: service.document_count().await,
        counters: service.metrics_snapshot(),
    })
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "ingest_document",
                method: "POST",
                path: "/ingest_document",
                description: "Upload a .pdf, .txt, .doc, or .docx file as multipart field `file`; it is chunked, embedded, and stored. Response returns { \"status\": \"SUCCESS\", \"message\": string, \"chunks_added\": number }.",
                request_example: None,
            },
            CommandDescriptor {
                name: "ingest_url",
                method: "POST",
                path: "/ingest_url",
                description: "Fetch a web page and ingest its visible text.",
                request_example: Some(json!({ "url": "https://example.org/visitor-guide" })),
            },
            CommandDescriptor {
                name: "ask_question",
                method: "POST",
                path: "/ask_question",
                description: "Answer a question using only the stored documents. Response returns { \"status\", \"answer\", \"sources\": [{ \"content\", \"metadata\" }] }.",
                request_example: Some(json!({ "question": "What are the visiting hours?", "k": 4 })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return ingestion and question counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

/// Reports that carry a boundary status.
trait HasStatus {
    fn status(&self) -> Status;
}

impl HasStatus for IngestReport {
    fn status(&self) -> Status {
        self.status
    }
}

impl HasStatus for AnswerReport {
    fn status(&self) -> Status {
        self.status
    }
}

fn report_response<R>(report: R) -> Response
where
    R: HasStatus + Serialize,
{
    let code = match report.status() {
        Status::Success => StatusCode::OK,
        Status::Failed => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (code, Json(report)).into_response()
}
