//! Engine coordinating loading, chunking, storage, and answer synthesis.

use crate::{
    config::Config,
    embedding::{EmbeddingClient, build_embedding_client},
    llm::{ChatClient, build_chat_client},
    loaders::{LoaderError, Loaders, Source, SourceKind},
    metrics::{EngineMetrics, MetricsSnapshot},
    processing::{
        chunking::Chunker,
        mappers::prepare_records,
        sanitize::{sanitize_filename, sanitize_string},
        synthesis::AnswerSynthesizer,
        types::{Answer, AnswerOutcome, IngestOutcome, RagError},
    },
    store::{VectorStore, payload},
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Owns every long-lived component of the question-answering pipeline.
///
/// Build one engine at process start and share it through an `Arc`; the HTTP surface and the
/// CLI both drive the same instance. All failures come back as [`RagError`] so callers can
/// report the error class without parsing messages.
pub struct RagEngine {
    loaders: Loaders,
    chunker: Chunker,
    store: VectorStore,
    synthesizer: AnswerSynthesizer,
    metrics: EngineMetrics,
    upload_dir: PathBuf,
    max_upload_bytes: u64,
    default_k: usize,
    max_k: usize,
}

/// Abstraction over the engine used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait RagApi: Send + Sync {
    /// Persist an uploaded file under the upload directory and ingest it.
    async fn ingest_upload(&self, filename: &str, bytes: &[u8]) -> Result<IngestOutcome, RagError>;

    /// Fetch and ingest a web page.
    async fn ingest_url(&self, url: &str) -> Result<IngestOutcome, RagError>;

    /// Answer a question from the stored documents using `k` passages (default when `None`).
    async fn answer_question(&self, question: &str, k: Option<usize>)
    -> Result<Answer, RagError>;

    /// Number of chunks currently stored.
    async fn document_count(&self) -> usize;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl RagEngine {
    /// Build an engine with the providers selected by configuration.
    pub async fn from_config(config: &Config) -> Result<Self, RagError> {
        tracing::info!(provider = ?config.embedding_provider, model = %config.embedding_model, "Initializing embedding client");
        let embedder = build_embedding_client(config).map_err(RagError::EmbeddingProvider)?;
        tracing::info!(provider = ?config.llm_provider, model = %config.llm_model, "Initializing chat client");
        let chat = build_chat_client(config)?;
        Self::with_clients(config, embedder, chat).await
    }

    /// Build an engine around explicit provider clients.
    pub async fn with_clients(
        config: &Config,
        embedder: Box<dyn EmbeddingClient>,
        chat: Box<dyn ChatClient>,
    ) -> Result<Self, RagError> {
        let chunker = Chunker::new(config.chunk_size, config.chunk_overlap)?;
        let store = VectorStore::open(
            &config.vector_store_dir,
            &config.vector_store_collection,
            embedder,
        )
        .await?;

        Ok(Self {
            loaders: Loaders::new(
                config.max_upload_bytes,
                Duration::from_secs(config.web_timeout_secs),
            )?,
            chunker,
            store,
            synthesizer: AnswerSynthesizer::new(chat, &config.assistant_name, config.llm_temperature),
            metrics: EngineMetrics::new(),
            upload_dir: config.upload_dir.clone(),
            max_upload_bytes: config.max_upload_bytes,
            default_k: config.search_default_k,
            max_k: config.search_max_k,
        })
    }

    /// Load, chunk, embed, and store every document of `source` as one atomic batch.
    pub async fn ingest_source(&self, source: Source) -> Result<IngestOutcome, RagError> {
        let location = source.location();
        let result = self.ingest_loaded(source, payload::generate_id()).await;
        self.observe_ingest(&location, result)
    }

    /// Ingest a local file, resolving its kind from the extension.
    pub async fn ingest_file(&self, path: impl Into<PathBuf>) -> Result<IngestOutcome, RagError> {
        let path = path.into();
        match Source::file(&path) {
            Ok(source) => self.ingest_source(source).await,
            Err(error) => self.observe_ingest(&path.display().to_string(), Err(error.into())),
        }
    }

    /// Persist an uploaded file and ingest it; the extension is checked before anything is written.
    ///
    /// The file is saved as `<ingestion_id>-<sanitized name>`, so uploads sharing a name never
    /// read each other's bytes.
    pub async fn ingest_upload(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<IngestOutcome, RagError> {
        let result = self.save_and_ingest(filename, bytes).await;
        self.observe_ingest(filename, result)
    }

    /// Fetch and ingest a web page.
    pub async fn ingest_url(&self, url: &str) -> Result<IngestOutcome, RagError> {
        self.ingest_source(Source::url(url.trim())).await
    }

    /// Answer a question from the stored documents.
    ///
    /// An empty store short-circuits to a greeting with no retrieval and no model call.
    pub async fn answer_question(
        &self,
        question: &str,
        k: Option<usize>,
    ) -> Result<Answer, RagError> {
        let result = self.answer(question, k).await;
        match &result {
            Ok(answer) => {
                self.metrics.record_answer(
                    answer.outcome == AnswerOutcome::Refused,
                    answer.prompt_tokens as u64,
                );
                tracing::info!(
                    outcome = ?answer.outcome,
                    sources = answer.sources.len(),
                    "Question answered"
                );
            }
            Err(error) => {
                self.metrics.record_query_failure();
                tracing::warn!(kind = ?error.kind(), error = %error, "Question failed");
            }
        }
        result
    }

    /// Number of chunks currently stored.
    pub async fn count(&self) -> usize {
        self.store.count().await
    }

    /// Retrieve the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn answer(&self, question: &str, k: Option<usize>) -> Result<Answer, RagError> {
        let question = sanitize_string(Some(question.to_string()))
            .ok_or_else(|| RagError::InvalidRequest("Question must not be empty.".into()))?;

        if self.store.count().await == 0 {
            tracing::debug!("Store is empty; returning greeting");
            return Ok(self.synthesizer.empty_store_answer());
        }

        let k = self.resolve_k(k);
        let hits = self.store.search(&question, k).await?;
        tracing::debug!(k, hits = hits.len(), "Retrieved passages");
        Ok(self.synthesizer.synthesize(&question, &hits).await?)
    }

    async fn ingest_loaded(
        &self,
        source: Source,
        ingestion_id: String,
    ) -> Result<IngestOutcome, RagError> {
        let location = source.location();
        let documents = self.loaders.load(&source).await?;

        let ingested_at = payload::current_timestamp_rfc3339();
        let records = prepare_records(&self.chunker, &documents, &ingestion_id, &ingested_at);
        if records.is_empty() {
            return Err(RagError::Load(LoaderError::NoText(location)));
        }

        tracing::debug!(
            source = %location,
            documents = documents.len(),
            chunks = records.len(),
            chunk_size = self.chunker.chunk_size(),
            overlap = self.chunker.overlap(),
            "Chunked source"
        );
        let chunks_added = self.store.add(records).await?;

        Ok(IngestOutcome {
            source: location,
            documents: documents.len(),
            chunks_added,
            ingestion_id,
        })
    }

    async fn save_and_ingest(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<IngestOutcome, RagError> {
        let kind = SourceKind::from_file_name(Path::new(filename))?;
        let safe_name = sanitize_filename(filename)
            .ok_or_else(|| RagError::InvalidRequest("Upload filename must not be empty.".into()))?;
        if bytes.len() as u64 > self.max_upload_bytes {
            return Err(RagError::Load(LoaderError::FileTooLarge {
                size: bytes.len() as u64,
                limit: self.max_upload_bytes,
            }));
        }

        let ingestion_id = payload::generate_id();
        let path = self
            .save_upload(&format!("{ingestion_id}-{safe_name}"), bytes)
            .await?;
        tracing::debug!(filename, path = %path.display(), bytes = bytes.len(), "Upload saved");
        self.ingest_loaded(Source::File { path, kind }, ingestion_id)
            .await
    }

    async fn save_upload(&self, safe_name: &str, bytes: &[u8]) -> Result<PathBuf, RagError> {
        let io_error = |path: &Path, source| {
            RagError::Load(LoaderError::Io {
                path: path.display().to_string(),
                source,
            })
        };
        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .map_err(|source| io_error(&self.upload_dir, source))?;
        let path = self.upload_dir.join(safe_name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| io_error(&path, source))?;
        Ok(path)
    }

    fn observe_ingest(
        &self,
        location: &str,
        result: Result<IngestOutcome, RagError>,
    ) -> Result<IngestOutcome, RagError> {
        match &result {
            Ok(outcome) => {
                self.metrics
                    .record_ingestion(outcome.documents as u64, outcome.chunks_added as u64);
                tracing::info!(
                    source = %location,
                    documents = outcome.documents,
                    chunks = outcome.chunks_added,
                    ingestion_id = %outcome.ingestion_id,
                    "Source ingested"
                );
            }
            Err(error) => {
                self.metrics.record_ingest_failure();
                tracing::warn!(
                    source = %location,
                    kind = ?error.kind(),
                    error = %error,
                    "Ingestion failed"
                );
            }
        }
        result
    }

    fn resolve_k(&self, k: Option<usize>) -> usize {
        k.unwrap_or(self.default_k).clamp(1, self.max_k)
    }
}

#[async_trait]
impl RagApi for RagEngine {
    async fn ingest_upload(&self, filename: &str, bytes: &[u8]) -> Result<IngestOutcome, RagError> {
        RagEngine::ingest_upload(self, filename, bytes).await
    }

    async fn ingest_url(&self, url: &str) -> Result<IngestOutcome, RagError> {
        RagEngine::ingest_url(self, url).await
    }

    async fn answer_question(
        &self,
        question: &str,
        k: Option<usize>,
    ) -> Result<Answer, RagError> {
        RagEngine::answer_question(self, question, k).await
    }

    async fn document_count(&self) -> usize {
        self.count().await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        RagEngine::metrics_snapshot(self)
    }
}
