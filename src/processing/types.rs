//! Core data types and error definitions for the ingestion and query pipelines.

use crate::{
    llm::ChatClientError, loaders::LoaderError, loaders::Metadata, store::StoreError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while configuring the chunker.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Chunk size of zero cannot make progress.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap must leave room for new text in each chunk.
    #[error("chunk overlap {overlap} must be smaller than chunk size {chunk_size}")]
    OverlapTooLarge {
        /// Requested overlap.
        overlap: usize,
        /// Requested chunk size.
        chunk_size: usize,
    },
}

/// Failures surfaced by the engine, one variant per error class.
#[derive(Debug, Error)]
pub enum RagError {
    /// Source extension is not one of pdf, txt, doc, docx.
    #[error("unsupported format: '{0}'")]
    UnsupportedFormat(String),
    /// Source could not be read or fetched.
    #[error("failed to load source: {0}")]
    Load(#[source] LoaderError),
    /// Embedding provider failed (credentials, throttling, transport).
    #[error("embedding provider failed: {0}")]
    EmbeddingProvider(#[source] crate::embedding::EmbeddingClientError),
    /// Vector store could not be read or written.
    #[error("storage failed: {0}")]
    Storage(#[source] StoreError),
    /// Language model call failed.
    #[error("answer synthesis failed: {0}")]
    Synthesis(#[from] ChatClientError),
    /// Request was malformed before any work started.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Machine-readable error class carried in failure responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// See [`RagError::UnsupportedFormat`].
    UnsupportedFormat,
    /// See [`RagError::Load`].
    LoadError,
    /// See [`RagError::EmbeddingProvider`].
    EmbeddingProviderError,
    /// See [`RagError::Storage`].
    StorageError,
    /// See [`RagError::Synthesis`].
    SynthesisError,
    /// See [`RagError::InvalidRequest`].
    InvalidRequest,
}

impl RagError {
    /// Error class of this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::Load(_) => ErrorKind::LoadError,
            Self::EmbeddingProvider(_) => ErrorKind::EmbeddingProviderError,
            Self::Storage(_) => ErrorKind::StorageError,
            Self::Synthesis(_) => ErrorKind::SynthesisError,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }

    /// Human-readable message safe to show end users; internal detail stays in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::UnsupportedFormat(extension) => {
                let shown = if extension.is_empty() {
                    "(none)".to_string()
                } else {
                    format!(".{extension}")
                };
                format!(
                    "Unsupported file format {shown}. Please provide a PDF, TXT, DOC, or DOCX file."
                )
            }
            Self::Load(_) => {
                "The source could not be loaded. Check that the file or URL is valid and reachable."
                    .into()
            }
            Self::EmbeddingProvider(_) => {
                "The embedding service is currently unavailable. Please try again later.".into()
            }
            Self::Storage(_) => "The document store could not be accessed.".into(),
            Self::Synthesis(_) => {
                "The language model could not produce an answer. Please try again later.".into()
            }
            Self::InvalidRequest(reason) => reason.clone(),
        }
    }
}

impl From<LoaderError> for RagError {
    fn from(error: LoaderError) -> Self {
        match error {
            LoaderError::UnsupportedFormat(extension) => Self::UnsupportedFormat(extension),
            other => Self::Load(other),
        }
    }
}

impl From<StoreError> for RagError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Embedding(inner) => Self::EmbeddingProvider(inner),
            other => Self::Storage(other),
        }
    }
}

impl From<ChunkingError> for RagError {
    fn from(error: ChunkingError) -> Self {
        Self::InvalidRequest(error.to_string())
    }
}

/// Overall result status reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Operation completed.
    Success,
    /// Operation failed; see `error_kind`.
    Failed,
}

/// Summary of a completed ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    /// Source location as given by the caller.
    pub source: String,
    /// Documents produced by the loader.
    pub documents: usize,
    /// Chunks persisted to the store.
    pub chunks_added: usize,
    /// Identifier shared by every chunk of this ingestion.
    pub ingestion_id: String,
}

impl IngestOutcome {
    /// Human-readable success message.
    pub fn message(&self) -> String {
        format!(
            "Successfully added {} chunks from {}",
            self.chunks_added, self.source
        )
    }
}

/// Truncated view of a retrieved chunk for citation display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePreview {
    /// First characters of the chunk text followed by an ellipsis.
    pub content: String,
    /// Full chunk metadata.
    pub metadata: Metadata,
}

/// How an answer was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// Model answer passed the guardrail.
    Generated,
    /// Model answer was replaced by the friendly refusal.
    Refused,
    /// Store held no records; greeting returned without retrieval.
    EmptyStore,
    /// Retrieval returned nothing; fixed message returned without a model call.
    NoMatches,
}

/// Synthesized answer with the sources used to produce it.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// Final answer text.
    pub text: String,
    /// Previews of the retrieved chunks, in ranked order.
    pub sources: Vec<SourcePreview>,
    /// How the answer was produced.
    pub outcome: AnswerOutcome,
    /// Prompt tokens sent to the model (0 when no call was made).
    pub prompt_tokens: usize,
}

/// Boundary response for ingestion requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    /// `SUCCESS` or `FAILED`.
    pub status: Status,
    /// Human-readable message.
    pub message: String,
    /// Chunks persisted, present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks_added: Option<usize>,
    /// Error class, present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl IngestReport {
    /// Convert an engine result into a boundary response.
    pub fn from_result(result: Result<IngestOutcome, RagError>) -> Self {
        match result {
            Ok(outcome) => Self {
                status: Status::Success,
                message: outcome.message(),
                chunks_added: Some(outcome.chunks_added),
                error_kind: None,
            },
            Err(error) => Self {
                status: Status::Failed,
                message: error.user_message(),
                chunks_added: None,
                error_kind: Some(error.kind()),
            },
        }
    }
}

/// Boundary response for questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerReport {
    /// `SUCCESS` or `FAILED`.
    pub status: Status,
    /// Answer text; empty on failure.
    pub answer: String,
    /// Source previews; empty on failure.
    pub sources: Vec<SourcePreview>,
    /// Failure message, present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error class, present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl AnswerReport {
    /// Convert an engine result into a boundary response.
    pub fn from_result(result: Result<Answer, RagError>) -> Self {
        match result {
            Ok(answer) => Self {
                status: Status::Success,
                answer: answer.text,
                sources: answer.sources,
                message: None,
                error_kind: None,
            },
            Err(error) => Self {
                status: Status::Failed,
                answer: String::new(),
                sources: Vec::new(),
                message: Some(error.user_message()),
                error_kind: Some(error.kind()),
            },
        }
    }
}
