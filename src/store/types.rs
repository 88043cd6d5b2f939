//! Shared types used by the vector store and its journal.

use crate::embedding::EmbeddingClientError;
use crate::loaders::Metadata;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned while reading or writing the vector store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("vector store I/O failed at {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A journal line in the middle of the file could not be decoded.
    #[error("vector store journal corrupt at line {line}: {reason}")]
    Corrupt {
        /// 1-based journal line number.
        line: usize,
        /// Decoder message.
        reason: String,
    },
    /// On-disk layout was written by an incompatible version or for another collection.
    #[error("incompatible vector store: {0}")]
    IncompatibleFormat(String),
    /// Provider returned vectors whose length differs from the stored ones.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension of vectors already stored.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },
    /// Search requested zero results.
    #[error("search limit must be at least 1")]
    InvalidLimit,
    /// Embedding provider failed; nothing was written.
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Record could not be serialized for the journal.
    #[error("failed to encode journal entry: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Record submitted to [`super::VectorStore::add`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    /// Chunk text to embed and store.
    pub text: String,
    /// Metadata stored alongside the text.
    pub metadata: Metadata,
}

/// Embedded record as persisted in the journal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredRecord {
    /// Store-assigned identifier.
    pub id: String,
    /// Insertion sequence; strictly increasing across the store's lifetime.
    pub seq: u64,
    /// Chunk text.
    pub text: String,
    /// Chunk metadata.
    pub metadata: Metadata,
    /// Embedding vector.
    pub vector: Vec<f32>,
}

/// Search hit returned by [`super::VectorStore::search`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    /// Store-assigned identifier.
    pub id: String,
    /// Insertion sequence used for tie-breaking.
    pub seq: u64,
    /// Cosine similarity to the query.
    pub score: f32,
    /// Chunk text.
    pub text: String,
    /// Chunk metadata.
    pub metadata: Metadata,
}
