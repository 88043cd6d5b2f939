//! Helpers for constructing chunk metadata and hashing chunk text.

use crate::loaders::Metadata;
use serde_json::Value;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Build the metadata stored alongside one chunk: the document's fields plus chunk provenance.
pub(crate) fn build_chunk_metadata(
    document: &Metadata,
    chunk_index: usize,
    start_index: usize,
    text: &str,
    ingestion_id: &str,
    ingested_at: &str,
) -> Metadata {
    let mut metadata = document.clone();
    metadata.insert("chunk_index".into(), Value::from(chunk_index));
    metadata.insert("start_index".into(), Value::from(start_index));
    metadata.insert(
        "chunk_hash".into(),
        Value::String(compute_chunk_hash(text)),
    );
    metadata.insert(
        "ingestion_id".into(),
        Value::String(ingestion_id.to_string()),
    );
    metadata.insert(
        "ingested_at".into(),
        Value::String(ingested_at.to_string()),
    );
    metadata
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

/// Current timestamp formatted for metadata storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Construct a fresh identifier for records, batches, and ingestion events.
pub(crate) fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
