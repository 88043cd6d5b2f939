//! Mapping helpers between loader output, chunks, and stored records.

use crate::{
    loaders::Document,
    processing::{
        chunking::Chunker,
        sanitize,
        types::SourcePreview,
    },
    store::{NewRecord, ScoredRecord, payload},
};

/// Chunk every document and attach provenance metadata, skipping whitespace-only chunks.
pub(crate) fn prepare_records(
    chunker: &Chunker,
    documents: &[Document],
    ingestion_id: &str,
    ingested_at: &str,
) -> Vec<NewRecord> {
    let mut records = Vec::new();

    for document in documents {
        for chunk in chunker.split(&document.text) {
            if chunk.text.trim().is_empty() {
                continue;
            }
            let metadata = payload::build_chunk_metadata(
                &document.metadata,
                chunk.index,
                chunk.start,
                &chunk.text,
                ingestion_id,
                ingested_at,
            );
            records.push(NewRecord {
                text: chunk.text,
                metadata,
            });
        }
    }

    records
}

/// Map a search hit into the preview shown alongside an answer.
pub(crate) fn map_scored_record(record: &ScoredRecord) -> SourcePreview {
    SourcePreview {
        content: sanitize::preview(&record.text),
        metadata: record.metadata.clone(),
    }
}
