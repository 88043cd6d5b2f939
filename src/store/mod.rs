//! Durable local vector store holding one logical collection.
//!
//! Records live in memory for search and in an append-only journal on disk for durability.
//! `add` calls are serialized by a write gate and commit all-or-nothing: vectors are computed
//! first, then the whole batch is written as one journal line, and only then made visible
//! to `search`. Searches read a snapshot under a shared lock and never wait on embedding.

mod log;
pub mod payload;
pub mod types;

pub use payload::compute_chunk_hash;
pub use types::{NewRecord, ScoredRecord, StoreError, StoredRecord};

use crate::embedding::EmbeddingClient;
use log::BatchJournal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};

/// Version of the on-disk layout written by this build.
pub const STORE_FORMAT_VERSION: u32 = 1;

const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    format_version: u32,
    collection: String,
}

/// Persistent nearest-neighbour store over embedded chunks.
pub struct VectorStore {
    embedder: Box<dyn EmbeddingClient>,
    records: RwLock<Vec<StoredRecord>>,
    journal: Mutex<BatchJournal>,
    collection: String,
    dir: PathBuf,
}

impl VectorStore {
    /// Open the store under `dir`, creating it when absent, and replay persisted records.
    pub async fn open(
        dir: impl AsRef<Path>,
        collection: &str,
        embedder: Box<dyn EmbeddingClient>,
    ) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;

        ensure_manifest(&dir, collection).await?;

        let (journal, records) = BatchJournal::open(&dir.join(format!("{collection}.jsonl"))).await?;
        if let Some(first) = records.first() {
            let expected = first.vector.len();
            if let Some(bad) = records.iter().find(|r| r.vector.len() != expected) {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: bad.vector.len(),
                });
            }
        }

        tracing::info!(
            dir = %dir.display(),
            collection,
            records = records.len(),
            "Vector store opened"
        );

        Ok(Self {
            embedder,
            records: RwLock::new(records),
            journal: Mutex::new(journal),
            collection: collection.to_string(),
            dir,
        })
    }

    /// Name of the collection backing this store.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Directory holding the store files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Embed and persist every record as one batch; returns the number added.
    ///
    /// Either the whole batch becomes durable and searchable, or the store is left unchanged.
    pub async fn add(&self, batch: Vec<NewRecord>) -> Result<usize, StoreError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut journal = self.journal.lock().await;

        let texts: Vec<String> = batch.iter().map(|record| record.text.clone()).collect();
        let vectors = self.embedder.generate_embeddings(texts).await?;
        if vectors.len() != batch.len() {
            return Err(StoreError::Embedding(
                crate::embedding::EmbeddingClientError::InvalidResponse(format!(
                    "expected {} embeddings, received {}",
                    batch.len(),
                    vectors.len()
                )),
            ));
        }

        let expected = match self.dimension().await {
            Some(dimension) => dimension,
            None => vectors[0].len(),
        };
        if let Some(bad) = vectors.iter().find(|vector| vector.len() != expected) {
            return Err(StoreError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }

        let first_seq = journal.next_seq();
        let stored: Vec<StoredRecord> = batch
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(offset, (record, vector))| StoredRecord {
                id: payload::generate_id(),
                seq: first_seq + offset as u64,
                text: record.text,
                metadata: record.metadata,
                vector,
            })
            .collect();

        let batch_id = payload::generate_id();
        journal.append(&batch_id, &stored).await?;

        let added = stored.len();
        self.records.write().await.extend(stored);
        tracing::debug!(
            collection = %self.collection,
            batch_id = %batch_id,
            added,
            first_seq,
            "Batch committed"
        );
        Ok(added)
    }

    /// Return up to `k` records most similar to `query`, best first, ties by insertion order.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredRecord>, StoreError> {
        if k == 0 {
            return Err(StoreError::InvalidLimit);
        }
        if self.count().await == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self
            .embedder
            .generate_embeddings(vec![query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                StoreError::Embedding(crate::embedding::EmbeddingClientError::InvalidResponse(
                    "no vector returned for query".into(),
                ))
            })?;

        let records = self.records.read().await;
        if let Some(first) = records.first() {
            if first.vector.len() != query_vector.len() {
                return Err(StoreError::DimensionMismatch {
                    expected: first.vector.len(),
                    actual: query_vector.len(),
                });
            }
        }

        let mut scored: Vec<(f32, &StoredRecord)> = records
            .iter()
            .map(|record| {
                let score = cosine_similarity(&query_vector, &record.vector);
                (if score.is_nan() { f32::NEG_INFINITY } else { score }, record)
            })
            .collect();
        scored.sort_by(|(a_score, a), (b_score, b)| {
            b_score.total_cmp(a_score).then(a.seq.cmp(&b.seq))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, record)| ScoredRecord {
                id: record.id.clone(),
                seq: record.seq,
                score,
                text: record.text.clone(),
                metadata: record.metadata.clone(),
            })
            .collect())
    }

    /// Number of persisted records.
    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }

    async fn dimension(&self) -> Option<usize> {
        self.records
            .read()
            .await
            .first()
            .map(|record| record.vector.len())
    }
}

async fn ensure_manifest(dir: &Path, collection: &str) -> Result<(), StoreError> {
    let path = dir.join(MANIFEST_FILE);
    let io_error = |source| StoreError::Io {
        path: path.clone(),
        source,
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let manifest: Manifest = serde_json::from_slice(&bytes).map_err(|error| {
                StoreError::IncompatibleFormat(format!("unreadable manifest: {error}"))
            })?;
            if manifest.format_version != STORE_FORMAT_VERSION {
                return Err(StoreError::IncompatibleFormat(format!(
                    "store format version {} is not supported (expected {STORE_FORMAT_VERSION})",
                    manifest.format_version
                )));
            }
            if manifest.collection != collection {
                return Err(StoreError::IncompatibleFormat(format!(
                    "store holds collection '{}', not '{collection}'",
                    manifest.collection
                )));
            }
            Ok(())
        }
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            let manifest = Manifest {
                format_version: STORE_FORMAT_VERSION,
                collection: collection.to_string(),
            };
            let tmp = dir.join(format!("{MANIFEST_FILE}.tmp"));
            tokio::fs::write(&tmp, serde_json::to_vec_pretty(&manifest)?)
                .await
                .map_err(io_error)?;
            tokio::fs::rename(&tmp, &path).await.map_err(io_error)
        }
        Err(error) => Err(io_error(error)),
    }
}

/// Cosine similarity; zero-length vectors score 0.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingClientError;
    use crate::loaders::Metadata;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Maps keywords to axes so similarity is predictable.
    struct KeywordEmbedder {
        calls: Arc<AtomicUsize>,
    }

    fn keyword_vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        vec![
            lower.matches("parking").count() as f32,
            lower.matches("cafe").count() as f32,
            lower.matches("hours").count() as f32,
        ]
    }

    #[async_trait]
    impl EmbeddingClient for KeywordEmbedder {
        async fn generate_embeddings(
            &self,
            texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if texts.iter().any(|text| text.contains("rate-limit-me")) {
                return Err(EmbeddingClientError::RateLimited("slow down".into()));
            }
            Ok(texts.iter().map(|text| keyword_vector(text)).collect())
        }
    }

    struct FixedDimensionEmbedder(usize);

    #[async_trait]
    impl EmbeddingClient for FixedDimensionEmbedder {
        async fn generate_embeddings(
            &self,
            texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            Ok(texts.iter().map(|_| vec![1.0; self.0]).collect())
        }
    }

    fn embedder() -> Box<dyn EmbeddingClient> {
        Box::new(KeywordEmbedder {
            calls: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn record(text: &str) -> NewRecord {
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), "test.txt".into());
        NewRecord {
            text: text.to_string(),
            metadata,
        }
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = VectorStore::open(dir.path(), "documents", embedder())
                .await
                .unwrap();
            let added = store
                .add(vec![record("parking is free"), record("cafe opens at 8")])
                .await
                .unwrap();
            assert_eq!(added, 2);
        }

        let store = VectorStore::open(dir.path(), "documents", embedder())
            .await
            .unwrap();
        assert_eq!(store.count().await, 2);
        let hits = store.search("where is parking", 1).await.unwrap();
        assert_eq!(hits[0].text, "parking is free");
        assert_eq!(hits[0].metadata["source"], "test.txt");
    }

    #[tokio::test]
    async fn search_ranks_by_similarity_and_limits_results() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(dir.path(), "documents", embedder())
            .await
            .unwrap();
        store
            .add(vec![
                record("cafe menu"),
                record("parking parking garage"),
                record("visiting hours and parking"),
            ])
            .await
            .unwrap();

        let hits = store.search("parking", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);
        assert_eq!(hits[0].text, "parking parking garage");

        let all = store.search("parking", 10).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|pair| pair[0].score >= pair[1].score));
    }

    #[tokio::test]
    async fn equal_scores_keep_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(dir.path(), "documents", embedder())
            .await
            .unwrap();
        store.add(vec![record("parking first")]).await.unwrap();
        store
            .add(vec![record("parking second"), record("parking third")])
            .await
            .unwrap();

        let hits = store.search("parking", 3).await.unwrap();
        let texts: Vec<_> = hits.iter().map(|hit| hit.text.as_str()).collect();
        assert_eq!(texts, ["parking first", "parking second", "parking third"]);
        assert!(hits.windows(2).all(|pair| pair[0].seq < pair[1].seq));
    }

    #[tokio::test]
    async fn failed_embedding_leaves_store_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(dir.path(), "documents", embedder())
            .await
            .unwrap();
        store.add(vec![record("parking")]).await.unwrap();

        let error = store
            .add(vec![record("cafe"), record("rate-limit-me")])
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            StoreError::Embedding(EmbeddingClientError::RateLimited(_))
        ));
        assert_eq!(store.count().await, 1);
        drop(store);

        let reopened = VectorStore::open(dir.path(), "documents", embedder())
            .await
            .unwrap();
        assert_eq!(reopened.count().await, 1);
    }

    #[tokio::test]
    async fn mismatched_dimension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = VectorStore::open(dir.path(), "documents", Box::new(FixedDimensionEmbedder(3)))
                .await
                .unwrap();
            store.add(vec![record("a")]).await.unwrap();
        }

        let store = VectorStore::open(dir.path(), "documents", Box::new(FixedDimensionEmbedder(5)))
            .await
            .unwrap();
        let error = store.add(vec![record("b")]).await.unwrap_err();
        assert!(matches!(
            error,
            StoreError::DimensionMismatch {
                expected: 3,
                actual: 5
            }
        ));
        assert_eq!(store.count().await, 1);

        let error = store.search("b", 1).await.unwrap_err();
        assert!(matches!(error, StoreError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn search_on_empty_store_skips_embedding() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let store = VectorStore::open(
            dir.path(),
            "documents",
            Box::new(KeywordEmbedder {
                calls: calls.clone(),
            }),
        )
        .await
        .unwrap();

        assert!(store.search("anything", 4).await.unwrap().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(
            store.search("anything", 0).await,
            Err(StoreError::InvalidLimit)
        ));
    }

    #[tokio::test]
    async fn manifest_guards_collection_and_version() {
        let dir = tempfile::tempdir().unwrap();
        VectorStore::open(dir.path(), "documents", embedder())
            .await
            .unwrap();

        let error = VectorStore::open(dir.path(), "other", embedder())
            .await
            .err()
            .unwrap();
        assert!(matches!(error, StoreError::IncompatibleFormat(_)));

        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"{"format_version":99,"collection":"documents"}"#,
        )
        .unwrap();
        let error = VectorStore::open(dir.path(), "documents", embedder())
            .await
            .err()
            .unwrap();
        assert!(matches!(error, StoreError::IncompatibleFormat(_)));
    }

    #[tokio::test]
    async fn concurrent_adds_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            VectorStore::open(dir.path(), "documents", embedder())
                .await
                .unwrap(),
        );

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .add(vec![record(&format!("parking {i}")), record("cafe")])
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), 2);
        }
        assert_eq!(store.count().await, 16);
        drop(store);

        let reopened = VectorStore::open(dir.path(), "documents", embedder())
            .await
            .unwrap();
        let hits = reopened.search("cafe", 16).await.unwrap();
        let mut seqs: Vec<_> = hits.iter().map(|hit| hit.seq).collect();
        seqs.sort_unstable();
        assert_eq!(seqs, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn cosine_handles_zero_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
    }
}
