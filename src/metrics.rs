use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing ingestion and query activity.
#[derive(Default)]
pub struct EngineMetrics {
    documents_ingested: AtomicU64,
    chunks_ingested: AtomicU64,
    ingest_failures: AtomicU64,
    questions_answered: AtomicU64,
    guardrail_refusals: AtomicU64,
    query_failures: AtomicU64,
    prompt_tokens: AtomicU64,
}

impl EngineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful ingestion and the number of chunks it stored.
    pub fn record_ingestion(&self, documents: u64, chunk_count: u64) {
        self.documents_ingested
            .fetch_add(documents, Ordering::Relaxed);
        self.chunks_ingested
            .fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Record an ingestion that failed.
    pub fn record_ingest_failure(&self) {
        self.ingest_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an answered question; `refused` marks guardrail substitutions.
    pub fn record_answer(&self, refused: bool, prompt_tokens: u64) {
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
        if refused {
            self.guardrail_refusals.fetch_add(1, Ordering::Relaxed);
        }
        self.prompt_tokens
            .fetch_add(prompt_tokens, Ordering::Relaxed);
    }

    /// Record a question that could not be answered.
    pub fn record_query_failure(&self) {
        self.query_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_ingested: self.documents_ingested.load(Ordering::Relaxed),
            chunks_ingested: self.chunks_ingested.load(Ordering::Relaxed),
            ingest_failures: self.ingest_failures.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
            guardrail_refusals: self.guardrail_refusals.load(Ordering::Relaxed),
            query_failures: self.query_failures.load(Ordering::Relaxed),
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of engine counters used for reporting.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents stored since startup (one per PDF page, file, or web page).
    pub documents_ingested: u64,
    /// Total chunks persisted since startup.
    pub chunks_ingested: u64,
    /// Ingestion requests that failed.
    pub ingest_failures: u64,
    /// Questions answered, including canned replies.
    pub questions_answered: u64,
    /// Answers replaced by the grounding guardrail.
    pub guardrail_refusals: u64,
    /// Questions that failed.
    pub query_failures: u64,
    /// Prompt tokens sent to the language model.
    pub prompt_tokens: u64,
}
