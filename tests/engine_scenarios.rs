use std::path::Path;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use ragline::{
    config::{Config, EmbeddingProvider, LlmProvider},
    embedding::HashedEmbeddingClient,
    llm::{ChatClient, ChatClientError, ChatRequest},
    loaders::Metadata,
    processing::{
        AnswerOutcome, AnswerReport, AnswerSynthesizer, ErrorKind, IngestReport, RagEngine, Status,
    },
    store::{NewRecord, VectorStore},
};

const DIMENSION: usize = 64;

struct ScriptedChat {
    reply: String,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ChatClient for ScriptedChat {
    async fn complete(&self, _request: ChatRequest) -> Result<String, ChatClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

fn scenario_config(root: &Path) -> Config {
    Config {
        openai_api_key: None,
        openai_base_url: "http://127.0.0.1:1".into(),
        ollama_url: "http://127.0.0.1:1".into(),
        embedding_provider: EmbeddingProvider::Hashed,
        embedding_model: "hashed".into(),
        embedding_dimension: DIMENSION,
        embedding_batch_size: 16,
        llm_provider: LlmProvider::OpenAI,
        llm_model: "scripted".into(),
        llm_temperature: 0.0,
        provider_timeout_secs: 5,
        web_timeout_secs: 5,
        chunk_size: 1000,
        chunk_overlap: 200,
        vector_store_dir: root.join("vectorstore"),
        vector_store_collection: "documents".into(),
        upload_dir: root.join("uploads"),
        max_upload_bytes: 1024 * 1024,
        search_default_k: 4,
        search_max_k: 50,
        assistant_name: "Jenny".into(),
        server_port: None,
    }
}

async fn scenario_engine(root: &Path, reply: &str) -> (RagEngine, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let engine = RagEngine::with_clients(
        &scenario_config(root),
        Box::new(HashedEmbeddingClient::new(DIMENSION)),
        Box::new(ScriptedChat {
            reply: reply.to_string(),
            calls: calls.clone(),
        }),
    )
    .await
    .expect("engine");
    (engine, calls)
}

fn visitor_guide(len: usize) -> String {
    "Visitors may enter the museum garden between nine and five. "
        .repeat(len / 20)
        .chars()
        .take(len)
        .collect()
}

#[tokio::test]
async fn scenario_a_plain_text_ingestion_persists_several_chunks() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (engine, _) = scenario_engine(dir.path(), "unused").await;
    let guide = visitor_guide(3000);
    assert_eq!(guide.chars().count(), 3000);

    let before = engine.count().await;
    let report = IngestReport::from_result(engine.ingest_upload("guide.txt", guide.as_bytes()).await);

    assert_eq!(report.status, Status::Success);
    let added = report.chunks_added.expect("chunks added");
    assert!(added >= 3, "expected at least 3 chunks, got {added}");
    assert_eq!(engine.count().await, before + added);
    let prefix = format!(
        "Successfully added {added} chunks from {}",
        dir.path().join("uploads").display()
    );
    assert!(report.message.starts_with(&prefix), "{}", report.message);
    assert!(report.message.ends_with("-guide.txt"), "{}", report.message);
}

#[tokio::test]
async fn scenario_b_empty_store_returns_greeting() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (engine, calls) = scenario_engine(dir.path(), "should never be sent").await;

    let report = AnswerReport::from_result(engine.answer_question("What time is it?", None).await);

    assert_eq!(report.status, Status::Success);
    assert!(report.answer.starts_with("Hi! I'm Jenny, your AI assistant."));
    assert!(report.answer.contains("I don't have any documents loaded yet"));
    assert!(report.sources.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn scenario_c_unsupported_upload_fails_without_mutation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (engine, _) = scenario_engine(dir.path(), "unused").await;
    engine
        .ingest_upload("guide.txt", visitor_guide(500).as_bytes())
        .await
        .expect("seed document");
    let before = engine.count().await;

    let report = IngestReport::from_result(engine.ingest_upload("visitors.csv", b"name,time\nA,9").await);

    assert_eq!(report.status, Status::Failed);
    assert_eq!(report.error_kind, Some(ErrorKind::UnsupportedFormat));
    assert_eq!(report.chunks_added, None);
    assert_eq!(engine.count().await, before);
    let saved = std::fs::read_dir(dir.path().join("uploads"))
        .expect("uploads dir")
        .count();
    assert_eq!(saved, 1, "only the seed document is saved");
}

#[tokio::test]
async fn scenario_d_model_admitting_no_information_gets_friendly_refusal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let raw = "There is no information about parking in these documents.";
    let (engine, calls) = scenario_engine(dir.path(), raw).await;
    engine
        .ingest_upload("guide.txt", visitor_guide(1500).as_bytes())
        .await
        .expect("seed document");

    let answer = engine
        .answer_question("Where can I park?", None)
        .await
        .expect("answer");

    let reference = AnswerSynthesizer::new(
        Box::new(ScriptedChat {
            reply: String::new(),
            calls: Arc::default(),
        }),
        "Jenny",
        0.0,
    );
    assert_eq!(answer.outcome, AnswerOutcome::Refused);
    assert_eq!(answer.text, reference.refusal_message());
    assert_ne!(answer.text, raw);
    assert!(!answer.sources.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.metrics_snapshot().guardrail_refusals, 1);
}

#[tokio::test]
async fn grounded_answer_returns_previews_of_retrieved_chunks() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (engine, _) = scenario_engine(dir.path(), "The garden is open from nine to five.").await;
    engine
        .ingest_upload("guide.txt", visitor_guide(3000).as_bytes())
        .await
        .expect("seed document");

    let report = AnswerReport::from_result(engine.answer_question("When is the garden open?", Some(2)).await);

    assert_eq!(report.status, Status::Success);
    assert_eq!(report.answer, "The garden is open from nine to five.");
    assert_eq!(report.sources.len(), 2);
    for source in &report.sources {
        assert!(source.content.ends_with("..."));
        assert!(source.content.chars().count() <= 203);
        assert_eq!(source.metadata["content_type"], "text/plain");
        assert!(source.metadata.contains_key("chunk_hash"));
    }
}

#[tokio::test]
async fn stored_chunks_survive_reopening_the_engine() {
    let dir = tempfile::tempdir().expect("tempdir");
    let added = {
        let (engine, _) = scenario_engine(dir.path(), "unused").await;
        engine
            .ingest_upload("guide.txt", visitor_guide(2500).as_bytes())
            .await
            .expect("ingest")
            .chunks_added
    };

    let (reopened, calls) = scenario_engine(dir.path(), "Nine to five.").await;
    assert_eq!(reopened.count().await, added);

    let answer = reopened
        .answer_question("Opening hours?", None)
        .await
        .expect("answer");
    assert_eq!(answer.outcome, AnswerOutcome::Generated);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn search_results_are_ranked_and_bounded_by_k() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = VectorStore::open(
        dir.path(),
        "ranking",
        Box::new(HashedEmbeddingClient::new(DIMENSION)),
    )
    .await
    .expect("store");

    let texts = [
        "The cafe opens at eight in the morning.",
        "Parking is free for visitors on weekends.",
        "The museum garden closes at five.",
        "Guided tours start every hour on the hour.",
        "Children under twelve enter for free.",
    ];
    let batch = texts
        .iter()
        .map(|text| NewRecord {
            text: text.to_string(),
            metadata: Metadata::new(),
        })
        .collect();
    assert_eq!(store.add(batch).await.expect("add"), texts.len());

    for k in 1..=7 {
        let hits = store.search(texts[2], k).await.expect("search");
        assert!(hits.len() <= k);
        assert_eq!(hits.len(), k.min(texts.len()));
        assert_eq!(hits[0].text, texts[2]);
        assert!(
            hits.windows(2).all(|pair| pair[0].score >= pair[1].score),
            "scores must be non-increasing"
        );
    }
}
