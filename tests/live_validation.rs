use std::{env, sync::Once};

use ragline::{
    config, embedding,
    llm::{self, ChatRequest},
    processing::{AnswerOutcome, RagEngine},
};

static INIT: Once = Once::new();

fn set_default_env(key: &str, value: &str) {
    let needs_value = env::var(key).map(|v| v.trim().is_empty()).unwrap_or(true);
    if needs_value {
        // SAFETY: Tests run serially via Once and we intentionally mutate process env.
        unsafe {
            env::set_var(key, value);
        }
    }
}

fn init_config_once() {
    INIT.call_once(|| {
        set_default_env("EMBEDDING_PROVIDER", "ollama");
        set_default_env("EMBEDDING_MODEL", "nomic-embed-text");
        set_default_env("LLM_PROVIDER", "ollama");
        set_default_env("LLM_MODEL", "llama3.2");
        set_default_env("OLLAMA_URL", "http://127.0.0.1:11434");
        config::init_config();
    });
}

#[tokio::test]
#[ignore = "Requires a live embedding provider"]
async fn live_embedding_roundtrip() {
    init_config_once();
    let client = embedding::build_embedding_client(config::get_config())
        .expect("failed to build embedding client");
    let vectors = client
        .generate_embeddings(vec!["ragline live embedding".to_string()])
        .await
        .expect("failed to request embeddings from provider");
    assert_eq!(vectors.len(), 1, "expected embedding per input chunk");
    assert!(!vectors[0].is_empty(), "embedding must not be empty");
}

#[tokio::test]
#[ignore = "Requires a live chat provider"]
async fn live_chat_completion() {
    init_config_once();
    let client = llm::build_chat_client(config::get_config()).expect("failed to build chat client");
    let answer = client
        .complete(ChatRequest {
            system: "Reply with a single word.".into(),
            user: "Say hello.".into(),
            temperature: 0.0,
        })
        .await
        .expect("failed to request completion from provider");
    assert!(!answer.trim().is_empty(), "completion must not be empty");
}

#[tokio::test]
#[ignore = "Requires live embedding and chat providers"]
async fn live_ingest_then_ask() {
    init_config_once();
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = config::get_config().clone();
    config.vector_store_dir = dir.path().join("vectorstore");
    config.upload_dir = dir.path().join("uploads");

    let engine = RagEngine::from_config(&config).await.expect("engine");
    engine
        .ingest_upload(
            "hours.txt",
            b"The Riverside Museum is open from 9am to 5pm, Tuesday through Sunday.",
        )
        .await
        .expect("ingest");

    let answer = engine
        .answer_question("When is the Riverside Museum open?", None)
        .await
        .expect("answer");
    assert_ne!(answer.outcome, AnswerOutcome::EmptyStore);
    assert_eq!(answer.sources.len(), 1);
}
