use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{EmbeddingClient, EmbeddingClientError, ensure_count, status_error, transport_error};

/// Embedding client for a local Ollama runtime (`/api/embed`).
pub struct OllamaEmbeddingClient {
    http: Client,
    base_url: String,
    model: String,
    batch_size: usize,
}

impl OllamaEmbeddingClient {
    /// Create a client against the Ollama runtime at `base_url`.
    pub fn new(http: Client, base_url: &str, model: &str, batch_size: usize) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            batch_size: batch_size.max(1),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embed", self.base_url)
    }
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        tracing::debug!(
            provider = "Ollama",
            model = %self.model,
            texts = texts.len(),
            "Generating embeddings"
        );

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let payload = json!({
                "model": self.model,
                "input": batch,
            });

            let response = self
                .http
                .post(self.endpoint())
                .json(&payload)
                .send()
                .await
                .map_err(|error| transport_error("Ollama", error))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(status_error(status, body));
            }

            let body: OllamaEmbedResponse = response.json().await.map_err(|error| {
                EmbeddingClientError::InvalidResponse(format!(
                    "failed to decode Ollama response: {error}"
                ))
            })?;
            ensure_count(batch.len(), body.embeddings.len())?;
            embeddings.extend(body.embeddings);
        }
        Ok(embeddings)
    }
}
