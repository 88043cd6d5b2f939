//! Embedding providers that turn text into fixed-dimension vectors.
//!
//! All providers preserve input order and split large inputs into batches. Failures are
//! classified so callers can tell credential problems from throttling or transport faults.

mod hashed;
mod ollama;
mod openai;

pub use hashed::HashedEmbeddingClient;
pub use ollama::OllamaEmbeddingClient;
pub use openai::OpenAiEmbeddingClient;

use crate::config::{Config, EmbeddingProvider};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider rejected the configured credentials.
    #[error("Embedding provider rejected credentials: {0}")]
    Unauthorized(String),
    /// Provider throttled the request.
    #[error("Embedding provider rate limited the request: {0}")]
    RateLimited(String),
    /// Provider could not be reached or the request timed out.
    #[error("Embedding provider unreachable: {0}")]
    Transport(String),
    /// Provider answered with an unexpected status.
    #[error("Embedding provider returned {status}: {body}")]
    Provider {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },
    /// Provider response could not be decoded or did not match the request.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
    /// Client could not be constructed from configuration.
    #[error("Embedding client misconfigured: {0}")]
    Misconfigured(String),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Build the embedding client selected by configuration.
pub fn build_embedding_client(
    config: &Config,
) -> Result<Box<dyn EmbeddingClient>, EmbeddingClientError> {
    let timeout = Duration::from_secs(config.provider_timeout_secs);
    match config.embedding_provider {
        EmbeddingProvider::OpenAI => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                EmbeddingClientError::Misconfigured("OPENAI_API_KEY is not set".into())
            })?;
            Ok(Box::new(OpenAiEmbeddingClient::new(
                http_client(timeout)?,
                &config.openai_base_url,
                api_key,
                &config.embedding_model,
                config.embedding_batch_size,
            )))
        }
        EmbeddingProvider::Ollama => Ok(Box::new(OllamaEmbeddingClient::new(
            http_client(timeout)?,
            &config.ollama_url,
            &config.embedding_model,
            config.embedding_batch_size,
        ))),
        EmbeddingProvider::Hashed => Ok(Box::new(HashedEmbeddingClient::new(
            config.embedding_dimension,
        ))),
    }
}

fn http_client(timeout: Duration) -> Result<Client, EmbeddingClientError> {
    Client::builder()
        .user_agent("ragline/embedding")
        .timeout(timeout)
        .build()
        .map_err(|error| EmbeddingClientError::Misconfigured(error.to_string()))
}

fn transport_error(provider: &str, error: reqwest::Error) -> EmbeddingClientError {
    if error.is_timeout() {
        EmbeddingClientError::Transport(format!("{provider} request timed out: {error}"))
    } else {
        EmbeddingClientError::Transport(format!("failed to reach {provider}: {error}"))
    }
}

/// Map a non-success status to the matching error class.
fn status_error(status: StatusCode, body: String) -> EmbeddingClientError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            EmbeddingClientError::Unauthorized(format!("{status}: {body}"))
        }
        StatusCode::TOO_MANY_REQUESTS => EmbeddingClientError::RateLimited(body),
        _ => EmbeddingClientError::Provider {
            status: status.as_u16(),
            body,
        },
    }
}

fn ensure_count(expected: usize, actual: usize) -> Result<(), EmbeddingClientError> {
    if expected == actual {
        Ok(())
    } else {
        Err(EmbeddingClientError::InvalidResponse(format!(
            "expected {expected} embeddings, received {actual}"
        )))
    }
}
