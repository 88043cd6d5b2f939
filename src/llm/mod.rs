//! Chat-completion providers used to synthesize answers.

mod ollama;
mod openai;

pub use ollama::OllamaChatClient;
pub use openai::OpenAiChatClient;

use crate::config::{Config, LlmProvider};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced while requesting a completion.
#[derive(Debug, Error)]
pub enum ChatClientError {
    /// Provider was unreachable or the request timed out.
    #[error("Chat provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider rejected the configured credentials.
    #[error("Chat provider rejected credentials: {0}")]
    Unauthorized(String),
    /// Provider throttled the request.
    #[error("Chat provider rate limited the request: {0}")]
    RateLimited(String),
    /// Provider returned an error response.
    #[error("Failed to generate completion: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
    /// Client could not be constructed from configuration.
    #[error("Chat client misconfigured: {0}")]
    Misconfigured(String),
}

/// Single-turn completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// System instruction constraining the model.
    pub system: String,
    /// User message carrying context and question.
    pub user: String,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Interface implemented by chat-completion providers.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Request a completion and return the assistant's text.
    async fn complete(&self, request: ChatRequest) -> Result<String, ChatClientError>;
}

/// Build the chat client selected by configuration.
pub fn build_chat_client(config: &Config) -> Result<Box<dyn ChatClient>, ChatClientError> {
    let http = Client::builder()
        .user_agent("ragline/chat")
        .timeout(Duration::from_secs(config.provider_timeout_secs))
        .build()
        .map_err(|error| ChatClientError::Misconfigured(error.to_string()))?;

    match config.llm_provider {
        LlmProvider::OpenAI => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                ChatClientError::Misconfigured("OPENAI_API_KEY is not set".into())
            })?;
            Ok(Box::new(OpenAiChatClient::new(
                http,
                &config.openai_base_url,
                api_key,
                &config.llm_model,
            )))
        }
        LlmProvider::Ollama => Ok(Box::new(OllamaChatClient::new(
            http,
            &config.ollama_url,
            &config.llm_model,
        ))),
    }
}

fn status_error(provider: &str, status: StatusCode, body: String) -> ChatClientError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ChatClientError::Unauthorized(format!("{provider} returned {status}"))
        }
        StatusCode::TOO_MANY_REQUESTS => ChatClientError::RateLimited(body),
        StatusCode::NOT_FOUND => {
            ChatClientError::ProviderUnavailable(format!("{provider} returned 404: {body}"))
        }
        _ => ChatClientError::GenerationFailed(format!("{provider} returned {status}: {body}")),
    }
}
