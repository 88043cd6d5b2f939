use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the Ragline service.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// API key used for OpenAI-compatible providers.
    pub openai_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API.
    pub openai_base_url: String,
    /// Base URL of the Ollama runtime.
    pub ollama_url: String,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of vectors produced by the `hashed` provider.
    pub embedding_dimension: usize,
    /// Number of texts sent per embedding request.
    pub embedding_batch_size: usize,
    /// Chat provider used for answer synthesis.
    pub llm_provider: LlmProvider,
    /// Chat model identifier passed to the provider.
    pub llm_model: String,
    /// Sampling temperature for answer synthesis.
    pub llm_temperature: f32,
    /// Timeout applied to embedding and chat requests, in seconds.
    pub provider_timeout_secs: u64,
    /// Timeout applied to web page loads, in seconds.
    pub web_timeout_secs: u64,
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks.
    pub chunk_overlap: usize,
    /// Directory holding the durable vector store.
    pub vector_store_dir: PathBuf,
    /// Name of the single logical collection.
    pub vector_store_collection: String,
    /// Directory receiving uploaded files.
    pub upload_dir: PathBuf,
    /// Largest accepted upload or local file, in bytes.
    pub max_upload_bytes: u64,
    /// Number of passages retrieved when a request omits `k`.
    pub search_default_k: usize,
    /// Upper bound applied to requested `k`.
    pub search_max_k: usize,
    /// Persona name used in prompts and canned replies.
    pub assistant_name: String,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Hosted OpenAI (or compatible) embeddings API.
    OpenAI,
    /// Local Ollama runtime.
    Ollama,
    /// Deterministic offline embeddings derived from text bytes.
    Hashed,
}

/// Supported chat backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Hosted OpenAI (or compatible) chat completions API.
    OpenAI,
    /// Local Ollama runtime.
    Ollama,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let embedding_provider = load_env_parsed("EMBEDDING_PROVIDER", EmbeddingProvider::OpenAI)?;
        let llm_provider = load_env_parsed("LLM_PROVIDER", LlmProvider::OpenAI)?;
        let openai_api_key =
            load_env_optional("OPENAI_API_KEY").or_else(|| load_env_optional("OPENAI_KEY"));

        let needs_openai = embedding_provider == EmbeddingProvider::OpenAI
            || llm_provider == LlmProvider::OpenAI;
        if needs_openai && openai_api_key.is_none() {
            return Err(ConfigError::MissingVariable("OPENAI_API_KEY".into()));
        }

        let default_embedding_model = match embedding_provider {
            EmbeddingProvider::Ollama => "nomic-embed-text",
            EmbeddingProvider::OpenAI | EmbeddingProvider::Hashed => "text-embedding-3-small",
        };
        let default_llm_model = match llm_provider {
            LlmProvider::OpenAI => "gpt-4o-mini",
            LlmProvider::Ollama => "llama3.1",
        };

        let config = Self {
            openai_api_key,
            openai_base_url: load_env_or("OPENAI_BASE_URL", "https://api.openai.com"),
            ollama_url: load_env_or("OLLAMA_URL", "http://127.0.0.1:11434"),
            embedding_provider,
            embedding_model: load_env_or("EMBEDDING_MODEL", default_embedding_model),
            embedding_dimension: load_env_parsed("EMBEDDING_DIMENSION", 384)?,
            embedding_batch_size: load_env_parsed("EMBEDDING_BATCH_SIZE", 64)?,
            llm_provider,
            llm_model: load_env_or("LLM_MODEL", default_llm_model),
            llm_temperature: load_env_parsed("LLM_TEMPERATURE", 0.7)?,
            provider_timeout_secs: load_env_parsed("PROVIDER_TIMEOUT_SECS", 60)?,
            web_timeout_secs: load_env_parsed("WEB_TIMEOUT_SECS", 30)?,
            chunk_size: load_env_parsed("CHUNK_SIZE", 1000)?,
            chunk_overlap: load_env_parsed("CHUNK_OVERLAP", 200)?,
            vector_store_dir: load_env_or("VECTOR_STORE_DIR", "./vectorstore").into(),
            vector_store_collection: load_env_or("VECTOR_STORE_COLLECTION", "documents"),
            upload_dir: load_env_or("UPLOAD_DIR", "./uploads").into(),
            max_upload_bytes: load_env_parsed("MAX_UPLOAD_BYTES", 50 * 1024 * 1024)?,
            search_default_k: load_env_parsed("SEARCH_DEFAULT_K", 4)?,
            search_max_k: load_env_parsed("SEARCH_MAX_K", 50)?,
            assistant_name: load_env_or("ASSISTANT_NAME", "Jenny"),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidValue("CHUNK_SIZE".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::InvalidValue("CHUNK_OVERLAP".into()));
        }
        if self.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()));
        }
        if self.embedding_batch_size == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_BATCH_SIZE".into()));
        }
        if self.search_max_k == 0 {
            return Err(ConfigError::InvalidValue("SEARCH_MAX_K".into()));
        }
        if self.search_default_k == 0 || self.search_default_k > self.search_max_k {
            return Err(ConfigError::InvalidValue("SEARCH_DEFAULT_K".into()));
        }
        if self.vector_store_collection.trim().is_empty()
            || self.vector_store_collection.contains(['/', '\\'])
        {
            return Err(ConfigError::InvalidValue("VECTOR_STORE_COLLECTION".into()));
        }
        Ok(())
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn load_env_parsed<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            "hashed" => Ok(Self::Hashed),
            _ => Err(()),
        }
    }
}

impl FromStr for LlmProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        store_dir = %config.vector_store_dir.display(),
        collection = %config.vector_store_collection,
        server_port = ?config.server_port,
        embedding_provider = ?config.embedding_provider,
        llm_provider = ?config.llm_provider,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
