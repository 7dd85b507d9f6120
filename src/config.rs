use std::env;
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

/// Runtime configuration for the sync service.
#[derive(Debug)]
pub struct Config {
    /// Base URL of the CMS API host.
    pub cms_base_url: String,
    /// Stack API key sent with every CMS request.
    pub cms_api_key: String,
    /// Delivery token used for published-entry reads.
    pub cms_delivery_token: String,
    /// Management token required to enumerate content types.
    pub cms_management_token: Option<String>,
    /// Publish environment used to scope delivery reads and gate webhooks.
    pub cms_environment: Option<String>,
    /// Host URL of the managed vector index.
    pub index_host: String,
    /// API key for the vector index.
    pub index_api_key: String,
    /// Optional namespace isolating this deployment's records.
    pub index_namespace: Option<String>,
    /// Embedding backend used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Dimensionality every stored vector must have.
    pub embedding_dimension: usize,
    /// Number of embedding requests issued concurrently per batch.
    pub embed_batch_size: usize,
    /// API key for the hosted OpenAI embeddings API.
    pub openai_api_key: Option<String>,
    /// Model identifier passed to OpenAI.
    pub openai_embedding_model: String,
    /// Override for the OpenAI API base URL.
    pub openai_base_url: Option<String>,
    /// API key for the hosted Gemini embeddings API.
    pub gemini_api_key: Option<String>,
    /// Model identifier passed to Gemini.
    pub gemini_embedding_model: String,
    /// Override for the Gemini API base URL.
    pub gemini_base_url: Option<String>,
    /// Endpoint of the local embedding server.
    pub embedding_local_url: String,
    /// Shared secret verifying webhook deliveries; unset disables verification.
    pub webhook_secret: Option<String>,
    /// Number of nearest neighbors requested per search.
    pub search_top_k: usize,
    /// Minimum similarity score a search result must reach.
    pub search_min_score: f32,
    /// Character budget applied to extracted entry text.
    pub text_max_chars: usize,
    /// Page size used when enumerating entries during a full reindex.
    pub reindex_page_size: usize,
    /// Persistence path for the local vector mirror; unset keeps it in memory only.
    pub mirror_path: Option<String>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// Self-hosted embedding server reachable over HTTP.
    Local,
    /// Hosted OpenAI embeddings API.
    OpenAI,
    /// Hosted Gemini embeddings API.
    Gemini,
    /// Deterministic in-process mock for tests and offline development.
    Mock,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            cms_base_url: load_env("CMS_BASE_URL")?,
            cms_api_key: load_env("CMS_API_KEY")?,
            cms_delivery_token: load_env("CMS_DELIVERY_TOKEN")?,
            cms_management_token: load_env_optional("CMS_MANAGEMENT_TOKEN"),
            cms_environment: load_env_optional("CMS_ENVIRONMENT"),
            index_host: load_env("INDEX_HOST")?,
            index_api_key: load_env("INDEX_API_KEY")?,
            index_namespace: load_env_optional("INDEX_NAMESPACE"),
            embedding_provider: load_env("EMBEDDING_PROVIDER")?
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))?,
            embedding_dimension: parse_env("EMBEDDING_DIMENSION", None)?,
            embed_batch_size: parse_env("EMBED_BATCH_SIZE", Some(16))?,
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            openai_embedding_model: load_env_optional("OPENAI_EMBEDDING_MODEL")
                .unwrap_or_else(|| "text-embedding-3-small".to_string()),
            openai_base_url: load_env_optional("OPENAI_BASE_URL"),
            gemini_api_key: load_env_optional("GEMINI_API_KEY"),
            gemini_embedding_model: load_env_optional("GEMINI_EMBEDDING_MODEL")
                .unwrap_or_else(|| "text-embedding-004".to_string()),
            gemini_base_url: load_env_optional("GEMINI_BASE_URL"),
            embedding_local_url: load_env_optional("EMBEDDING_LOCAL_URL")
                .unwrap_or_else(|| "http://127.0.0.1:8000/embed".to_string()),
            webhook_secret: load_env_optional("WEBHOOK_SECRET"),
            search_top_k: parse_env("SEARCH_TOP_K", Some(5))?,
            search_min_score: parse_env("SEARCH_MIN_SCORE", Some(0.25))?,
            text_max_chars: parse_env("TEXT_MAX_CHARS", Some(20_000))?,
            reindex_page_size: parse_env("REINDEX_PAGE_SIZE", Some(100))?,
            mirror_path: Some(
                load_env_optional("MIRROR_PATH")
                    .unwrap_or_else(|| "vector-mirror.json".to_string()),
            ),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: Option<T>) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => default.ok_or_else(|| ConfigError::MissingVariable(key.to_string())),
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "openai" => Ok(Self::OpenAI),
            "gemini" => Ok(Self::Gemini),
            "mock" => Ok(Self::Mock),
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
        cms_base_url = %config.cms_base_url,
        index_host = %config.index_host,
        namespace = ?config.index_namespace,
        embedding_provider = ?config.embedding_provider,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
