use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Problems detected while reading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is absent.
    #[error("environment variable {0} is not set")]
    MissingVariable(String),
    /// An environment variable is present but unparsable.
    #[error("environment variable {0} holds an invalid value")]
    InvalidValue(String),
}

/// Runtime configuration for the docdex pipeline.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the Qdrant instance holding the collection.
    pub qdrant_url: String,
    /// Collection that receives the indexed chunks.
    pub qdrant_collection_name: String,
    /// API key sent with every Qdrant request, when the deployment needs one.
    pub qdrant_api_key: Option<String>,
    /// Backend that turns chunk text into vectors.
    pub embedding_provider: EmbeddingProvider,
    /// Model identifier handed to the embedding backend.
    pub embedding_model: String,
    /// Length of the vectors the backend produces.
    pub embedding_dimension: usize,
    /// Ollama base URL override; the default local port is used otherwise.
    pub ollama_url: Option<String>,
    /// Fixed per-chunk token budget, bypassing automatic sizing.
    pub text_splitter_chunk_size: Option<usize>,
    /// Token overlap carried between adjacent chunks.
    pub text_splitter_chunk_overlap: Option<usize>,
    /// Bias automatic chunk sizing toward smaller chunks.
    pub text_splitter_use_safe_defaults: bool,
    /// Drop chunks shorter than this many characters after trimming.
    pub text_splitter_min_chunk_chars: Option<usize>,
}

/// Embedding backends the pipeline can drive.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Deterministic offline encoder, useful without a running provider.
    Offline,
}

impl Config {
    /// Read and validate every setting from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let embedding_provider = require_var("EMBEDDING_PROVIDER")?
            .parse()
            .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".into()))?;
        let embedding_dimension = require_var("EMBEDDING_DIMENSION")?
            .parse()
            .map_err(|_| ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()))?;

        Ok(Self {
            qdrant_url: require_var("QDRANT_URL")?,
            qdrant_collection_name: require_var("QDRANT_COLLECTION_NAME")?,
            qdrant_api_key: optional_var("QDRANT_API_KEY"),
            embedding_provider,
            embedding_model: require_var("EMBEDDING_MODEL")?,
            embedding_dimension,
            ollama_url: optional_var("OLLAMA_URL"),
            text_splitter_chunk_size: optional_usize("TEXT_SPLITTER_CHUNK_SIZE")?,
            text_splitter_chunk_overlap: optional_usize("TEXT_SPLITTER_CHUNK_OVERLAP")?,
            text_splitter_use_safe_defaults: optional_var("TEXT_SPLITTER_USE_SAFE_DEFAULTS")
                .is_some_and(|value| flag_enabled(&value)),
            text_splitter_min_chunk_chars: optional_usize("TEXT_SPLITTER_MIN_CHUNK_CHARS")?,
        })
    }
}

fn require_var(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.into()))
}

fn optional_var(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn optional_usize(key: &str) -> Result<Option<usize>, ConfigError> {
    let Some(raw) = optional_var(key) else {
        return Ok(None);
    };
    raw.parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue(key.into()))
}

fn flag_enabled(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "offline" => Ok(Self::Offline),
            _ => Err(()),
        }
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Access the installed configuration.
///
/// Panics when called before [`init_config`]; the binary installs the
/// configuration before anything else runs.
pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("configuration accessed before init_config")
}

/// Load configuration from the environment (including any `.env` file) and
/// install it process-wide. Later calls return the already-installed value.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    if let Some(existing) = CONFIG.get() {
        return Ok(existing);
    }
    let config = Config::from_env()?;
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        embedding_provider = ?config.embedding_provider,
        embedding_model = %config.embedding_model,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}
