//! Configuration types and YAML loader.
//!
//! Resolution order for the config file: an explicit path, the
//! `HOLOCRON_CONFIG` environment variable, then `config/holocron.yaml`.
//! Credentials may be supplied or overridden through environment
//! variables so they stay out of checked-in files. Validation happens at
//! load time; a bad config never reaches the pipeline.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use holocron_domain::constants::{
    BATCH_TOKEN_LIMIT, CHECKPOINT_BATCH_SIZE, DEFAULT_EMBEDDING_MODEL, EMBEDDING_DIMENSION,
    MANAGED_UPSERT_BATCH_SIZE, MAX_CHUNK_TOKENS, MAX_ITEM_RETRIES, MAX_RESULTS, NUM_WORKERS,
    REQUESTS_PER_MINUTE, UPLOAD_BATCH_SIZE,
};
use holocron_domain::{Error, Result};

const REDACTED: &str = "REDACTED";
const DEFAULT_CONFIG_PATH: &str = "config/holocron.yaml";

/// Which vector backend serves this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// External managed vector index
    Managed,
    /// SQL + pgvector store
    Sql,
}

/// Embedding API configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider name (`openai` or `null` for offline runs)
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    /// Model identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// API key; `HOLOCRON_EMBEDDING_API_KEY` overrides
    #[serde(default)]
    pub api_key: Option<String>,
    /// API base URL
    #[serde(default)]
    pub base_url: Option<String>,
    /// Output vector dimension, must match the backend index
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    /// Max total tokens per embedding request
    #[serde(default = "default_batch_token_limit")]
    pub batch_token_limit: usize,
    /// Max concurrent embedding requests
    #[serde(default = "default_max_parallel_requests")]
    pub max_parallel_requests: usize,
}

impl fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| REDACTED))
            .field("base_url", &self.base_url)
            .field("dimensions", &self.dimensions)
            .field("batch_token_limit", &self.batch_token_limit)
            .field("max_parallel_requests", &self.max_parallel_requests)
            .finish()
    }
}

/// Vector store configuration; which half applies depends on `backend`.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct VectorStoreConfig {
    /// Managed index API key; `HOLOCRON_VECTOR_API_KEY` overrides
    #[serde(default)]
    pub api_key: Option<String>,
    /// Managed index base URL
    #[serde(default)]
    pub index_url: Option<String>,
    /// Postgres connection string; `HOLOCRON_DATABASE_URL` overrides
    #[serde(default)]
    pub database_url: Option<String>,
    /// Table name for the SQL backend
    #[serde(default = "default_table")]
    pub table: String,
    /// Per-request upsert batch size
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,
}

impl fmt::Debug for VectorStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorStoreConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| REDACTED))
            .field("index_url", &self.index_url)
            .field("database_url", &self.database_url.as_ref().map(|_| REDACTED))
            .field("table", &self.table)
            .field("upsert_batch_size", &self.upsert_batch_size)
            .finish()
    }
}

/// Ingest pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Token budget per chunk
    #[serde(default = "default_max_chunk_tokens")]
    pub max_chunk_tokens: usize,
    /// Concurrent item workers
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    /// Outbound requests per minute
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: usize,
    /// Records buffered before an upsert flush
    #[serde(default = "default_upload_batch_size")]
    pub upload_batch_size: usize,
    /// Completions between progress checkpoints
    #[serde(default = "default_checkpoint_batch_size")]
    pub checkpoint_batch_size: usize,
    /// Attempts before an item is marked done with its error
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Directory for parquet staging shards
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_chunk_tokens: MAX_CHUNK_TOKENS,
            num_workers: NUM_WORKERS,
            requests_per_minute: REQUESTS_PER_MINUTE,
            upload_batch_size: UPLOAD_BATCH_SIZE,
            checkpoint_batch_size: CHECKPOINT_BATCH_SIZE,
            max_retries: MAX_ITEM_RETRIES,
            staging_dir: default_staging_dir(),
        }
    }
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RetrievalConfig {
    /// Top-k for searches
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Similarity floor; backend default applies when absent
    #[serde(default)]
    pub similarity_threshold: Option<f64>,
}

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Vector backend selection
    pub backend: BackendKind,
    /// Embedding API settings
    #[serde(default = "default_embedding_config")]
    pub embedding: EmbeddingConfig,
    /// Vector store settings
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    /// Ingest pipeline settings
    #[serde(default)]
    pub ingest: IngestConfig,
    /// Retrieval settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

fn default_embedding_provider() -> String {
    "openai".to_owned()
}
fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_owned()
}
fn default_dimensions() -> usize {
    EMBEDDING_DIMENSION
}
fn default_batch_token_limit() -> usize {
    BATCH_TOKEN_LIMIT
}
fn default_max_parallel_requests() -> usize {
    holocron_domain::constants::MAX_PARALLEL_REQUESTS
}
fn default_table() -> String {
    "holocron_knowledge".to_owned()
}
fn default_upsert_batch_size() -> usize {
    MANAGED_UPSERT_BATCH_SIZE
}
fn default_max_chunk_tokens() -> usize {
    MAX_CHUNK_TOKENS
}
fn default_num_workers() -> usize {
    NUM_WORKERS
}
fn default_requests_per_minute() -> usize {
    REQUESTS_PER_MINUTE
}
fn default_upload_batch_size() -> usize {
    UPLOAD_BATCH_SIZE
}
fn default_checkpoint_batch_size() -> usize {
    CHECKPOINT_BATCH_SIZE
}
fn default_max_retries() -> u32 {
    MAX_ITEM_RETRIES
}
fn default_staging_dir() -> PathBuf {
    PathBuf::from("data/staging")
}
fn default_max_results() -> usize {
    MAX_RESULTS
}
fn default_embedding_config() -> EmbeddingConfig {
    EmbeddingConfig {
        provider: default_embedding_provider(),
        model: default_embedding_model(),
        api_key: None,
        base_url: None,
        dimensions: default_dimensions(),
        batch_token_limit: default_batch_token_limit(),
        max_parallel_requests: default_max_parallel_requests(),
    }
}

impl AppConfig {
    /// Load, apply environment overrides, and validate.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no file is found, parsing
    /// fails, or validation rejects a value.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_path(explicit_path)?;
        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::config(format!("reading {}: {e}", path.display())))?;
        let mut config: AppConfig = serde_yaml::from_str(&content)
            .map_err(|e| Error::config(format!("parsing {}: {e}", path.display())))?;
        config.apply_env_overrides();
        config.validate()?;
        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    fn resolve_path(explicit_path: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit_path {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(Error::ConfigMissing(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }
        if let Ok(path) = env::var("HOLOCRON_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(path);
            }
            return Err(Error::ConfigMissing(format!(
                "HOLOCRON_CONFIG points at a missing file: {}",
                path.display()
            )));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            Ok(default)
        } else {
            Err(Error::ConfigMissing(format!(
                "no configuration file; create {DEFAULT_CONFIG_PATH} or set HOLOCRON_CONFIG"
            )))
        }
    }

    /// Credentials from the environment win over the file.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = env::var("HOLOCRON_EMBEDDING_API_KEY") {
            self.embedding.api_key = Some(key);
        }
        if let Ok(key) = env::var("HOLOCRON_VECTOR_API_KEY") {
            self.vector_store.api_key = Some(key);
        }
        if let Ok(url) = env::var("HOLOCRON_DATABASE_URL") {
            self.vector_store.database_url = Some(url);
        }
    }

    /// Fail fast on values the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns the first invalid value found.
    pub fn validate(&self) -> Result<()> {
        if self.embedding.dimensions == 0 {
            return Err(Error::ConfigInvalid {
                key: "embedding.dimensions".to_owned(),
                message: "must be positive".to_owned(),
            });
        }
        if self.ingest.num_workers == 0 {
            return Err(Error::ConfigInvalid {
                key: "ingest.num_workers".to_owned(),
                message: "must be positive".to_owned(),
            });
        }
        if self.ingest.requests_per_minute == 0 {
            return Err(Error::ConfigInvalid {
                key: "ingest.requests_per_minute".to_owned(),
                message: "must be positive".to_owned(),
            });
        }
        if let Some(threshold) = self.retrieval.similarity_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(Error::ConfigInvalid {
                    key: "retrieval.similarity_threshold".to_owned(),
                    message: format!("{threshold} is outside [0, 1]"),
                });
            }
        }
        if self.embedding.provider == "openai" && self.embedding.api_key.is_none() {
            return Err(Error::ConfigMissing(
                "embedding.api_key (or HOLOCRON_EMBEDDING_API_KEY)".to_owned(),
            ));
        }
        match self.backend {
            BackendKind::Managed => {
                if self.vector_store.index_url.is_none() {
                    return Err(Error::ConfigMissing("vector_store.index_url".to_owned()));
                }
                if self.vector_store.api_key.is_none() {
                    return Err(Error::ConfigMissing(
                        "vector_store.api_key (or HOLOCRON_VECTOR_API_KEY)".to_owned(),
                    ));
                }
            }
            BackendKind::Sql => {
                if self.vector_store.database_url.is_none() {
                    return Err(Error::ConfigMissing(
                        "vector_store.database_url (or HOLOCRON_DATABASE_URL)".to_owned(),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        "backend: sql\n\
         embedding:\n\
         \x20 provider: \"null\"\n\
         \x20 dimensions: 64\n\
         vector_store:\n\
         \x20 database_url: postgres://localhost/holocron\n"
    }

    #[test]
    fn loads_minimal_config_with_defaults() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        let path = dir.path().join("holocron.yaml");
        std::fs::write(&path, minimal_yaml()).unwrap_or_else(|e| panic!("{e}"));

        let config = AppConfig::load(Some(&path)).unwrap_or_else(|e| panic!("load: {e}"));
        assert_eq!(config.backend, BackendKind::Sql);
        assert_eq!(config.embedding.dimensions, 64);
        assert_eq!(config.embedding.model, "text-embedding-ada-002");
        assert_eq!(config.ingest.num_workers, 3);
        assert_eq!(config.ingest.requests_per_minute, 60);
        assert_eq!(config.retrieval.max_results, 5);
        assert_eq!(config.vector_store.table, "holocron_knowledge");
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let result = AppConfig::load(Some(Path::new("/nonexistent/holocron.yaml")));
        assert!(matches!(result, Err(Error::ConfigMissing(_))));
    }

    #[test]
    fn managed_backend_requires_index_credentials() {
        let yaml = "backend: managed\n\
                    embedding:\n\
                    \x20 provider: \"null\"\n";
        let mut config: AppConfig =
            serde_yaml::from_str(yaml).unwrap_or_else(|e| panic!("parse: {e}"));
        assert!(config.validate().is_err());

        config.vector_store.index_url = Some("https://index.example".to_owned());
        config.vector_store.api_key = Some("pk".to_owned());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn openai_provider_requires_an_api_key() {
        let yaml = "backend: sql\n\
                    embedding:\n\
                    \x20 provider: openai\n\
                    vector_store:\n\
                    \x20 database_url: postgres://localhost/h\n";
        let mut config: AppConfig =
            serde_yaml::from_str(yaml).unwrap_or_else(|e| panic!("parse: {e}"));
        assert!(config.validate().is_err());
        config.embedding.api_key = Some("sk-test".to_owned());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn threshold_outside_unit_interval_is_rejected() {
        let mut config: AppConfig =
            serde_yaml::from_str(minimal_yaml()).unwrap_or_else(|e| panic!("parse: {e}"));
        config.retrieval.similarity_threshold = Some(1.5);
        assert!(config.validate().is_err());
        config.retrieval.similarity_threshold = Some(0.3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn debug_output_redacts_credentials() {
        let mut config: AppConfig =
            serde_yaml::from_str(minimal_yaml()).unwrap_or_else(|e| panic!("parse: {e}"));
        config.embedding.api_key = Some("sk-secret".to_owned());
        config.vector_store.api_key = Some("pk-secret".to_owned());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("pk-secret"));
        assert!(debug.contains("REDACTED"));
    }
}
