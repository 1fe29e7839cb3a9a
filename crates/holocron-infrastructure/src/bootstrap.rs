//! Provider factory and service wiring.
//!
//! The only place that knows which concrete providers exist. Everything
//! is constructed here and handed out as `Arc<dyn ...>` ports; pools and
//! clients are created once at startup and shared.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use holocron_application::pipeline::RateLimiter;
use holocron_application::{
    IngestOptions, IngestService, InstrumentedEmbeddingProvider, RetrievalService,
};
use holocron_domain::constants::{MANAGED_SIMILARITY_THRESHOLD, SQL_SIMILARITY_THRESHOLD};
use holocron_domain::ports::{
    EmbeddingProvider, PageFetcher, ProgressStore, VectorStager, VectorStoreProvider,
};
use holocron_domain::{Error, Result};
use holocron_providers::embedding::OpenAiEmbeddingProvider;
use holocron_providers::vector_store::{ManagedIndexConfig, PgVectorConfig};
use holocron_providers::{
    CsvProgressStore, ManagedIndexProvider, NullEmbeddingProvider, ParquetStager, PgVectorProvider,
    WikiCrawler,
};
use holocron_wiki::{Chunker, ChunkerOptions, TokenCounter};

use crate::config::{AppConfig, BackendKind};

/// Build the configured embedding provider.
///
/// # Errors
///
/// Returns an error for unknown providers or missing credentials.
pub fn build_embedding_provider(config: &AppConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider = build_raw_embedding_provider(config)?;
    Ok(Arc::new(InstrumentedEmbeddingProvider::new(provider)))
}

fn build_raw_embedding_provider(config: &AppConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.embedding.provider.as_str() {
        "openai" => {
            let api_key = config
                .embedding
                .api_key
                .clone()
                .ok_or_else(|| Error::ConfigMissing("embedding.api_key".to_owned()))?;
            let base_url = config
                .embedding
                .base_url
                .clone()
                .unwrap_or_else(|| holocron_providers::constants::OPENAI_API_BASE_URL.to_owned());
            let provider = OpenAiEmbeddingProvider::new(
                holocron_providers::embedding::OpenAiEmbeddingConfig {
                    base_url,
                    api_key,
                    model: config.embedding.model.clone(),
                    dimensions: config.embedding.dimensions,
                    batch_token_limit: config.embedding.batch_token_limit,
                    max_parallel_requests: config.embedding.max_parallel_requests,
                },
            )?;
            Ok(Arc::new(provider))
        }
        "null" => Ok(Arc::new(NullEmbeddingProvider::new(
            config.embedding.dimensions,
        ))),
        other => Err(Error::ConfigInvalid {
            key: "embedding.provider".to_owned(),
            message: format!("unknown provider '{other}'"),
        }),
    }
}

/// Build the vector store selected by the `backend` flag.
///
/// # Errors
///
/// Returns an error for missing credentials or an unreachable store.
pub async fn build_vector_store(config: &AppConfig) -> Result<Arc<dyn VectorStoreProvider>> {
    match config.backend {
        BackendKind::Managed => {
            let provider = ManagedIndexProvider::new(ManagedIndexConfig {
                index_url: config
                    .vector_store
                    .index_url
                    .clone()
                    .ok_or_else(|| Error::ConfigMissing("vector_store.index_url".to_owned()))?,
                api_key: config
                    .vector_store
                    .api_key
                    .clone()
                    .ok_or_else(|| Error::ConfigMissing("vector_store.api_key".to_owned()))?,
                dimensions: config.embedding.dimensions,
            })?;
            info!("vector backend: managed index");
            Ok(Arc::new(provider))
        }
        BackendKind::Sql => {
            let provider = PgVectorProvider::connect(PgVectorConfig {
                database_url: config
                    .vector_store
                    .database_url
                    .clone()
                    .ok_or_else(|| Error::ConfigMissing("vector_store.database_url".to_owned()))?,
                table: config.vector_store.table.clone(),
                dimensions: config.embedding.dimensions,
            })
            .await?;
            provider.ensure_schema().await?;
            info!(table = %config.vector_store.table, "vector backend: sql+pgvector");
            Ok(Arc::new(provider))
        }
    }
}

/// Backend-specific default similarity floor, unless configured.
#[must_use]
pub fn default_similarity_threshold(config: &AppConfig) -> f64 {
    config.retrieval.similarity_threshold.unwrap_or(match config.backend {
        BackendKind::Managed => MANAGED_SIMILARITY_THRESHOLD,
        BackendKind::Sql => SQL_SIMILARITY_THRESHOLD,
    })
}

/// Wire the retrieval service.
///
/// # Errors
///
/// Returns an error when a provider cannot be built.
pub async fn build_retrieval_service(config: &AppConfig) -> Result<RetrievalService> {
    let embedding = build_embedding_provider(config)?;
    let vector_store = build_vector_store(config).await?;
    Ok(RetrievalService::new(
        embedding,
        vector_store,
        Some(config.retrieval.max_results),
        default_similarity_threshold(config),
    ))
}

/// Wire the full ingest pipeline for a URL-driven run.
///
/// # Errors
///
/// Returns an error when a provider cannot be built or the progress
/// store cannot be opened.
pub async fn build_ingest_service(
    config: &AppConfig,
    status_path: &Path,
    source_csv: Option<&Path>,
    num_workers: Option<usize>,
    requests_per_minute: Option<usize>,
    checkpoint_path: Option<std::path::PathBuf>,
) -> Result<Arc<IngestService>> {
    let embedding = build_embedding_provider(config)?;
    let vector_store = build_vector_store(config).await?;
    let progress: Arc<dyn ProgressStore> =
        Arc::new(CsvProgressStore::open(status_path, source_csv)?);
    let stager: Arc<dyn VectorStager> =
        Arc::new(ParquetStager::new(config.ingest.staging_dir.clone()));
    let rate_limiter = Arc::new(RateLimiter::new(
        requests_per_minute.unwrap_or(config.ingest.requests_per_minute),
    ));
    // The orchestrator owns the rate-limit token per item; the crawler is
    // built without its own limiter so a fetch is charged once.
    let fetcher: Arc<dyn PageFetcher> = Arc::new(WikiCrawler::new(None)?);

    let counter = TokenCounter::new()?;
    let chunker = Arc::new(Chunker::with_options(
        counter,
        ChunkerOptions {
            max_chunk_tokens: config.ingest.max_chunk_tokens,
            repeat_section_header: true,
        },
    ));

    let options = IngestOptions {
        num_workers: num_workers.unwrap_or(config.ingest.num_workers),
        upload_batch_size: config.ingest.upload_batch_size,
        upsert_batch_size: config.vector_store.upsert_batch_size,
        checkpoint_batch_size: config.ingest.checkpoint_batch_size,
        max_retries: config.ingest.max_retries,
        checkpoint_path,
        ..IngestOptions::default()
    };

    Ok(Arc::new(IngestService::new(
        fetcher,
        embedding,
        vector_store,
        progress,
        Some(stager),
        chunker,
        rate_limiter,
        options,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendKind, RetrievalConfig};

    fn null_config(backend: BackendKind) -> AppConfig {
        let yaml = "backend: sql\n\
                    embedding:\n\
                    \x20 provider: \"null\"\n\
                    \x20 dimensions: 16\n\
                    vector_store:\n\
                    \x20 database_url: postgres://localhost/holocron\n";
        let mut config: AppConfig =
            serde_yaml::from_str(yaml).unwrap_or_else(|e| panic!("parse: {e}"));
        config.backend = backend;
        config
    }

    #[test]
    fn null_embedding_provider_is_buildable_offline() {
        let provider = build_embedding_provider(&null_config(BackendKind::Sql))
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(provider.dimensions(), 16);
        assert_eq!(provider.provider_name(), "null");
    }

    #[test]
    fn unknown_embedding_provider_is_rejected() {
        let mut config = null_config(BackendKind::Sql);
        config.embedding.provider = "telepathy".to_owned();
        assert!(build_embedding_provider(&config).is_err());
    }

    #[test]
    fn threshold_defaults_follow_the_backend() {
        let sql = null_config(BackendKind::Sql);
        assert!((default_similarity_threshold(&sql) - SQL_SIMILARITY_THRESHOLD).abs() < f64::EPSILON);

        let managed = null_config(BackendKind::Managed);
        assert!(
            (default_similarity_threshold(&managed) - MANAGED_SIMILARITY_THRESHOLD).abs()
                < f64::EPSILON
        );

        let mut tuned = null_config(BackendKind::Sql);
        tuned.retrieval = RetrievalConfig {
            max_results: 5,
            similarity_threshold: Some(0.42),
        };
        assert!((default_similarity_threshold(&tuned) - 0.42).abs() < f64::EPSILON);
    }
}
