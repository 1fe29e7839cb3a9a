//! Query-side retrieval.
//!
//! Embed the query (one network call), search the active backend, return
//! the ranked passages unmodified. Stateless; safe to share and call
//! concurrently.

use std::sync::Arc;

use tracing::debug;

use holocron_domain::constants::MAX_RESULTS;
use holocron_domain::ports::{EmbeddingProvider, VectorStoreProvider};
use holocron_domain::{MetadataFilter, Result, SearchResult};

/// Semantic search over the knowledge base.
pub struct RetrievalService {
    embedding: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStoreProvider>,
    default_limit: usize,
    /// Backend-specific recall floor, resolved by the factory
    default_threshold: f64,
}

impl RetrievalService {
    /// New retriever. `default_threshold` comes from configuration or the
    /// backend default (0.3 sql, 0.01 managed).
    #[must_use]
    pub fn new(
        embedding: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStoreProvider>,
        default_limit: Option<usize>,
        default_threshold: f64,
    ) -> Self {
        Self {
            embedding,
            vector_store,
            default_limit: default_limit.unwrap_or(MAX_RESULTS),
            default_threshold,
        }
    }

    /// Search for passages similar to `query`.
    ///
    /// # Errors
    ///
    /// Returns an error when query embedding or the backend search fails.
    pub async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
        threshold: Option<f64>,
        filters: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        let limit = limit.unwrap_or(self.default_limit);
        let threshold = threshold.unwrap_or(self.default_threshold);

        let embedding = self.embedding.embed(query).await?;
        debug!(query, limit, threshold, flagged = embedding.flagged, "searching");

        self.vector_store
            .search(&embedding.vector, limit, threshold, filters)
            .await
    }

    /// Search and assemble the hits into one context block for a
    /// downstream language model.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying search fails.
    pub async fn search_context(
        &self,
        query: &str,
        limit: Option<usize>,
        threshold: Option<f64>,
        filters: Option<&MetadataFilter>,
    ) -> Result<String> {
        let results = self.search(query, limit, threshold, filters).await?;
        Ok(assemble_context(&results))
    }
}

/// Join ranked passages into a single context block, one numbered entry
/// per passage with its similarity. An empty result set produces an
/// empty string; the caller decides how to fall back.
#[must_use]
pub fn assemble_context(results: &[SearchResult]) -> String {
    let items: Vec<String> = results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            format!(
                "Relevant knowledge {} (similarity: {:.1}%):\n{}",
                i + 1,
                result.similarity * 100.0,
                result.content
            )
        })
        .collect();
    items.join("\n\n")
}
