//! External provider ports.

use async_trait::async_trait;

use crate::entities::{RawPage, VectorRecord, WorkItem};
use crate::error::Result;
use crate::value_objects::{Embedding, MetadataFilter, SearchResult};

/// Text embedding generation.
///
/// Implementations batch internally; callers hand over every text of an
/// article in one `embed_batch` call. Bulk mode never errors on individual
/// inputs: failed entries come back as flagged zero vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text (one network call).
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let embeddings = self.embed_batch(&[text.to_owned()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| crate::error::Error::embedding("No embedding returned"))
    }

    /// Embed a batch of texts, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Output vector dimension.
    fn dimensions(&self) -> usize;

    /// Short provider name for logs.
    fn provider_name(&self) -> &str;

    /// Liveness probe; default embeds a short sentinel text.
    async fn health_check(&self) -> Result<()> {
        self.embed("health check").await?;
        Ok(())
    }
}

/// Vector storage with metadata-filtered similarity search.
///
/// Contract shared by every backend:
/// - `search` returns at most `limit` results with similarity >=
///   `threshold`, sorted descending (ties ascending by id);
/// - `filters` combine with AND semantics;
/// - `upsert` is idempotent by id;
/// - `delete` of unknown ids is a no-op.
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Insert-or-update records in batches of `batch_size`.
    async fn upsert(&self, records: &[VectorRecord], batch_size: usize) -> Result<()>;

    /// Similarity search over the index.
    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        threshold: f64,
        filters: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>>;

    /// Delete records by id.
    async fn delete(&self, ids: &[String]) -> Result<()>;

    /// Dimension the index was created with.
    fn embedding_dimension(&self) -> usize;

    /// Short provider name for logs.
    fn provider_name(&self) -> &str;

    /// Availability probe.
    async fn health_check(&self) -> Result<()>;
}

/// Raw page acquisition for a work item.
///
/// Implemented by the polite crawler for live runs and by the dump-backed
/// source for offline runs; the orchestrator does not know which.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the raw wikitext for a work item. `Ok(None)` means the page
    /// does not exist (deleted article); that is not an error.
    async fn fetch(&self, item: &WorkItem) -> Result<Option<RawPage>>;
}

/// Sink for vector records that could not be upserted.
///
/// When an upsert batch exhausts its retries the orchestrator stages the
/// records here for out-of-band import instead of losing them.
pub trait VectorStager: Send + Sync {
    /// Persist records; returns the files written.
    fn stage(&self, records: &[VectorRecord]) -> Result<Vec<std::path::PathBuf>>;
}
