//! Provider decorators.
//!
//! Cross-cutting instrumentation layered over the ports without touching
//! the providers themselves.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use holocron_domain::ports::EmbeddingProvider;
use holocron_domain::{Embedding, Result};

/// Wraps an `EmbeddingProvider` to log timing and failure substitution
/// for every call. All operations delegate to the inner provider.
pub struct InstrumentedEmbeddingProvider {
    inner: Arc<dyn EmbeddingProvider>,
}

impl InstrumentedEmbeddingProvider {
    /// Wrap a provider.
    #[must_use]
    pub fn new(inner: Arc<dyn EmbeddingProvider>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl EmbeddingProvider for InstrumentedEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let start = Instant::now();
        let result = self.inner.embed(text).await;
        debug!(
            provider = self.inner.provider_name(),
            duration_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "embed"
        );
        result
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let start = Instant::now();
        let result = self.inner.embed_batch(texts).await;
        if let Ok(embeddings) = &result {
            let flagged = embeddings.iter().filter(|e| e.flagged).count();
            debug!(
                provider = self.inner.provider_name(),
                inputs = texts.len(),
                flagged,
                duration_ms = start.elapsed().as_millis() as u64,
                "embed_batch"
            );
        }
        result
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider;

    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            Ok(texts.iter().map(|_| Embedding::new(vec![1.0, 0.0])).collect())
        }
        fn dimensions(&self) -> usize {
            2
        }
        fn provider_name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn delegates_everything_to_the_inner_provider() {
        let instrumented = InstrumentedEmbeddingProvider::new(Arc::new(FixedProvider));
        assert_eq!(instrumented.dimensions(), 2);
        assert_eq!(instrumented.provider_name(), "fixed");

        let one = instrumented.embed("cantina").await.unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(one.vector, vec![1.0, 0.0]);

        let many = instrumented
            .embed_batch(&["a".to_owned(), "b".to_owned()])
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(many.len(), 2);
    }
}
