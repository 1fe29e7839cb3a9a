//! Deterministic offline embedding provider.
//!
//! Produces stable unit vectors derived from the text bytes. Useful for
//! tests and dry runs where the real API is unavailable; similar texts do
//! NOT get similar vectors, only identical texts match.

use async_trait::async_trait;

use holocron_domain::ports::EmbeddingProvider;
use holocron_domain::{Embedding, Result};

/// Hash-seeded deterministic embedding provider.
#[derive(Debug, Clone)]
pub struct NullEmbeddingProvider {
    dimensions: usize,
}

impl NullEmbeddingProvider {
    /// Provider emitting vectors of `dimensions` components.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn vector_for(&self, text: &str) -> Embedding {
        // FNV-1a seed, then a simple LCG to fill the components.
        let mut seed: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in text.bytes() {
            seed ^= u64::from(byte);
            seed = seed.wrapping_mul(0x0000_0100_0000_01b3);
        }
        let mut state = seed | 1;
        let mut vector = Vec::with_capacity(self.dimensions);
        for _ in 0..self.dimensions {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            // Top 53 bits into [0, 1), then into [-1, 1).
            let unit = (state >> 11) as f64 / 9_007_199_254_740_992.0;
            vector.push((unit * 2.0 - 1.0) as f32);
        }
        Embedding::new(vector).normalized()
    }
}

#[async_trait]
impl EmbeddingProvider for NullEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "null"
    }
}
