//! Embedding providers.

/// Deterministic offline provider for tests and dry runs
mod null;
/// OpenAI-compatible HTTP provider
mod openai;

pub use null::NullEmbeddingProvider;
pub use openai::{OpenAiEmbeddingConfig, OpenAiEmbeddingProvider};
