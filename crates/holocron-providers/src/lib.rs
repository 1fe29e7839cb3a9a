//! # Provider Implementations
//!
//! Adapters for every external dependency of the pipeline:
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`embedding`] | OpenAI-compatible embedding API client + offline null provider |
//! | [`vector_store`] | Managed index (HTTP), SQL+pgvector and in-memory stores |
//! | [`progress`] | CSV-backed progress store |
//! | [`staging`] | Parquet shard staging for out-of-band vector import |
//! | [`crawler`] | Polite wiki crawler with URL encoding repair |
//! | [`retry`] | Shared retry helper with exponential backoff |
//!
//! All providers implement the port traits from `holocron-domain`; nothing
//! upstream depends on which implementation is active.

/// Provider-level constants
pub mod constants;
/// Polite wiki crawler
pub mod crawler;
/// Embedding providers
pub mod embedding;
/// Progress store implementations
pub mod progress;
/// Retry helper
pub mod retry;
/// Parquet staging
pub mod staging;
/// Vector store providers
pub mod vector_store;

pub use crawler::WikiCrawler;
pub use embedding::{NullEmbeddingProvider, OpenAiEmbeddingProvider};
pub use progress::CsvProgressStore;
pub use retry::RetryPolicy;
pub use staging::ParquetStager;
pub use vector_store::{InMemoryVectorStore, ManagedIndexProvider, PgVectorProvider};
