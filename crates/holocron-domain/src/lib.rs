//! # Domain Layer
//!
//! Core types and business rules for the Holocron knowledge base.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`entities`] | Work items, articles, chunks and vector records |
//! | [`value_objects`] | Immutable value objects (canonicity, priority, search results) |
//! | [`ports`] | Provider and repository port traits |
//! | [`constants`] | Domain constants |
//! | [`error`] | Domain error types |
//!
//! The domain crate carries no infrastructure dependencies: adapters for
//! the embedding API, the vector backends and the progress store live in
//! `holocron-providers` and are wired in through the port traits defined
//! here.

/// Domain-level constants
pub mod constants;
/// Core business entities
pub mod entities;
/// Domain error types
pub mod error;
/// Provider and repository port interfaces
pub mod ports;
/// Immutable value objects
pub mod value_objects;

pub use entities::{
    ArticleChunk, ChunkMetadata, IngestCounters, NormalizedArticle, RawPage, VectorRecord,
    WorkItem,
};
pub use error::{Error, Result};
pub use value_objects::{
    Canonicity, ContentClass, Embedding, FilterReason, FilterValue, MetadataFilter, Priority,
    SearchResult,
};
