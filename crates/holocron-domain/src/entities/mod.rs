//! Core business entities.

/// Raw and normalized wiki articles
mod article;
/// Embedding-sized article chunks
mod chunk;
/// Pipeline counters
mod counters;
/// Vector records owned by the store
mod record;
/// Ingest work items
mod work_item;

pub use article::{NormalizedArticle, RawPage};
pub use chunk::{ArticleChunk, ChunkMetadata};
pub use counters::IngestCounters;
pub use record::VectorRecord;
pub use work_item::WorkItem;
