//! Embedding-sized article chunks.

use serde::{Deserialize, Serialize};

use crate::value_objects::{Canonicity, Priority};

/// Metadata attached to every chunk and carried into the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Article title
    pub title: String,
    /// Source URL
    pub source: String,
    /// Section heading this chunk came from
    pub section: String,
    /// Article categories
    pub categories: Vec<String>,
    /// Work item priority at ingest time
    pub priority: Priority,
    /// Canon / Legends / unknown tag
    pub canonicity: Canonicity,
    /// Whether the source article was tagged as a stub
    #[serde(default)]
    pub stub: bool,
}

/// A text segment sized for embedding.
///
/// Invariants: `content_tokens <= max_chunk_tokens` unless `oversize` is
/// set (single indivisible paragraph), and every article yields at least
/// one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleChunk {
    /// `{article_id}_{ordinal}`, ordinal in source order
    pub id: String,
    /// Chunk text, starting with the `# {title}` header line
    pub content: String,
    /// cl100k token count of `content`
    pub content_tokens: usize,
    /// Set when a single paragraph alone exceeded the token budget
    #[serde(default)]
    pub oversize: bool,
    /// Article-level metadata
    pub metadata: ChunkMetadata,
}

impl ArticleChunk {
    /// Stable chunk id for an article and ordinal.
    #[must_use]
    pub fn make_id(article_id: &str, ordinal: usize) -> String {
        format!("{article_id}_{ordinal}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_ids_are_ordinal_suffixed() {
        assert_eq!(ArticleChunk::make_id("oga-cantina", 0), "oga-cantina_0");
        assert_eq!(ArticleChunk::make_id("oga-cantina", 12), "oga-cantina_12");
    }
}
