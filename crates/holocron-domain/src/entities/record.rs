//! Vector records owned by the vector store.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::constants::{METADATA_KEY_CONTENT, METADATA_KEY_FLAGGED};
use crate::entities::ArticleChunk;
use crate::value_objects::Embedding;

/// One row in the vector index: id, dense vector, display metadata.
///
/// The vector store owns the record's lifetime; the orchestrator only
/// upserts and deletes. Values are L2-normalized before indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Globally unique id (`{article_id}_{ordinal}`)
    pub id: String,
    /// Dense vector of the configured dimension
    pub values: Vec<f32>,
    /// Chunk metadata plus the chunk text for retrieval display
    pub metadata: serde_json::Map<String, Value>,
}

impl VectorRecord {
    /// Assemble a record from a chunk and its embedding.
    ///
    /// The chunk text rides along in metadata under `content`; flagged
    /// (zero-vector) embeddings are marked so a reconciliation pass can
    /// find and re-embed them.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk metadata cannot be serialized.
    pub fn from_chunk(chunk: &ArticleChunk, embedding: &Embedding) -> crate::Result<Self> {
        let mut metadata = match serde_json::to_value(&chunk.metadata)? {
            Value::Object(map) => map,
            other => {
                return Err(crate::Error::internal(format!(
                    "chunk metadata serialized to non-object: {other}"
                )));
            }
        };
        metadata.insert(METADATA_KEY_CONTENT.to_owned(), json!(chunk.content));
        metadata.insert(
            "content_tokens".to_owned(),
            json!(chunk.content_tokens),
        );
        if embedding.flagged {
            metadata.insert(METADATA_KEY_FLAGGED.to_owned(), json!(true));
        }
        Ok(Self {
            id: chunk.id.clone(),
            values: embedding.vector.clone(),
            metadata,
        })
    }

    /// Whether this record carries a zero-vector substitute.
    #[must_use]
    pub fn is_flagged(&self) -> bool {
        self.metadata
            .get(METADATA_KEY_FLAGGED)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}
