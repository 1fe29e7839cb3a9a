//! Search-side value objects: embeddings, results and metadata filters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A dense vector produced by the embedding provider.
///
/// Vectors are L2-normalized before leaving the provider. A `flagged`
/// embedding is a zero-vector substitute written after retry exhaustion so
/// the chunk stays addressable and can be re-embedded later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    /// The vector components
    pub vector: Vec<f32>,
    /// True when this is a zero-vector substitute for a failed request
    pub flagged: bool,
}

impl Embedding {
    /// Wrap a raw vector as a healthy embedding.
    #[must_use]
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            flagged: false,
        }
    }

    /// Zero-vector substitute of the given dimension.
    #[must_use]
    pub fn zero(dimensions: usize) -> Self {
        Self {
            vector: vec![0.0; dimensions],
            flagged: true,
        }
    }

    /// Euclidean norm of the vector.
    #[must_use]
    pub fn norm(&self) -> f32 {
        self.vector.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Scale the vector to unit length. Zero vectors are left untouched.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        let norm = self.norm();
        if norm > 0.0 {
            for component in &mut self.vector {
                *component /= norm;
            }
        }
        self
    }
}

/// A single similarity search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Vector record id
    pub id: String,
    /// Chunk text stored alongside the vector for display
    pub content: String,
    /// Chunk metadata (title, source, section, categories, ...)
    pub metadata: serde_json::Map<String, Value>,
    /// Cosine similarity in [0, 1]
    pub similarity: f64,
}

impl SearchResult {
    /// Sort results descending by similarity, ascending by id on ties.
    /// Every backend funnels through this so orderings agree.
    pub fn sort_ranked(results: &mut [SearchResult]) {
        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
    }
}

/// Value side of a metadata filter entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Field must equal this value
    One(Value),
    /// Field must equal any of these values
    Many(Vec<Value>),
}

/// Metadata filter map combined with AND semantics across fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    /// field name -> expected value(s)
    #[serde(flatten)]
    pub fields: BTreeMap<String, FilterValue>,
}

impl MetadataFilter {
    /// Empty filter matching everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an exact-match constraint.
    #[must_use]
    pub fn with_field<S: Into<String>, V: Into<Value>>(mut self, field: S, value: V) -> Self {
        self.fields
            .insert(field.into(), FilterValue::One(value.into()));
        self
    }

    /// Add an any-of constraint.
    #[must_use]
    pub fn with_any_of<S: Into<String>>(mut self, field: S, values: Vec<Value>) -> Self {
        self.fields.insert(field.into(), FilterValue::Many(values));
        self
    }

    /// Whether no constraints are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Evaluate the filter against a metadata map. Missing fields fail the
    /// match, so every constraint is a hard requirement.
    #[must_use]
    pub fn matches(&self, metadata: &serde_json::Map<String, Value>) -> bool {
        self.fields.iter().all(|(field, expected)| {
            let Some(actual) = metadata.get(field) else {
                return false;
            };
            match expected {
                FilterValue::One(value) => actual == value,
                FilterValue::Many(values) => values.iter().any(|value| actual == value),
            }
        })
    }
}
