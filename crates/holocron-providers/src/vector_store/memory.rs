//! In-memory vector store.
//!
//! Exact reference semantics for the `VectorStoreProvider` contract:
//! cosine similarity, AND metadata filters, descending order with id
//! tiebreak. Used by tests and offline dry runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use holocron_domain::ports::VectorStoreProvider;
use holocron_domain::{Error, MetadataFilter, Result, SearchResult, VectorRecord};

/// Vector store backed by a guarded map.
pub struct InMemoryVectorStore {
    records: Mutex<BTreeMap<String, VectorRecord>>,
    dimensions: usize,
}

impl InMemoryVectorStore {
    /// Empty store for vectors of `dimensions` components.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            dimensions,
        }
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
        let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
        let norm_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
        let norm_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorStoreProvider for InMemoryVectorStore {
    async fn upsert(&self, records: &[VectorRecord], _batch_size: usize) -> Result<()> {
        let mut store = self.records.lock().await;
        for record in records {
            if record.values.len() != self.dimensions {
                return Err(Error::vector_db(format!(
                    "record {} has dimension {}, store expects {}",
                    record.id,
                    record.values.len(),
                    self.dimensions
                )));
            }
            store.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        threshold: f64,
        filters: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        let store = self.records.lock().await;
        let mut results: Vec<SearchResult> = store
            .values()
            .filter(|record| filters.is_none_or(|f| f.matches(&record.metadata)))
            .filter_map(|record| {
                let similarity = Self::cosine_similarity(vector, &record.values);
                if similarity < threshold {
                    return None;
                }
                let content = record
                    .metadata
                    .get("content")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default()
                    .to_owned();
                Some(SearchResult {
                    id: record.id.clone(),
                    content,
                    metadata: record.metadata.clone(),
                    similarity,
                })
            })
            .collect();

        SearchResult::sort_ranked(&mut results);
        results.truncate(limit);
        Ok(results)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let mut store = self.records.lock().await;
        for id in ids {
            store.remove(id);
        }
        Ok(())
    }

    fn embedding_dimension(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "memory"
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, values: Vec<f32>, canonicity: &str) -> VectorRecord {
        let mut metadata = serde_json::Map::new();
        metadata.insert("content".to_owned(), json!(format!("text for {id}")));
        metadata.insert("canonicity".to_owned(), json!(canonicity));
        VectorRecord {
            id: id.to_owned(),
            values,
            metadata,
        }
    }

    fn seeded() -> InMemoryVectorStore {
        InMemoryVectorStore::new(2)
    }

    #[tokio::test]
    async fn upsert_is_idempotent_by_id() {
        let store = seeded();
        let records = vec![
            record("a", vec![1.0, 0.0], "canon"),
            record("b", vec![0.0, 1.0], "legends"),
        ];
        store.upsert(&records, 100).await.unwrap_or_else(|e| panic!("{e}"));
        store.upsert(&records, 100).await.unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(store.len().await, 2);

        // Re-upserting with new values replaces, not duplicates.
        let updated = vec![record("a", vec![0.6, 0.8], "canon")];
        store.upsert(&updated, 100).await.unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(store.len().await, 2);
        let hits = store
            .search(&[0.6, 0.8], 1, 0.9, None)
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(hits[0].id, "a");
    }

    #[tokio::test]
    async fn search_orders_descending_and_applies_threshold() {
        let store = seeded();
        store
            .upsert(
                &[
                    record("near", vec![1.0, 0.0], "canon"),
                    record("mid", vec![0.7, 0.714], "canon"),
                    record("far", vec![0.0, 1.0], "canon"),
                ],
                100,
            )
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        let results = store
            .search(&[1.0, 0.0], 10, 0.3, None)
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert!(results.iter().all(|r| r.similarity >= 0.3));
        assert!(results.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    }

    #[tokio::test]
    async fn search_respects_limit_and_filters() {
        let store = seeded();
        store
            .upsert(
                &[
                    record("c1", vec![1.0, 0.0], "canon"),
                    record("c2", vec![0.9, 0.436], "canon"),
                    record("l1", vec![0.95, 0.312], "legends"),
                ],
                100,
            )
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        let filter = MetadataFilter::new().with_field("canonicity", "canon");
        let results = store
            .search(&[1.0, 0.0], 1, 0.0, Some(&filter))
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "c1");
    }

    #[tokio::test]
    async fn delete_unknown_ids_is_a_noop() {
        let store = seeded();
        store
            .upsert(&[record("a", vec![1.0, 0.0], "canon")], 100)
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        store
            .delete(&["a".to_owned(), "ghost".to_owned()])
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(store.is_empty().await);
        // Deleting again is still fine.
        store
            .delete(&["a".to_owned()])
            .await
            .unwrap_or_else(|e| panic!("{e}"));
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected() {
        let store = seeded();
        let bad = record("bad", vec![1.0, 0.0, 0.0], "canon");
        assert!(store.upsert(&[bad], 100).await.is_err());
    }
}
