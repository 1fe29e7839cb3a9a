//! Managed HTTP vector index backend.
//!
//! Speaks the Pinecone-style wire protocol: `/vectors/upsert`, `/query`,
//! `/vectors/delete` with an `Api-Key` header. Server-side metadata
//! filtering, client-side threshold. A 429 from the service sets a
//! rate-limited flag that short-circuits further requests until expiry.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use holocron_domain::constants::{HTTP_TIMEOUT_SECS, RATE_LIMITED_DEFAULT_WAIT_SECS};
use holocron_domain::ports::VectorStoreProvider;
use holocron_domain::{
    Error, FilterValue, MetadataFilter, Result, SearchResult, VectorRecord,
};

use crate::constants::{
    MANAGED_API_KEY_HEADER, MANAGED_DELETE_ENDPOINT, MANAGED_QUERY_ENDPOINT,
    MANAGED_STATS_ENDPOINT, MANAGED_UPSERT_ENDPOINT,
};
use crate::retry::RetryPolicy;

/// Configuration for [`ManagedIndexProvider`].
#[derive(Clone)]
pub struct ManagedIndexConfig {
    /// Index base URL (`https://{index}.svc.{region}.pinecone.io` shape)
    pub index_url: String,
    /// Opaque API credential
    pub api_key: String,
    /// Vector dimension the index was created with
    pub dimensions: usize,
}

impl std::fmt::Debug for ManagedIndexConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedIndexConfig")
            .field("index_url", &self.index_url)
            .field("api_key", &"REDACTED")
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

/// Vector store held in an external managed index service.
pub struct ManagedIndexProvider {
    client: reqwest::Client,
    config: ManagedIndexConfig,
    retry: RetryPolicy,
    /// Set after a 429; requests short-circuit until this instant.
    rate_limited_until: Mutex<Option<Instant>>,
}

impl ManagedIndexProvider {
    /// Build a provider with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is incomplete or the HTTP
    /// client cannot be built.
    pub fn new(config: ManagedIndexConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(Error::ConfigMissing("managed index api_key".to_owned()));
        }
        if config.index_url.is_empty() {
            return Err(Error::ConfigMissing("managed index index_url".to_owned()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::config(format!("managed index HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            retry: RetryPolicy::network(),
            rate_limited_until: Mutex::new(None),
        })
    }

    /// Parse one query match into a search result. Matches missing `id`
    /// or `metadata` are malformed and rejected.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed matches.
    pub fn match_to_search_result(item: &Value, score: f64) -> Result<SearchResult> {
        let id = item
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::vector_db("query match missing string 'id'"))?;
        let metadata = item
            .get("metadata")
            .and_then(Value::as_object)
            .ok_or_else(|| Error::vector_db("query match missing 'metadata' object"))?;
        let content = metadata
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        Ok(SearchResult {
            id: id.to_owned(),
            content,
            metadata: metadata.clone(),
            similarity: score,
        })
    }

    /// Translate the domain filter into the service's filter expression:
    /// exact matches directly, any-of as `$in`.
    fn filter_expression(filters: Option<&MetadataFilter>) -> Option<Value> {
        let filters = filters?;
        if filters.is_empty() {
            return None;
        }
        let mut expression = serde_json::Map::new();
        for (field, value) in &filters.fields {
            match value {
                FilterValue::One(v) => {
                    expression.insert(field.clone(), v.clone());
                }
                FilterValue::Many(vs) => {
                    expression.insert(field.clone(), json!({ "$in": vs }));
                }
            }
        }
        Some(Value::Object(expression))
    }

    async fn ensure_not_rate_limited(&self) -> Result<()> {
        let mut until = self.rate_limited_until.lock().await;
        if let Some(instant) = *until {
            if Instant::now() < instant {
                return Err(Error::vector_db("managed index is rate limited, backing off"));
            }
            *until = None;
        }
        Ok(())
    }

    async fn post(&self, endpoint: &str, body: &Value) -> Result<Value> {
        self.ensure_not_rate_limited().await?;
        let url = format!("{}{endpoint}", self.config.index_url);
        let response = self
            .client
            .post(&url)
            .header(MANAGED_API_KEY_HEADER, &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::network_with_source("managed index request failed", e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let wait = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(RATE_LIMITED_DEFAULT_WAIT_SECS);
            *self.rate_limited_until.lock().await =
                Some(Instant::now() + Duration::from_secs(wait));
            warn!(wait_secs = wait, "managed index rate limited");
            return Err(Error::network("managed index rate limited"));
        }
        if status.is_server_error() {
            return Err(Error::network(format!("managed index returned {status}")));
        }
        if !status.is_success() {
            return Err(Error::vector_db(format!("managed index returned {status}")));
        }
        response
            .json()
            .await
            .map_err(|e| Error::network_with_source("managed index response body", e))
    }
}

#[async_trait]
impl VectorStoreProvider for ManagedIndexProvider {
    async fn upsert(&self, records: &[VectorRecord], batch_size: usize) -> Result<()> {
        if records.is_empty() {
            return Err(Error::invalid_argument("upsert called with empty records"));
        }
        let batch_size = batch_size.max(1);
        for batch in records.chunks(batch_size) {
            let vectors: Vec<Value> = batch
                .iter()
                .map(|r| json!({ "id": r.id, "values": r.values, "metadata": r.metadata }))
                .collect();
            let body = json!({ "vectors": vectors });
            self.retry
                .run_transient("managed upsert", || self.post(MANAGED_UPSERT_ENDPOINT, &body))
                .await?;
            debug!(batch = batch.len(), "managed index upsert batch done");
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
        let mut body = json!({
            "vector": vector,
            "topK": limit,
            "includeMetadata": true,
        });
        if let Some(expression) = Self::filter_expression(filters) {
            body["filter"] = expression;
        }

        let response = self
            .retry
            .run_transient("managed query", || self.post(MANAGED_QUERY_ENDPOINT, &body))
            .await?;

        let matches = response
            .get("matches")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::vector_db("query response missing 'matches'"))?;

        let mut results = Vec::with_capacity(matches.len());
        for item in matches {
            let score = item.get("score").and_then(Value::as_f64).unwrap_or(0.0);
            // The service has no threshold parameter; apply it here.
            if score < threshold {
                continue;
            }
            results.push(Self::match_to_search_result(item, score)?);
        }
        SearchResult::sort_ranked(&mut results);
        results.truncate(limit);
        Ok(results)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let body = json!({ "ids": ids });
        self.retry
            .run_transient("managed delete", || self.post(MANAGED_DELETE_ENDPOINT, &body))
            .await?;
        Ok(())
    }

    fn embedding_dimension(&self) -> usize {
        self.config.dimensions
    }

    fn provider_name(&self) -> &str {
        "managed"
    }

    async fn health_check(&self) -> Result<()> {
        self.post(MANAGED_STATS_ENDPOINT, &json!({})).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> ManagedIndexProvider {
        ManagedIndexProvider::new(ManagedIndexConfig {
            index_url: "https://test-index.svc.test.pinecone.io".to_owned(),
            api_key: "pk-test-key".to_owned(),
            dimensions: 4,
        })
        .unwrap_or_else(|e| panic!("provider: {e}"))
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        let result = ManagedIndexProvider::new(ManagedIndexConfig {
            index_url: "https://x".to_owned(),
            api_key: String::new(),
            dimensions: 4,
        });
        let err = result.err().map(|e| e.to_string()).unwrap_or_default();
        assert!(err.contains("api_key"), "error should mention api_key: {err}");
    }

    #[test]
    fn missing_index_url_is_a_config_error() {
        let result = ManagedIndexProvider::new(ManagedIndexConfig {
            index_url: String::new(),
            api_key: "pk".to_owned(),
            dimensions: 4,
        });
        let err = result.err().map(|e| e.to_string()).unwrap_or_default();
        assert!(err.contains("index_url"), "error should mention index_url: {err}");
    }

    #[test]
    fn match_missing_id_returns_error() {
        let item = json!({ "metadata": {} });
        let err = ManagedIndexProvider::match_to_search_result(&item, 0.9)
            .err()
            .map(|e| e.to_string())
            .unwrap_or_default();
        assert!(err.contains("id"), "error should mention 'id': {err}");
    }

    #[test]
    fn match_non_string_id_returns_error() {
        let item = json!({ "id": 42, "metadata": {} });
        assert!(ManagedIndexProvider::match_to_search_result(&item, 0.9).is_err());
    }

    #[test]
    fn match_missing_metadata_returns_error() {
        let item = json!({ "id": "vec_1" });
        let err = ManagedIndexProvider::match_to_search_result(&item, 0.9)
            .err()
            .map(|e| e.to_string())
            .unwrap_or_default();
        assert!(err.contains("metadata"), "error should mention 'metadata': {err}");
    }

    #[test]
    fn match_valid_item_succeeds() {
        let item = json!({
            "id": "oga_0",
            "metadata": {
                "title": "Oga's Cantina",
                "content": "# Oga's Cantina\n\nA popular establishment."
            }
        });
        let result = ManagedIndexProvider::match_to_search_result(&item, 0.95)
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(result.id, "oga_0");
        assert!((result.similarity - 0.95).abs() < f64::EPSILON);
        assert!(result.content.contains("popular establishment"));
    }

    #[test]
    fn filter_expression_maps_eq_and_in() {
        let filter = MetadataFilter::new()
            .with_field("canonicity", "canon")
            .with_any_of("priority", vec![json!("high"), json!("medium")]);
        let expression = ManagedIndexProvider::filter_expression(Some(&filter))
            .unwrap_or_else(|| panic!("expected expression"));
        assert_eq!(expression["canonicity"], json!("canon"));
        assert_eq!(expression["priority"], json!({ "$in": ["high", "medium"] }));
    }

    #[test]
    fn empty_filter_produces_no_expression() {
        assert!(ManagedIndexProvider::filter_expression(None).is_none());
        let empty = MetadataFilter::new();
        assert!(ManagedIndexProvider::filter_expression(Some(&empty)).is_none());
    }

    #[tokio::test]
    async fn empty_upsert_is_rejected() {
        let err = provider()
            .upsert(&[], 100)
            .await
            .err()
            .map(|e| e.to_string())
            .unwrap_or_default();
        assert!(err.contains("empty"), "error should mention 'empty': {err}");
    }
}
