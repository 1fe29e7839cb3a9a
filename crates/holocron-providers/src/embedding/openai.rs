//! OpenAI-compatible embedding API client.
//!
//! Batches inputs under a token budget, issues a bounded number of
//! concurrent requests, retries transient failures with backoff, and
//! substitutes flagged zero vectors when a batch keeps failing; bulk
//! mode never raises for individual inputs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use holocron_domain::constants::{
    BATCH_TOKEN_LIMIT, HTTP_TIMEOUT_SECS, MAX_PARALLEL_REQUESTS,
    RATE_LIMITED_DEFAULT_WAIT_SECS,
};
use holocron_domain::ports::EmbeddingProvider;
use holocron_domain::{Embedding, Error, Result};
use holocron_wiki::TokenCounter;

use crate::constants::EMBEDDING_API_ENDPOINT;
use crate::retry::RetryPolicy;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Configuration for [`OpenAiEmbeddingProvider`].
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingConfig {
    /// API base URL (`https://api.openai.com/v1` or compatible)
    pub base_url: String,
    /// Opaque API credential
    pub api_key: String,
    /// Model identifier
    pub model: String,
    /// Expected output dimension
    pub dimensions: usize,
    /// Max total tokens per request
    pub batch_token_limit: usize,
    /// Max in-flight requests
    pub max_parallel_requests: usize,
}

impl OpenAiEmbeddingConfig {
    /// Defaults for everything but credentials.
    #[must_use]
    pub fn new(base_url: String, api_key: String, model: String, dimensions: usize) -> Self {
        Self {
            base_url,
            api_key,
            model,
            dimensions,
            batch_token_limit: BATCH_TOKEN_LIMIT,
            max_parallel_requests: MAX_PARALLEL_REQUESTS,
        }
    }
}

/// Embedding provider speaking the OpenAI `/embeddings` wire shape.
pub struct OpenAiEmbeddingProvider {
    client: reqwest::Client,
    config: OpenAiEmbeddingConfig,
    counter: TokenCounter,
    semaphore: Arc<Semaphore>,
    retry: RetryPolicy,
}

impl OpenAiEmbeddingProvider {
    /// Build a provider with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or tokenizer cannot be built.
    pub fn new(config: OpenAiEmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::config(format!("embedding HTTP client: {e}")))?;
        Self::with_client(config, client)
    }

    /// Build a provider sharing an existing HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the tokenizer cannot be loaded.
    pub fn with_client(config: OpenAiEmbeddingConfig, client: reqwest::Client) -> Result<Self> {
        let counter = TokenCounter::new()?;
        let semaphore = Arc::new(Semaphore::new(config.max_parallel_requests.max(1)));
        Ok(Self {
            client,
            config,
            counter,
            semaphore,
            retry: RetryPolicy::network(),
        })
    }

    /// Split texts into request batches under the token budget, keeping
    /// input order. A single text over the budget gets its own batch; the
    /// API will truncate it rather than us dropping it.
    fn plan_batches(&self, texts: &[String]) -> Vec<(usize, Vec<String>)> {
        let mut batches = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_start = 0;
        let mut current_tokens = 0;

        for (i, text) in texts.iter().enumerate() {
            let tokens = self.counter.count(text);
            if !current.is_empty() && current_tokens + tokens > self.config.batch_token_limit {
                batches.push((current_start, std::mem::take(&mut current)));
                current_start = i;
                current_tokens = 0;
            }
            current.push(text.clone());
            current_tokens += tokens;
        }
        if !current.is_empty() {
            batches.push((current_start, current));
        }
        batches
    }

    /// One API request for one batch, embeddings in input order.
    async fn request_batch(&self, batch: &[String]) -> Result<Vec<Embedding>> {
        let url = format!("{}{}", self.config.base_url, EMBEDDING_API_ENDPOINT);
        let body = EmbeddingRequest {
            model: &self.config.model,
            input: batch,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::network_with_source("embedding request failed", e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let wait = retry_after_seconds(&response).unwrap_or(RATE_LIMITED_DEFAULT_WAIT_SECS);
            warn!(wait_secs = wait, "embedding API rate limited");
            tokio::time::sleep(Duration::from_secs(wait)).await;
            return Err(Error::network("embedding API rate limited"));
        }
        if status.is_server_error() {
            return Err(Error::network(format!("embedding API returned {status}")));
        }
        if !status.is_success() {
            return Err(Error::embedding(format!("embedding API returned {status}")));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::network_with_source("embedding response body", e))?;

        if parsed.data.len() != batch.len() {
            return Err(Error::embedding(format!(
                "embedding API returned {} vectors for {} inputs",
                parsed.data.len(),
                batch.len()
            )));
        }

        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        let mut embeddings = Vec::with_capacity(data.len());
        for item in data {
            if item.embedding.len() != self.config.dimensions {
                return Err(Error::embedding(format!(
                    "embedding dimension {} does not match configured {}",
                    item.embedding.len(),
                    self.config.dimensions
                )));
            }
            embeddings.push(Embedding::new(item.embedding).normalized());
        }
        Ok(embeddings)
    }
}

fn retry_after_seconds(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let batches = self.plan_batches(texts);
        debug!(
            inputs = texts.len(),
            requests = batches.len(),
            "embedding batch planned"
        );

        let futures = batches.into_iter().map(|(start, batch)| {
            let semaphore = Arc::clone(&self.semaphore);
            async move {
                // Permit held for the duration of the request.
                let _permit = semaphore.acquire().await.ok();
                let size = batch.len();
                let result = self
                    .retry
                    .run_transient("embed_batch", || self.request_batch(&batch))
                    .await;
                match result {
                    Ok(embeddings) => (start, embeddings),
                    Err(e) => {
                        // Zero-vector substitution keeps the chunk
                        // addressable; the flag marks it for a later
                        // reconciliation pass.
                        error!(start, size, error = %e, "embedding batch failed, substituting zero vectors");
                        (start, vec![Embedding::zero(self.config.dimensions); size])
                    }
                }
            }
        });

        let mut results: Vec<(usize, Vec<Embedding>)> = join_all(futures).await;
        results.sort_by_key(|(start, _)| *start);

        let mut embeddings = Vec::with_capacity(texts.len());
        for (_, batch) in results {
            embeddings.extend(batch);
        }
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAiEmbeddingProvider {
        OpenAiEmbeddingProvider::new(OpenAiEmbeddingConfig {
            base_url: "http://127.0.0.1:9".to_owned(),
            api_key: "test-key".to_owned(),
            model: "text-embedding-ada-002".to_owned(),
            dimensions: 4,
            batch_token_limit: 16,
            max_parallel_requests: 2,
        })
        .unwrap_or_else(|e| panic!("provider: {e}"))
    }

    #[test]
    fn batches_respect_the_token_budget() {
        let provider = provider();
        // Each text is a handful of tokens; budget 16 forces splits.
        let texts: Vec<String> = (0..6)
            .map(|i| format!("cantina patron number {i} orders a drink"))
            .collect();
        let batches = provider.plan_batches(&texts);
        assert!(batches.len() > 1, "expected multiple request batches");
        // Order and coverage are preserved.
        let flattened: Vec<String> = batches.iter().flat_map(|(_, b)| b.clone()).collect();
        assert_eq!(flattened, texts);
        let starts: Vec<usize> = batches.iter().map(|(s, _)| *s).collect();
        let mut sorted = starts.clone();
        sorted.sort_unstable();
        assert_eq!(starts, sorted);
    }

    #[test]
    fn oversized_single_text_gets_its_own_batch() {
        let provider = provider();
        let texts = vec![
            "short".to_owned(),
            "a much longer text that certainly exceeds the tiny test budget set above".to_owned(),
            "tail".to_owned(),
        ];
        let batches = provider.plan_batches(&texts);
        assert!(batches.iter().all(|(_, b)| !b.is_empty()));
        let flattened: Vec<String> = batches.iter().flat_map(|(_, b)| b.clone()).collect();
        assert_eq!(flattened, texts);
    }

    #[tokio::test]
    async fn unreachable_api_substitutes_flagged_zero_vectors() {
        // Port 9 is the discard service; connections fail fast. After
        // retries the provider must fall back to flagged zero vectors
        // instead of erroring.
        let mut provider = provider();
        provider.retry = RetryPolicy {
            attempts: 1,
            base_delay: Duration::from_millis(1),
            factor: 1,
        };
        let texts = vec!["droid".to_owned(), "cantina".to_owned()];
        let embeddings = provider
            .embed_batch(&texts)
            .await
            .unwrap_or_else(|e| panic!("bulk mode must not error: {e}"));
        assert_eq!(embeddings.len(), 2);
        assert!(embeddings.iter().all(|e| e.flagged));
        assert!(embeddings.iter().all(|e| e.vector == vec![0.0; 4]));
    }
}
