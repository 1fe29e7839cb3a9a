//! Ingest orchestration.
//!
//! Binds every port together. Per work item: acquire a rate-limit token,
//! fetch, normalize + filter, chunk, embed in one batched call, buffer
//! vector records for upsert, and mark the item done in the progress
//! store, including items that legitimately yielded no chunks, so dead
//! pages never retry forever. A single item failure never aborts the run;
//! a progress store failure always does.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use holocron_domain::constants::{
    CHECKPOINT_BATCH_SIZE, MANAGED_UPSERT_BATCH_SIZE, MAX_ITEM_RETRIES, NUM_WORKERS,
    UPLOAD_BATCH_SIZE,
};
use holocron_domain::ports::{
    EmbeddingProvider, PageFetcher, ProgressStore, VectorStager, VectorStoreProvider,
};
use holocron_domain::{
    Error, FilterReason, IngestCounters, NormalizedArticle, Priority, Result, VectorRecord,
    WorkItem,
};
use holocron_wiki::{Chunker, PageProcessor};

use crate::checkpoint::BatchCheckpoint;
use crate::pipeline::{RateLimiter, WorkerPool};

/// Tuning knobs for an ingest run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Concurrent item workers
    pub num_workers: usize,
    /// Records buffered across items before an upsert flush
    pub upload_batch_size: usize,
    /// Per-request batch size inside the vector store
    pub upsert_batch_size: usize,
    /// Completions between progress checkpoints
    pub checkpoint_batch_size: usize,
    /// Attempts before a failing item is marked done with its error
    pub max_retries: u32,
    /// Time-based buffer flush interval, bounding upsert latency
    pub flush_interval: Duration,
    /// Optional run-checkpoint JSON, written at every progress
    /// checkpoint alongside the progress store
    pub checkpoint_path: Option<std::path::PathBuf>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            num_workers: NUM_WORKERS,
            upload_batch_size: UPLOAD_BATCH_SIZE,
            upsert_batch_size: MANAGED_UPSERT_BATCH_SIZE,
            checkpoint_batch_size: CHECKPOINT_BATCH_SIZE,
            max_retries: MAX_ITEM_RETRIES,
            flush_interval: Duration::from_secs(30),
            checkpoint_path: None,
        }
    }
}

/// The ingest orchestrator.
///
/// All dependencies come in through construction; the service never knows
/// which provider implementations are behind the ports.
pub struct IngestService {
    fetcher: Arc<dyn PageFetcher>,
    embedding: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStoreProvider>,
    progress: Arc<dyn ProgressStore>,
    stager: Option<Arc<dyn VectorStager>>,
    chunker: Arc<Chunker>,
    processor: PageProcessor,
    rate_limiter: Arc<RateLimiter>,
    options: IngestOptions,
    buffer: Mutex<Vec<VectorRecord>>,
    pending_done: Mutex<Vec<String>>,
    counters: Mutex<IngestCounters>,
    checkpoint: Mutex<Option<BatchCheckpoint>>,
}

impl IngestService {
    /// Wire an orchestrator from its collaborators.
    #[expect(clippy::too_many_arguments, reason = "construction-time wiring")]
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        embedding: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStoreProvider>,
        progress: Arc<dyn ProgressStore>,
        stager: Option<Arc<dyn VectorStager>>,
        chunker: Arc<Chunker>,
        rate_limiter: Arc<RateLimiter>,
        options: IngestOptions,
    ) -> Self {
        Self {
            fetcher,
            embedding,
            vector_store,
            progress,
            stager,
            chunker,
            processor: PageProcessor::new(),
            rate_limiter,
            options,
            buffer: Mutex::new(Vec::new()),
            pending_done: Mutex::new(Vec::new()),
            counters: Mutex::new(IngestCounters::default()),
            checkpoint: Mutex::new(None),
        }
    }

    /// Run the pipeline over the unprocessed backlog.
    ///
    /// Pulls up to `limit` unprocessed items (optionally one priority
    /// band), processes them with the worker pool, and flushes everything
    /// on the way out. Cancelling `shutdown` stops intake and drains
    /// in-flight items to a consistent checkpoint.
    ///
    /// # Errors
    ///
    /// Returns an error on fatal failures only (progress store writes,
    /// configuration); per-item errors are absorbed into the counters.
    pub async fn run(
        self: Arc<Self>,
        limit: Option<usize>,
        priority: Option<Priority>,
        shutdown: CancellationToken,
    ) -> Result<IngestCounters> {
        let items = self.progress.unprocessed(limit, priority).await?;
        if items.is_empty() {
            info!("no unprocessed items found");
            return Ok(self.counters.lock().await.clone());
        }
        info!(
            items = items.len(),
            workers = self.options.num_workers,
            "starting ingest run"
        );
        if self.options.checkpoint_path.is_some() {
            *self.checkpoint.lock().await = Some(BatchCheckpoint::new(items.len()));
        }

        // Periodic flush bounds upsert latency when items trickle in
        // slower than upload_batch_size.
        let flusher_token = CancellationToken::new();
        let flusher = {
            let service = Arc::clone(&self);
            let token = flusher_token.clone();
            let interval = self.options.flush_interval;
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        () = token.cancelled() => break,
                        () = tokio::time::sleep(interval) => {
                            service.flush_buffer().await;
                        }
                    }
                }
            })
        };

        let pool = WorkerPool::new(self.options.num_workers);
        let handler = {
            let service = Arc::clone(&self);
            Arc::new(move |item: WorkItem| {
                let service = Arc::clone(&service);
                async move { service.handle_item(item).await }
            })
        };
        let pool_result = pool.run(items, handler, shutdown).await;

        flusher_token.cancel();
        let _ = flusher.await;

        // Flush everything even when the pool failed; the first error
        // wins.
        let finalize_result = self.finalize().await;
        pool_result.and(finalize_result)?;

        let counters = self.counters.lock().await.clone();
        info!(summary = %counters.summary(), "ingest run complete");
        Ok(counters)
    }

    /// Per-item entry point for the worker pool: retries transient
    /// failures, records permanent ones, and only surfaces fatal errors.
    async fn handle_item(&self, mut item: WorkItem) -> Result<()> {
        loop {
            item.attempts += 1;
            match self.process_item(&item).await {
                Ok(()) => return self.complete(&item.id).await,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(item = %item.id, attempt = item.attempts, error = %e, "item failed");
                    self.progress.record_failure(&item.id, &e.to_string()).await?;
                    if item.attempts >= self.options.max_retries {
                        // Marked done anyway, with the error recorded, to
                        // stop retry storms on permanently broken pages.
                        error!(item = %item.id, error = %e, "item failed permanently");
                        self.counters.lock().await.failed += 1;
                        if let Some(checkpoint) = self.checkpoint.lock().await.as_mut() {
                            checkpoint.failed_urls.push(item.url.clone());
                        }
                        return self.complete(&item.id).await;
                    }
                }
            }
        }
    }

    /// One pass of the per-item pipeline.
    async fn process_item(&self, item: &WorkItem) -> Result<()> {
        self.rate_limiter.acquire().await;

        let Some(raw) = self.fetcher.fetch(item).await? else {
            // Deleted or empty page: done, nothing to index.
            let mut counters = self.counters.lock().await;
            counters.total_pages += 1;
            counters.other_filtered += 1;
            return Ok(());
        };

        let processed = self.processor.process(&raw);
        {
            let mut counters = self.counters.lock().await;
            counters.total_pages += 1;
            counters.record_filter(processed.reason);
        }
        if processed.reason != FilterReason::Content {
            return Ok(());
        }
        let Some(article) = processed.article else {
            return Ok(());
        };
        {
            let mut counters = self.counters.lock().await;
            counters.record_canonicity(article.canonicity());
            if article.is_stub() {
                counters.stubs += 1;
            }
        }

        self.ingest_article(&article, &item.id, item.priority).await?;
        Ok(())
    }

    /// Chunk, embed and buffer one normalized article. Also the entry
    /// point for the dump processor's online mode.
    ///
    /// # Errors
    ///
    /// Returns an error when embedding or an eager flush fails fatally.
    pub async fn ingest_article(
        &self,
        article: &NormalizedArticle,
        article_id: &str,
        priority: Priority,
    ) -> Result<usize> {
        let chunks = self.chunker.chunk_article(article, article_id, priority);
        if chunks.is_empty() {
            // The chunker guarantees at least one chunk; belt-and-braces
            // for a future chunker that does not.
            warn!(article = %article.title, "article produced no chunks");
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedding.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(Error::embedding(format!(
                "{} embeddings for {} chunks of '{}'",
                embeddings.len(),
                chunks.len(),
                article.title
            )));
        }

        let mut records = Vec::with_capacity(chunks.len());
        for (chunk, embedding) in chunks.iter().zip(&embeddings) {
            records.push(VectorRecord::from_chunk(chunk, embedding)?);
        }

        let produced = records.len();
        let should_flush = {
            let mut buffer = self.buffer.lock().await;
            buffer.extend(records);
            buffer.len() >= self.options.upload_batch_size
        };
        if should_flush {
            self.flush_buffer().await;
        }

        self.counters.lock().await.chunks_created += produced;
        Ok(produced)
    }

    /// Drain the record buffer into the vector store. Upsert failures are
    /// absorbed by staging the records to disk; upserts are idempotent,
    /// so a retried run converges to the same index state.
    pub async fn flush_buffer(&self) {
        let records: Vec<VectorRecord> = {
            let mut buffer = self.buffer.lock().await;
            buffer.drain(..).collect()
        };
        if records.is_empty() {
            return;
        }

        match self
            .vector_store
            .upsert(&records, self.options.upsert_batch_size)
            .await
        {
            Ok(()) => {
                info!(records = records.len(), "upserted vector batch");
            }
            Err(e) => {
                error!(records = records.len(), error = %e, "upsert failed after retries");
                if let Some(stager) = &self.stager {
                    match stager.stage(&records) {
                        Ok(files) => warn!(
                            files = files.len(),
                            "staged failed upsert batch for out-of-band import"
                        ),
                        Err(stage_error) => {
                            error!(error = %stage_error, "staging failed, records dropped");
                        }
                    }
                } else {
                    error!("no stager configured, records dropped");
                }
            }
        }
    }

    /// Mark an item done, checkpointing every `checkpoint_batch_size`
    /// completions. Progress failures are fatal.
    async fn complete(&self, id: &str) -> Result<()> {
        let ready: Option<Vec<String>> = {
            let mut pending = self.pending_done.lock().await;
            pending.push(id.to_owned());
            (pending.len() >= self.options.checkpoint_batch_size)
                .then(|| pending.drain(..).collect())
        };
        if let Some(ids) = ready {
            self.progress.mark_processed(&ids).await?;
            self.checkpoint_progress(ids.len()).await?;
        }
        Ok(())
    }

    /// Update and persist the run checkpoint after a completion batch.
    async fn checkpoint_progress(&self, completed: usize) -> Result<()> {
        let Some(path) = self.options.checkpoint_path.as_ref() else {
            return Ok(());
        };
        let mut guard = self.checkpoint.lock().await;
        if let Some(checkpoint) = guard.as_mut() {
            checkpoint.processed_urls += completed;
            checkpoint.current_batch += 1;
            checkpoint
                .save(path)
                .map_err(|e| Error::progress(format!("saving checkpoint: {e}")))?;
        }
        Ok(())
    }

    /// Flush buffers and pending completions; called on the way out of a
    /// run and from shutdown handling.
    ///
    /// # Errors
    ///
    /// Returns an error when the progress store cannot be written.
    pub async fn finalize(&self) -> Result<()> {
        self.flush_buffer().await;
        let ids: Vec<String> = {
            let mut pending = self.pending_done.lock().await;
            pending.drain(..).collect()
        };
        if !ids.is_empty() {
            self.progress.mark_processed(&ids).await?;
            self.checkpoint_progress(ids.len()).await?;
        }
        self.progress.flush().await
    }

    /// Counters snapshot.
    pub async fn counters(&self) -> IngestCounters {
        self.counters.lock().await.clone()
    }
}
