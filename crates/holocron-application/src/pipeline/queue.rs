//! Bounded worker pool with poison-pill shutdown.
//!
//! Producers enqueue work items; N workers pull and run the per-item
//! handler. After the last real item, one `None` sentinel per worker is
//! enqueued and each worker exits on receipt. A cancellation signal stops
//! intake early; items already pulled are drained to completion so the
//! progress store stays consistent.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use holocron_domain::{Result, WorkItem};

/// Fixed-size pool of worker tasks over one queue.
pub struct WorkerPool {
    num_workers: usize,
}

impl WorkerPool {
    /// Pool with `num_workers` workers (minimum 1).
    #[must_use]
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers: num_workers.max(1),
        }
    }

    /// Run `handler` over all `items` and wait for completion.
    ///
    /// The handler is invoked once per item; its errors are its own to
    /// absorb (the ingest service records failures itself), so the pool
    /// only propagates handler errors that are fatal for the run.
    ///
    /// # Errors
    ///
    /// Returns the first fatal handler error.
    pub async fn run<F, Fut>(
        &self,
        items: Vec<WorkItem>,
        handler: Arc<F>,
        shutdown: CancellationToken,
    ) -> Result<()>
    where
        F: Fn(WorkItem) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send,
    {
        let (tx, rx) = mpsc::channel::<Option<WorkItem>>(self.num_workers * 2);
        let rx = Arc::new(Mutex::new(rx));
        let fatal: Arc<Mutex<Option<holocron_domain::Error>>> = Arc::new(Mutex::new(None));

        let mut workers = Vec::with_capacity(self.num_workers);
        for worker_id in 0..self.num_workers {
            let rx = Arc::clone(&rx);
            let handler = Arc::clone(&handler);
            let fatal = Arc::clone(&fatal);
            workers.push(tokio::spawn(async move {
                debug!(worker_id, "worker started");
                loop {
                    let next = rx.lock().await.recv().await;
                    match next {
                        Some(Some(item)) => {
                            if let Err(error) = handler(item).await {
                                info!(worker_id, %error, "worker stopping on fatal error");
                                *fatal.lock().await = Some(error);
                                return;
                            }
                        }
                        // Poison pill or closed channel: done.
                        Some(None) | None => {
                            debug!(worker_id, "worker received shutdown signal");
                            return;
                        }
                    }
                }
            }));
        }

        // Workers hold the only receiver handles from here on; once they
        // all exit, sends fail instead of blocking forever.
        drop(rx);

        let total = items.len();
        let mut enqueued = 0usize;
        for item in items {
            if shutdown.is_cancelled() {
                info!(enqueued, total, "shutdown requested, stopping intake");
                break;
            }
            if tx.send(Some(item)).await.is_err() {
                break;
            }
            enqueued += 1;
        }
        // One sentinel per worker, after the last real item.
        for _ in 0..self.num_workers {
            if tx.send(None).await.is_err() {
                break;
            }
        }
        drop(tx);

        for worker in workers {
            // A panicking handler would poison nothing; the join error is
            // surfaced as a fatal run error instead.
            if let Err(join_error) = worker.await {
                return Err(holocron_domain::Error::internal(format!(
                    "worker task failed: {join_error}"
                )));
            }
        }

        if let Some(error) = fatal.lock().await.take() {
            return Err(error);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holocron_domain::Priority;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn items(n: usize) -> Vec<WorkItem> {
        (0..n)
            .map(|i| WorkItem::new(format!("{i}"), format!("https://x/wiki/{i}"), Priority::Low))
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn processes_every_item_exactly_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handler = {
            let counter = Arc::clone(&counter);
            Arc::new(move |_item: WorkItem| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
        };
        WorkerPool::new(3)
            .run(items(20), handler, CancellationToken::new())
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }

    #[tokio::test]
    async fn cancellation_stops_intake() {
        let counter = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();
        token.cancel();
        let handler = {
            let counter = Arc::clone(&counter);
            Arc::new(move |_item: WorkItem| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
        };
        WorkerPool::new(2)
            .run(items(50), handler, token)
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fatal_handler_error_stops_the_run() {
        let handler = Arc::new(|item: WorkItem| async move {
            if item.id == "3" {
                Err(holocron_domain::Error::progress("disk full"))
            } else {
                Ok(())
            }
        });
        let result = WorkerPool::new(1)
            .run(items(10), handler, CancellationToken::new())
            .await;
        assert!(result.is_err());
    }
}
