//! Durable state repository ports.

use async_trait::async_trait;

use crate::entities::WorkItem;
use crate::error::Result;
use crate::value_objects::Priority;

/// Durable per-item processing status, the single source of truth for
/// done-ness. A partially completed run resumes by asking for the
/// remaining unprocessed items; re-ingesting a done item is a no-op.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Unprocessed items, priority order (high first) then source order.
    async fn unprocessed(
        &self,
        limit: Option<usize>,
        priority: Option<Priority>,
    ) -> Result<Vec<WorkItem>>;

    /// Mark items done. Failures here are fatal for the run.
    async fn mark_processed(&self, ids: &[String]) -> Result<()>;

    /// Record a failed attempt without marking the item done.
    async fn record_failure(&self, id: &str, error: &str) -> Result<()>;

    /// Number of processed items.
    async fn processed_count(&self) -> Result<usize>;

    /// Total number of tracked items.
    async fn total_count(&self) -> Result<usize>;

    /// Force pending state to durable storage.
    async fn flush(&self) -> Result<()>;

    /// Destroy all progress: every item back to unprocessed with its
    /// timestamps and errors cleared. The only way items are reset.
    async fn reset(&self) -> Result<()>;
}
