//! Worker pool and rate limiting for the ingest pipeline.

/// Bounded worker pool with poison-pill shutdown
mod queue;
/// Sliding-window rate limiter
mod rate_limiter;

pub use queue::WorkerPool;
pub use rate_limiter::RateLimiter;
