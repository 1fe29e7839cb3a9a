//! # Application Layer
//!
//! Use cases binding the domain ports together:
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`pipeline`] | Worker pool with poison-pill shutdown and the sliding-window rate limiter |
//! | [`ingest`] | Per-item ingest orchestration: fetch, normalize, filter, chunk, embed, upsert, mark done |
//! | [`retrieval`] | Query-side: embed the query, search the backend, return ranked passages |
//!
//! Everything here depends only on the port traits from
//! `holocron-domain`; which embedding API or vector backend is active is
//! decided by the factory in `holocron-infrastructure`.

/// Run checkpoint snapshots
pub mod checkpoint;
/// Provider decorators
pub mod decorators;
/// Ingest orchestration
pub mod ingest;
/// Worker pool and rate limiting
pub mod pipeline;
/// Query-side retrieval
pub mod retrieval;

pub use checkpoint::BatchCheckpoint;
pub use decorators::InstrumentedEmbeddingProvider;
pub use ingest::{IngestOptions, IngestService};
pub use pipeline::RateLimiter;
pub use retrieval::{RetrievalService, assemble_context};
