//! # Infrastructure Layer
//!
//! Configuration loading, logging setup and the provider factory that
//! turns an `AppConfig` into wired services. The single `backend` flag
//! selects the vector store; nothing above this layer knows which
//! implementation is active.

/// Provider factory and service wiring
pub mod bootstrap;
/// Configuration types and loader
pub mod config;
/// Tracing initialization
pub mod logging;

pub use bootstrap::{
    build_embedding_provider, build_ingest_service, build_retrieval_service, build_vector_store,
    default_similarity_threshold,
};
pub use config::{AppConfig, BackendKind};
pub use logging::init_tracing;
