//! Port interfaces for external services and durable state.
//!
//! | Port | Description |
//! |------|-------------|
//! | [`EmbeddingProvider`] | Text embedding generation |
//! | [`VectorStoreProvider`] | Vector storage and similarity search |
//! | [`PageFetcher`] | Raw page acquisition (crawler or dump lookup) |
//! | [`ProgressStore`] | Durable per-item status for resumability |

/// External provider ports
mod providers;
/// Durable state repository ports
mod repositories;

pub use providers::{EmbeddingProvider, PageFetcher, VectorStager, VectorStoreProvider};
pub use repositories::ProgressStore;
