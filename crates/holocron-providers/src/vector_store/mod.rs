//! Vector store providers.
//!
//! Three implementations of the one `VectorStoreProvider` contract: the
//! managed HTTP index, the SQL+pgvector store, and an in-memory store for
//! tests. The factory in `holocron-infrastructure` selects between the
//! first two from the `backend` configuration flag; callers never depend
//! on which one is active.

/// In-memory store (tests, contract reference)
mod memory;
/// Managed HTTP index backend
mod managed;
/// SQL + pgvector backend
mod pgvector;

pub use managed::{ManagedIndexConfig, ManagedIndexProvider};
pub use memory::InMemoryVectorStore;
pub use pgvector::{PgVectorConfig, PgVectorProvider};
