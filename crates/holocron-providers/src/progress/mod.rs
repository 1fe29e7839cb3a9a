//! Progress store implementations.

/// CSV-backed progress store
mod csv_store;

pub use csv_store::CsvProgressStore;
