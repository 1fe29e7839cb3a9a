//! Parquet staging for vectors that could not be upserted.

mod parquet_stager;

pub use parquet_stager::ParquetStager;
