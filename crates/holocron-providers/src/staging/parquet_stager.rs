//! Parquet shard writer for staged vectors.
//!
//! When upserts exhaust their retries, the affected records are staged to
//! disk for out-of-band import instead of being lost: snappy-compressed
//! shards with columns `id: string`, `values: list<float>`,
//! `metadata: json string`, capped at a configured row count per file.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use arrow::array::{ArrayRef, Float32Builder, ListBuilder, StringBuilder};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tracing::info;

use holocron_domain::constants::STAGING_ROWS_PER_FILE;
use holocron_domain::{Error, Result, VectorRecord};

use crate::constants::STAGING_FILE_PREFIX;

/// Writes vector records into numbered parquet shards.
pub struct ParquetStager {
    dir: PathBuf,
    rows_per_file: usize,
    next_shard: AtomicUsize,
}

impl ParquetStager {
    /// Stager writing into `dir` with the default row cap.
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self::with_rows_per_file(dir, STAGING_ROWS_PER_FILE)
    }

    /// Stager with an explicit row cap per shard.
    #[must_use]
    pub fn with_rows_per_file(dir: PathBuf, rows_per_file: usize) -> Self {
        Self {
            dir,
            rows_per_file: rows_per_file.max(1),
            next_shard: AtomicUsize::new(1),
        }
    }

    /// Stage records to one or more shards; returns the files written.
    ///
    /// # Errors
    ///
    /// Returns an error when a shard cannot be written.
    pub fn stage(&self, records: &[VectorRecord]) -> Result<Vec<PathBuf>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        std::fs::create_dir_all(&self.dir)?;

        let mut written = Vec::new();
        for chunk in records.chunks(self.rows_per_file) {
            let shard = self.next_shard.fetch_add(1, Ordering::SeqCst);
            let path = self
                .dir
                .join(format!("{STAGING_FILE_PREFIX}{shard:04}.parquet"));
            write_shard(&path, chunk)?;
            info!(path = %path.display(), rows = chunk.len(), "staged vectors to parquet");
            written.push(path);
        }
        Ok(written)
    }
}

impl holocron_domain::ports::VectorStager for ParquetStager {
    fn stage(&self, records: &[VectorRecord]) -> Result<Vec<PathBuf>> {
        ParquetStager::stage(self, records)
    }
}

fn write_shard(path: &Path, records: &[VectorRecord]) -> Result<()> {
    let mut ids = StringBuilder::new();
    let mut values = ListBuilder::new(Float32Builder::new());
    let mut metadata = StringBuilder::new();

    for record in records {
        ids.append_value(&record.id);
        for component in &record.values {
            values.values().append_value(*component);
        }
        values.append(true);
        let json = serde_json::to_string(&record.metadata)?;
        metadata.append_value(json);
    }

    let batch = RecordBatch::try_from_iter(vec![
        ("id", std::sync::Arc::new(ids.finish()) as ArrayRef),
        ("values", std::sync::Arc::new(values.finish()) as ArrayRef),
        ("metadata", std::sync::Arc::new(metadata.finish()) as ArrayRef),
    ])
    .map_err(|e| Error::internal(format!("building staging batch: {e}")))?;

    let file = File::create(path)?;
    let properties = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(properties))
        .map_err(|e| Error::internal(format!("opening parquet writer: {e}")))?;
    writer
        .write(&batch)
        .map_err(|e| Error::internal(format!("writing parquet shard: {e}")))?;
    writer
        .close()
        .map_err(|e| Error::internal(format!("closing parquet shard: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use serde_json::json;

    fn record(id: &str) -> VectorRecord {
        let mut metadata = serde_json::Map::new();
        metadata.insert("title".to_owned(), json!(id));
        metadata.insert("content".to_owned(), json!(format!("text for {id}")));
        VectorRecord {
            id: id.to_owned(),
            values: vec![0.1, 0.2, 0.3],
            metadata,
        }
    }

    #[test]
    fn stages_records_into_numbered_shards() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        let stager = ParquetStager::with_rows_per_file(dir.path().to_path_buf(), 2);

        let records: Vec<VectorRecord> =
            (0..5).map(|i| record(&format!("rec_{i}"))).collect();
        let files = stager.stage(&records).unwrap_or_else(|e| panic!("stage: {e}"));

        assert_eq!(files.len(), 3);
        assert!(files[0].ends_with("batch_0001.parquet"));
        assert!(files[2].ends_with("batch_0003.parquet"));
        assert!(files.iter().all(|f| f.exists()));
    }

    #[test]
    fn shards_round_trip_through_a_parquet_reader() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        let stager = ParquetStager::new(dir.path().to_path_buf());
        let files = stager
            .stage(&[record("dj-r3x_0"), record("oga_0")])
            .unwrap_or_else(|e| panic!("stage: {e}"));
        assert_eq!(files.len(), 1);

        let file = File::open(&files[0]).unwrap_or_else(|e| panic!("open: {e}"));
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap_or_else(|e| panic!("reader: {e}"))
            .build()
            .unwrap_or_else(|e| panic!("build: {e}"));
        let batches: Vec<RecordBatch> = reader
            .collect::<std::result::Result<_, _>>()
            .unwrap_or_else(|e| panic!("read: {e}"));

        let rows: usize = batches.iter().map(RecordBatch::num_rows).sum();
        assert_eq!(rows, 2);
        let schema = batches[0].schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["id", "values", "metadata"]);
    }

    #[test]
    fn empty_input_writes_nothing() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        let stager = ParquetStager::new(dir.path().to_path_buf());
        let files = stager.stage(&[]).unwrap_or_else(|e| panic!("{e}"));
        assert!(files.is_empty());
        let entries = std::fs::read_dir(dir.path())
            .map(|d| d.count())
            .unwrap_or_default();
        assert_eq!(entries, 0);
    }
}
