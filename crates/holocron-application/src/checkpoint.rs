//! Batch checkpoint JSON for ingest runs.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use holocron_domain::{Error, Result};

/// Progress snapshot of a batch-processing run.
///
/// Written alongside parquet staging output; on restart a partially
/// completed run picks up from `processed_urls`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchCheckpoint {
    /// Items in this run
    pub total_urls: usize,
    /// Items completed so far
    pub processed_urls: usize,
    /// Items that failed permanently
    pub failed_urls: Vec<String>,
    /// Last completed batch number
    pub current_batch: usize,
    /// When the run started
    pub start_time: DateTime<Utc>,
    /// When this checkpoint was written
    pub last_checkpoint: DateTime<Utc>,
}

impl BatchCheckpoint {
    /// Fresh checkpoint for a run over `total_urls` items.
    #[must_use]
    pub fn new(total_urls: usize) -> Self {
        let now = Utc::now();
        Self {
            total_urls,
            processed_urls: 0,
            failed_urls: Vec::new(),
            current_batch: 0,
            start_time: now,
            last_checkpoint: now,
        }
    }

    /// Load a checkpoint file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file is unreadable or malformed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let checkpoint = serde_json::from_str(&content)?;
        Ok(checkpoint)
    }

    /// Write the checkpoint, stamping `last_checkpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.last_checkpoint = Utc::now();
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|e| Error::progress_with_source("writing checkpoint", e))?;
        info!(path = %path.display(), processed = self.processed_urls, "checkpoint saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        let path = dir.path().join("checkpoints/run.json");

        let mut checkpoint = BatchCheckpoint::new(5);
        checkpoint.processed_urls = 2;
        checkpoint.failed_urls.push("https://example.org/broken".to_owned());
        checkpoint.current_batch = 1;
        checkpoint.save(&path).unwrap_or_else(|e| panic!("save: {e}"));

        let loaded = BatchCheckpoint::load(&path).unwrap_or_else(|e| panic!("load: {e}"));
        assert_eq!(loaded.total_urls, 5);
        assert_eq!(loaded.processed_urls, 2);
        assert_eq!(loaded.failed_urls.len(), 1);
        assert_eq!(loaded.current_batch, 1);
    }

    #[test]
    fn loading_a_missing_file_errors() {
        assert!(BatchCheckpoint::load(Path::new("/nonexistent/checkpoint.json")).is_err());
    }
}
