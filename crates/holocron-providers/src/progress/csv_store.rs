//! CSV-backed progress store.
//!
//! One row per work item, columns `url,is_processed,processed_at,
//! priority,id`. The whole file is rewritten atomically (temp file +
//! rename) on every flush; a crash mid-run leaves either the old or the
//! new file, never a torn one. Out-of-band edits are picked up on the
//! next start. Concurrent multi-process writers are not supported.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::info;

use holocron_domain::ports::ProgressStore;
use holocron_domain::{Error, Priority, Result, WorkItem};

struct State {
    /// Items in source order; order is the stable tiebreak for the queue.
    items: Vec<WorkItem>,
    /// id -> index into `items`
    index: HashMap<String, usize>,
}

impl State {
    fn insert(&mut self, item: WorkItem) {
        if let Some(&i) = self.index.get(&item.id) {
            self.items[i] = item;
        } else {
            self.index.insert(item.id.clone(), self.items.len());
            self.items.push(item);
        }
    }
}

/// Durable per-item status in a local CSV file.
pub struct CsvProgressStore {
    status_path: PathBuf,
    state: Mutex<State>,
}

impl CsvProgressStore {
    /// Open the status file, or initialize it from a source URL list
    /// (columns `id,url,priority`, header row) when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error when neither file is usable.
    pub fn open(status_path: &Path, source_csv: Option<&Path>) -> Result<Self> {
        let state = if status_path.exists() {
            let state = load_status_file(status_path)?;
            info!(
                path = %status_path.display(),
                items = state.items.len(),
                "loaded existing progress file"
            );
            state
        } else {
            let source = source_csv.ok_or_else(|| {
                Error::config(format!(
                    "no progress file at {} and no source list to initialize from",
                    status_path.display()
                ))
            })?;
            let state = init_from_source(source)?;
            let store_state = State {
                items: state.items.clone(),
                index: state.index.clone(),
            };
            write_status_file(status_path, &store_state.items)?;
            info!(
                path = %status_path.display(),
                items = store_state.items.len(),
                "created new progress file from source list"
            );
            state
        };

        Ok(Self {
            status_path: status_path.to_path_buf(),
            state: Mutex::new(state),
        })
    }

    async fn write_locked(&self, state: &State) -> Result<()> {
        write_status_file(&self.status_path, &state.items)
    }
}

fn load_status_file(path: &Path) -> Result<State> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| Error::progress_with_source("reading progress file", e))?;
    let mut state = State {
        items: Vec::new(),
        index: HashMap::new(),
    };
    for row in reader.deserialize::<StatusRow>() {
        let row = row.map_err(|e| Error::progress_with_source("parsing progress row", e))?;
        if row.url.is_empty() {
            continue;
        }
        state.insert(row.into_work_item());
    }
    Ok(state)
}

fn init_from_source(path: &Path) -> Result<State> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| Error::config(format!("reading source list {}: {e}", path.display())))?;
    let headers = reader
        .headers()
        .map_err(|e| Error::config(format!("source list headers: {e}")))?
        .clone();
    let position = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let url_col = position("url")
        .ok_or_else(|| Error::config("source list is missing a 'url' column"))?;
    let id_col = position("id");
    let priority_col = position("priority");

    let mut state = State {
        items: Vec::new(),
        index: HashMap::new(),
    };
    for (line, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| Error::config(format!("source list row {line}: {e}")))?;
        let url = record.get(url_col).unwrap_or_default().trim();
        if url.is_empty() {
            continue;
        }
        let id = id_col
            .and_then(|c| record.get(c))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map_or_else(|| format!("url-{}", line + 1), str::to_owned);
        let priority = priority_col
            .and_then(|c| record.get(c))
            .map_or(Priority::Low, Priority::parse_lenient);
        state.insert(WorkItem::new(id, url, priority));
    }
    Ok(state)
}

fn write_status_file(path: &Path, items: &[WorkItem]) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = dir {
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::progress_with_source("creating progress directory", e))?;
    }
    let tmp = tempfile::NamedTempFile::new_in(dir.unwrap_or_else(|| Path::new(".")))
        .map_err(|e| Error::progress_with_source("creating temp progress file", e))?;

    {
        let mut writer = csv::Writer::from_writer(tmp.as_file());
        writer
            .write_record(crate::constants::PROGRESS_CSV_COLUMNS)
            .map_err(|e| Error::progress_with_source("writing progress header", e))?;
        for item in items {
            writer
                .write_record(&[
                    item.url.clone(),
                    item.processed.to_string(),
                    item.processed_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
                    item.priority.to_string(),
                    item.id.clone(),
                ])
                .map_err(|e| Error::progress_with_source("writing progress row", e))?;
        }
        writer
            .flush()
            .map_err(|e| Error::progress_with_source("flushing progress file", e))?;
    }

    tmp.persist(path)
        .map_err(|e| Error::progress_with_source("replacing progress file", e.error))?;
    Ok(())
}

#[derive(serde::Deserialize)]
struct StatusRow {
    url: String,
    #[serde(default)]
    is_processed: String,
    #[serde(default)]
    processed_at: String,
    #[serde(default)]
    priority: String,
    #[serde(default)]
    id: String,
}

impl StatusRow {
    fn into_work_item(self) -> WorkItem {
        let processed = self.is_processed.trim().eq_ignore_ascii_case("true");
        let processed_at = chrono::DateTime::parse_from_rfc3339(self.processed_at.trim())
            .ok()
            .map(|t| t.with_timezone(&Utc));
        let id = if self.id.trim().is_empty() {
            self.url.clone()
        } else {
            self.id.trim().to_owned()
        };
        WorkItem {
            id,
            url: self.url,
            priority: Priority::parse_lenient(&self.priority),
            processed,
            processed_at,
            last_error: None,
            attempts: 0,
        }
    }
}

#[async_trait]
impl ProgressStore for CsvProgressStore {
    async fn unprocessed(
        &self,
        limit: Option<usize>,
        priority: Option<Priority>,
    ) -> Result<Vec<WorkItem>> {
        let state = self.state.lock().await;
        let mut pending: Vec<WorkItem> = state
            .items
            .iter()
            .filter(|item| !item.processed)
            .filter(|item| priority.is_none_or(|p| item.priority == p))
            .cloned()
            .collect();
        // Stable sort keeps source order inside each priority band.
        pending.sort_by_key(|item| item.priority);
        if let Some(limit) = limit {
            pending.truncate(limit);
        }
        Ok(pending)
    }

    async fn mark_processed(&self, ids: &[String]) -> Result<()> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        for id in ids {
            if let Some(&i) = state.index.get(id) {
                state.items[i].processed = true;
                state.items[i].processed_at = Some(now);
            }
        }
        self.write_locked(&state).await?;
        info!(count = ids.len(), "marked items processed");
        Ok(())
    }

    async fn record_failure(&self, id: &str, error: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(&i) = state.index.get(id) {
            state.items[i].attempts += 1;
            state.items[i].last_error = Some(error.to_owned());
        }
        self.write_locked(&state).await
    }

    async fn processed_count(&self) -> Result<usize> {
        let state = self.state.lock().await;
        Ok(state.items.iter().filter(|i| i.processed).count())
    }

    async fn total_count(&self) -> Result<usize> {
        let state = self.state.lock().await;
        Ok(state.items.len())
    }

    async fn flush(&self) -> Result<()> {
        let state = self.state.lock().await;
        self.write_locked(&state).await
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        for item in &mut state.items {
            item.processed = false;
            item.processed_at = None;
            item.last_error = None;
            item.attempts = 0;
        }
        self.write_locked(&state).await?;
        info!(items = state.items.len(), "progress reset, all items unprocessed");
        Ok(())
    }
}
