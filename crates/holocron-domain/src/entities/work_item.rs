//! Ingest work items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::Priority;

/// One unit of ingest work: a single article URL (or wiki title).
///
/// Created when a dump or URL list is imported, updated only by the
/// orchestrator, destroyed only by an explicit reset. The progress store
/// is the single source of truth for `processed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Stable identifier from the source list
    pub id: String,
    /// Source URL (or wiki title for dump-backed runs)
    pub url: String,
    /// Queue priority
    #[serde(default)]
    pub priority: Priority,
    /// Whether the item has been fully handled (success, filtered, or
    /// permanently failed)
    #[serde(default)]
    pub processed: bool,
    /// When the item was marked processed
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
    /// Last recorded error, if any
    #[serde(default)]
    pub last_error: Option<String>,
    /// Failed attempts so far across runs
    #[serde(default)]
    pub attempts: u32,
}

impl WorkItem {
    /// New unprocessed item.
    #[must_use]
    pub fn new<S: Into<String>, U: Into<String>>(id: S, url: U, priority: Priority) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            priority,
            processed: false,
            processed_at: None,
            last_error: None,
            attempts: 0,
        }
    }

    /// Wiki article title derived from the URL path.
    #[must_use]
    pub fn title(&self) -> String {
        self.url
            .rsplit_once("/wiki/")
            .map_or_else(|| self.url.clone(), |(_, tail)| tail.replace('_', " "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_from_wiki_url() {
        let item = WorkItem::new(
            "1",
            "https://starwars.fandom.com/wiki/Oga's_Cantina",
            Priority::High,
        );
        assert_eq!(item.title(), "Oga's Cantina");
    }

    #[test]
    fn title_falls_back_to_raw_url() {
        let item = WorkItem::new("1", "DJ R3X", Priority::Low);
        assert_eq!(item.title(), "DJ R3X");
    }
}
