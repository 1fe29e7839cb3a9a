//! Tagged classification types for pages and work items.
//!
//! The surrounding voice system passed these around as loosely-typed dict
//! fields; here they are discriminated unions so the compiler tracks every
//! site that branches on them.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Work item priority. Ordering is queue order: high first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Processed before everything else
    #[display("high")]
    High,
    /// Default backlog order
    #[display("medium")]
    Medium,
    /// Picked up last
    #[display("low")]
    Low,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Low
    }
}

impl Priority {
    /// Parse a priority from its CSV/CLI spelling. Unknown values map to
    /// `Low`, matching how the source exports treat blank cells.
    #[must_use]
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "medium" => Self::Medium,
            _ => Self::Low,
        }
    }
}

/// Continuity assignment of an article. Metadata only, never a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum Canonicity {
    /// Explicitly or heuristically Canon
    #[display("canon")]
    Canon,
    /// Explicitly or heuristically Legends
    #[display("legends")]
    Legends,
    /// No marker found and heuristics were inconclusive
    #[display("unknown")]
    Unknown,
}

impl Default for Canonicity {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Structural classification of a wiki page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum ContentClass {
    /// Regular article content
    #[display("content")]
    Content,
    /// `#REDIRECT [[...]]` page
    #[display("redirect")]
    Redirect,
    /// Disambiguation page
    #[display("disambiguation")]
    Disambiguation,
    /// Maintenance or template-dominated page
    #[display("meta_utility")]
    MetaUtility,
    /// Short article tagged as a stub; still processed
    #[display("stub")]
    Stub,
}

/// Reason a page was accepted or rejected by the content filter.
///
/// Stubs deliberately do not appear here: the current policy processes
/// them and records the stub flag in chunk metadata instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum FilterReason {
    /// Page passed all filters
    #[display("content")]
    Content,
    /// Rejected: redirect page
    #[display("redirect")]
    Redirect,
    /// Rejected: disambiguation page
    #[display("disambiguation")]
    Disambiguation,
    /// Rejected: maintenance/meta page
    #[display("meta_utility")]
    MetaUtility,
}

impl FilterReason {
    /// Whether a page with this reason continues through the pipeline.
    #[must_use]
    pub fn should_process(self) -> bool {
        matches!(self, Self::Content)
    }
}
