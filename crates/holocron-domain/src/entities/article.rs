//! Raw and normalized wiki articles.

use serde::{Deserialize, Serialize};

use crate::value_objects::{Canonicity, ContentClass};

/// Raw page content as fetched from a dump or the live wiki.
///
/// Transient: lives only between the fetch stage and normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    /// Article title
    pub title: String,
    /// Source URL
    pub url: String,
    /// MediaWiki namespace
    pub namespace: i32,
    /// Latest revision id
    pub revision_id: String,
    /// Raw wiki markup
    pub wikitext: String,
}

/// Article after markup normalization and content classification.
///
/// Produced by the normalizer + content filter, consumed by the chunker.
/// Serialized one-file-per-article into dump batch directories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedArticle {
    /// Article title
    pub title: String,
    /// Original wiki markup, kept for the batch files
    pub content: String,
    /// Markup-free text with `# `/`## ` heading markers
    pub plain_text: String,
    /// `Category:...` names in source order
    pub categories: Vec<String>,
    /// Canon / Legends / unknown (null in the JSON files)
    pub is_canonical: Option<bool>,
    /// MediaWiki namespace
    pub namespace: i32,
    /// Latest revision id
    pub revision_id: String,
    /// Structural classification
    #[serde(default = "default_content_class")]
    pub content_class: ContentClass,
    /// Source URL
    #[serde(default)]
    pub url: String,
}

fn default_content_class() -> ContentClass {
    ContentClass::Content
}

impl NormalizedArticle {
    /// Canonicity as the three-valued domain enum.
    #[must_use]
    pub fn canonicity(&self) -> Canonicity {
        match self.is_canonical {
            Some(true) => Canonicity::Canon,
            Some(false) => Canonicity::Legends,
            None => Canonicity::Unknown,
        }
    }

    /// Whether the article was tagged as a stub.
    #[must_use]
    pub fn is_stub(&self) -> bool {
        self.content_class == ContentClass::Stub
    }
}
