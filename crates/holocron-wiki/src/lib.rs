//! # Wiki Processing
//!
//! Everything between raw MediaWiki markup and embedding-ready chunks:
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`markup`] | MediaWiki markup to plain text normalization |
//! | [`filter`] | Redirect/disambiguation/meta classification and canonicity |
//! | [`tokenizer`] | cl100k token counting |
//! | [`chunker`] | Section-aware chunking with a greedy paragraph splitter |
//! | [`process`] | Raw page -> normalized article pipeline stage |
//! | [`dump`] | Streaming MediaWiki XML export processor |
//!
//! All of this is pure computation over strings plus file output in the
//! dump processor; network and storage concerns live elsewhere.

/// Section-aware chunking
pub mod chunker;
/// Streaming XML export processing
pub mod dump;
/// Content classification and canonicity detection
pub mod filter;
/// Markup normalization
pub mod markup;
/// Raw page processing stage
pub mod process;
/// Token counting
pub mod tokenizer;

pub use chunker::{Chunker, ChunkerOptions, split_sections};
pub use dump::{DumpProcessor, DumpReport, article_url, collect_titles};
pub use filter::{ContentFilter, PageClassification};
pub use markup::MarkupNormalizer;
pub use process::PageProcessor;
pub use tokenizer::TokenCounter;
