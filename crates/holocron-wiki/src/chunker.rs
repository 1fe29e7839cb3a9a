//! Section-aware article chunking.
//!
//! Every article yields at least one chunk (a title-only chunk when the
//! page carries no prose), section chunks follow source order, and
//! oversized sections are split on paragraph boundaries with a greedy
//! accumulator. Chunks never exceed the token budget unless a single
//! paragraph alone does; those are emitted whole and flagged.

use holocron_domain::constants::MAX_CHUNK_TOKENS;
use holocron_domain::{ArticleChunk, ChunkMetadata, NormalizedArticle, Priority};

use crate::tokenizer::TokenCounter;

/// One (heading, body) pair from the normalized plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Heading text, `Introduction` for the implicit lead section
    pub heading: String,
    /// Body text of the section
    pub body: String,
}

/// Split normalized plain text into sections on top-level `# ` markers.
///
/// Everything before the first marker becomes the implicit Introduction
/// section; sub-headings (`## `, `### `) stay inside their section body.
#[must_use]
pub fn split_sections(plain_text: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut heading = "Introduction".to_owned();
    let mut body = String::new();

    for line in plain_text.lines() {
        if let Some(title) = line.strip_prefix("# ") {
            sections.push(Section {
                heading: std::mem::replace(&mut heading, title.trim().to_owned()),
                body: std::mem::take(&mut body),
            });
        } else {
            if !body.is_empty() {
                body.push('\n');
            }
            body.push_str(line);
        }
    }
    sections.push(Section { heading, body });

    for section in &mut sections {
        section.body = section.body.trim().to_owned();
    }
    sections
}

/// Chunker tuning knobs.
#[derive(Debug, Clone)]
pub struct ChunkerOptions {
    /// Token budget per chunk
    pub max_chunk_tokens: usize,
    /// Re-prepend the section header to every sub-chunk of a split
    /// section. Whether the duplication helps retrieval is an open
    /// empirical question, hence the knob.
    pub repeat_section_header: bool,
}

impl Default for ChunkerOptions {
    fn default() -> Self {
        Self {
            max_chunk_tokens: MAX_CHUNK_TOKENS,
            repeat_section_header: true,
        }
    }
}

/// Splits normalized articles into embedding-sized chunks.
#[derive(Debug, Clone)]
pub struct Chunker {
    counter: TokenCounter,
    options: ChunkerOptions,
}

impl Chunker {
    /// New chunker with the default budget.
    #[must_use]
    pub fn new(counter: TokenCounter) -> Self {
        Self {
            counter,
            options: ChunkerOptions::default(),
        }
    }

    /// New chunker with explicit options.
    #[must_use]
    pub fn with_options(counter: TokenCounter, options: ChunkerOptions) -> Self {
        Self { counter, options }
    }

    /// Chunk one article. `article_id` seeds the stable chunk ids.
    #[must_use]
    pub fn chunk_article(
        &self,
        article: &NormalizedArticle,
        article_id: &str,
        priority: Priority,
    ) -> Vec<ArticleChunk> {
        let mut builder = ChunkBuilder {
            chunker: self,
            article_id,
            metadata_template: ChunkMetadata {
                title: article.title.clone(),
                source: article.url.clone(),
                section: String::new(),
                categories: article.categories.clone(),
                priority,
                canonicity: article.canonicity(),
                stub: article.is_stub(),
            },
            chunks: Vec::new(),
        };

        let sections = split_sections(&article.plain_text);
        let (intro, rest) = sections
            .split_first()
            .map_or((None, &sections[..]), |(first, rest)| (Some(first), rest));

        // The introduction chunk always exists so every article is
        // retrievable by title.
        match intro {
            Some(section) if !section.body.is_empty() => {
                let header = format!("# {}\n\n", article.title);
                builder.emit_section("Introduction", &header, &section.body);
            }
            _ => {
                let content = format!(
                    "# {title}\n\nStar Wars entity: {title}.",
                    title = article.title
                );
                builder.push_whole("Title", content, false);
            }
        }

        for section in rest {
            if section.body.is_empty() {
                continue;
            }
            let header = format!("# {} - {}\n\n", article.title, section.heading);
            builder.emit_section(&section.heading, &header, &section.body);
        }

        builder.chunks
    }
}

/// Accumulates chunks for one article, assigning ordinal ids.
struct ChunkBuilder<'a> {
    chunker: &'a Chunker,
    article_id: &'a str,
    metadata_template: ChunkMetadata,
    chunks: Vec<ArticleChunk>,
}

impl ChunkBuilder<'_> {
    fn push_whole(&mut self, section: &str, content: String, oversize: bool) {
        let content = content.trim_end().to_owned();
        let content_tokens = self.chunker.counter.count(&content);
        let mut metadata = self.metadata_template.clone();
        metadata.section = section.to_owned();
        self.chunks.push(ArticleChunk {
            id: ArticleChunk::make_id(self.article_id, self.chunks.len()),
            content,
            content_tokens,
            oversize,
            metadata,
        });
    }

    /// Emit one section as a chunk, splitting on paragraph boundaries when
    /// the whole section busts the token budget.
    fn emit_section(&mut self, section: &str, header: &str, body: &str) {
        let max = self.chunker.options.max_chunk_tokens;
        let whole = format!("{header}{body}");
        if self.chunker.counter.count(&whole) <= max {
            self.push_whole(section, whole, false);
            return;
        }

        let continuation_header = if self.chunker.options.repeat_section_header {
            header
        } else {
            ""
        };
        let mut current = header.to_owned();
        let mut first = true;

        for paragraph in body.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            let candidate = format!("{current}{paragraph}\n\n");
            if self.chunker.counter.count(candidate.trim_end()) > max {
                let base = if first { header } else { continuation_header };
                if current.trim_end() != base.trim_end() {
                    // Flush the accumulated chunk and start a fresh one.
                    self.push_whole(section, std::mem::take(&mut current), false);
                    first = false;
                    current = format!("{continuation_header}{paragraph}\n\n");
                    // A paragraph that alone exceeds the budget is
                    // indivisible: emit it whole, flagged oversize.
                    if self.chunker.counter.count(current.trim_end()) > max {
                        self.push_whole(section, std::mem::take(&mut current), true);
                        current = continuation_header.to_owned();
                    }
                } else {
                    // Single indivisible paragraph straight away.
                    self.push_whole(section, candidate, true);
                    first = false;
                    current = continuation_header.to_owned();
                }
            } else {
                current = candidate;
            }
        }

        let base = if first { header } else { continuation_header };
        if current.trim_end() != base.trim_end() && !current.trim().is_empty() {
            self.push_whole(section, current, false);
        }
    }
}
