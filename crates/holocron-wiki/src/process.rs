//! Raw page -> normalized article pipeline stage.
//!
//! Shared by the dump processor and the live-crawl orchestrator so both
//! paths classify and normalize identically.

use holocron_domain::{FilterReason, NormalizedArticle, RawPage};

use crate::filter::ContentFilter;
use crate::markup::MarkupNormalizer;

/// Outcome of processing one raw page.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedPage {
    /// The normalized article, present only when the page passed the gate
    pub article: Option<NormalizedArticle>,
    /// Filter decision
    pub reason: FilterReason,
}

/// Combines markup normalization and content classification.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageProcessor {
    normalizer: MarkupNormalizer,
    filter: ContentFilter,
}

impl PageProcessor {
    /// New processor.
    #[must_use]
    pub fn new() -> Self {
        Self {
            normalizer: MarkupNormalizer::new(),
            filter: ContentFilter::new(),
        }
    }

    /// The content filter, for callers that only classify.
    #[must_use]
    pub fn filter(&self) -> &ContentFilter {
        &self.filter
    }

    /// Normalize and classify one raw page.
    ///
    /// Filtered pages come back with `article: None` and the reason;
    /// accepted pages carry the full normalized article with canonicity,
    /// stub tag and categories resolved.
    #[must_use]
    pub fn process(&self, page: &RawPage) -> ProcessedPage {
        let (process, reason) = self.filter.should_process(&page.title, &page.wikitext);
        if !process {
            return ProcessedPage {
                article: None,
                reason,
            };
        }

        let plain_text = self.normalizer.normalize(&page.wikitext);
        let classification = self
            .filter
            .classify(&page.title, &page.wikitext, Some(&plain_text));

        let article = NormalizedArticle {
            title: page.title.clone(),
            content: page.wikitext.clone(),
            plain_text,
            categories: classification.categories.clone(),
            is_canonical: match classification.canonicity {
                holocron_domain::Canonicity::Canon => Some(true),
                holocron_domain::Canonicity::Legends => Some(false),
                holocron_domain::Canonicity::Unknown => None,
            },
            namespace: page.namespace,
            revision_id: page.revision_id.clone(),
            content_class: classification.content_class(),
            url: page.url.clone(),
        };

        ProcessedPage {
            article: Some(article),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holocron_domain::{Canonicity, ContentClass};

    fn page(title: &str, wikitext: &str) -> RawPage {
        RawPage {
            title: title.to_owned(),
            url: format!("https://starwars.fandom.com/wiki/{}", title.replace(' ', "_")),
            namespace: 0,
            revision_id: "42".to_owned(),
            wikitext: wikitext.to_owned(),
        }
    }

    #[test]
    fn content_page_is_normalized() {
        let processed = PageProcessor::new().process(&page(
            "DJ R3X",
            "{{Canon}}'''DJ R3X''' is a [[droid]] DJ at [[Oga's Cantina|the cantina]].\n\
             == History ==\nFormer [[Star Tours]] pilot.\n[[Category:Droids]]",
        ));
        assert_eq!(processed.reason, FilterReason::Content);
        let article = processed.article.unwrap_or_else(|| panic!("expected article"));
        assert_eq!(article.canonicity(), Canonicity::Canon);
        assert_eq!(article.categories, vec!["Category:Droids".to_owned()]);
        assert!(article.plain_text.contains("DJ R3X is a droid DJ at the cantina."));
        assert!(article.plain_text.contains("# History"));
        assert!(!article.plain_text.contains("[["));
    }

    #[test]
    fn redirect_is_filtered_with_reason() {
        let processed =
            PageProcessor::new().process(&page("Star Tours", "#REDIRECT [[Star Tours (attraction)]]"));
        assert_eq!(processed.reason, FilterReason::Redirect);
        assert!(processed.article.is_none());
    }

    #[test]
    fn stub_is_processed_and_tagged() {
        let processed = PageProcessor::new().process(&page("Blurrg", "{{stub}}A beast of burden."));
        assert_eq!(processed.reason, FilterReason::Content);
        let article = processed.article.unwrap_or_else(|| panic!("expected article"));
        assert_eq!(article.content_class, ContentClass::Stub);
        assert!(article.is_stub());
    }
}
