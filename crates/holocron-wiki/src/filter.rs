//! Content classification for wiki pages.
//!
//! Decides which pages are worth embedding (redirects, disambiguation and
//! maintenance pages are not) and tags canonicity and stub status as
//! metadata. Filtering is a hard gate; canonicity never is.

use std::sync::LazyLock;

use regex::Regex;

use holocron_domain::constants::{MIN_CONTENT_LENGTH, TEMPLATE_RATIO_THRESHOLD};
use holocron_domain::{Canonicity, ContentClass, FilterReason};

/// Templates excluded from the meta/utility template-ratio numerator.
/// These carry article content or continuity markers, not maintenance.
const IMPORTANT_TEMPLATES: [&str; 23] = [
    "canon",
    "legends",
    "infobox",
    "quote",
    "citation",
    "cite",
    "reference",
    "c",
    "character",
    "era",
    "faction",
    "location",
    "planet",
    "species",
    "vehicle",
    "weapon",
    "organization",
    "class",
    "appearance",
    "featured",
    "film",
    "media",
    "eras",
];

static REDIRECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*#redirect\s*\[\[(.*?)\]\]")
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static DISAMBIG_TEMPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\{\{(disambig|disambiguation|dab)[|}]")
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static DISAMBIG_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)may refer to|disambiguation page")
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static DISAMBIG_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\(disambiguation\)").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static MAINTENANCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\{\{(cleanup|delete|speedy|copyvio|copypaste|merge|split)[|}]")
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static MAGIC_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^__(NOTOC|NOEDITSECTION|FORCETOC|NEWSECTIONLINK)__")
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static STUB_TEMPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\{\{(stub|sectionstub|expansion|expand|[^{}|]*-stub)[|}]")
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static CATEGORY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[Category:([^\]|]+)(?:\|[^\]]*)?\]\]")
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static TEMPLATE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{").unwrap_or_else(|e| unreachable!("static regex: {e}")));
static SECTION_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^==([^=].*?)==\s*$").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static INFOBOX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\{\{infobox\s+\w+").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<ref>|\{\{cite").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static QUALITY_CATEGORY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[\[Category:Wookieepedia (Featured|Good) articles\]\]")
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

// Canonicity markers, checked in order. Explicit tags first, then category
// forms, then prose references.
static CANON_MARKERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\{\{canon\}\}|\{\{canon article\}\}|\{\{canon[ -]",
        r"\{\{Top\|can[^}]*\}\}",
        r"\{\{Top\|[^}]*canon=",
        r"(?i)\[\[category:canon",
        r"(?i)from a \[\[canon\]\] source|is a \[\[canon\]\] ",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap_or_else(|e| unreachable!("static regex: {e}")))
    .collect()
});
static LEGENDS_MARKERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\{\{legends\}\}|\{\{legends article\}\}|\{\{star wars legends\}\}|\{\{legends[ -]",
        r"\{\{Top\|leg[^}]*\}\}",
        r"(?i)\[\[category:legends",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap_or_else(|e| unreachable!("static regex: {e}")))
    .collect()
});
static DISNEY_ERA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Disney XD|Disney\+|Disney|Forces of Destiny|Resistance|High Republic|Sequel trilogy")
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

/// Full classification of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageClassification {
    /// Accept/reject decision with reason
    pub reason: FilterReason,
    /// Canon / Legends / unknown tag
    pub canonicity: Canonicity,
    /// Stub tag (processed anyway)
    pub stub: bool,
    /// Extracted `Category:...` names in source order
    pub categories: Vec<String>,
}

impl PageClassification {
    /// Structural content class combining reason and stub tag.
    #[must_use]
    pub fn content_class(&self) -> ContentClass {
        match self.reason {
            FilterReason::Redirect => ContentClass::Redirect,
            FilterReason::Disambiguation => ContentClass::Disambiguation,
            FilterReason::MetaUtility => ContentClass::MetaUtility,
            FilterReason::Content if self.stub => ContentClass::Stub,
            FilterReason::Content => ContentClass::Content,
        }
    }
}

/// Filter for identifying and excluding non-content pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentFilter;

impl ContentFilter {
    /// New filter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Whether the wikitext is a redirect page.
    #[must_use]
    pub fn is_redirect(&self, wikitext: &str) -> bool {
        REDIRECT.is_match(wikitext)
    }

    /// Whether the page is a disambiguation page.
    #[must_use]
    pub fn is_disambiguation(&self, title: &str, wikitext: &str) -> bool {
        DISAMBIG_TITLE.is_match(title)
            || DISAMBIG_TEMPLATE.is_match(wikitext)
            || DISAMBIG_PHRASE.is_match(wikitext)
    }

    /// Whether the page is a maintenance/meta page: explicit maintenance
    /// templates, magic words, or template markup dominating the content.
    #[must_use]
    pub fn is_meta_utility(&self, wikitext: &str) -> bool {
        if MAINTENANCE.is_match(wikitext) || MAGIC_WORD.is_match(wikitext) {
            return true;
        }
        let total_templates = TEMPLATE_OPEN.find_iter(wikitext).count();
        let important = count_important_templates(wikitext);
        let length = wikitext.len();
        if length == 0 {
            return false;
        }
        let ratio = total_templates.saturating_sub(important) as f64 / length as f64;
        ratio > TEMPLATE_RATIO_THRESHOLD
    }

    /// Stub detection. Quality indicators (featured/good categories,
    /// references, multiple sections, infobox plus prose, explicit
    /// continuity markers) veto the stub tag; otherwise a stub template
    /// plus short cleaned text, or very short text alone, earns it.
    #[must_use]
    pub fn is_stub(&self, wikitext: &str, plain_text: Option<&str>) -> bool {
        if QUALITY_CATEGORY.is_match(wikitext) {
            return false;
        }

        let text_length = plain_text.map_or_else(
            || cleaned_length(wikitext),
            |plain| plain.trim().chars().count(),
        );

        // Outdated stub templates on grown articles are ignored.
        let has_stub_template = STUB_TEMPLATE.is_match(wikitext) && text_length < 500;

        if self.has_quality_indicators(wikitext) {
            return false;
        }

        match detect_canonicity(wikitext) {
            Canonicity::Canon => has_stub_template && text_length < 100,
            Canonicity::Legends => has_stub_template || text_length < 100,
            Canonicity::Unknown => {
                if INFOBOX.is_match(wikitext) {
                    return text_length < 80;
                }
                if SECTION_HEADING.find_iter(wikitext).count() >= 2 {
                    return text_length < 100;
                }
                if has_stub_template && text_length < MIN_CONTENT_LENGTH {
                    return true;
                }
                text_length < MIN_CONTENT_LENGTH
            }
        }
    }

    fn has_quality_indicators(&self, wikitext: &str) -> bool {
        if REFERENCE.is_match(wikitext) {
            return true;
        }
        if SECTION_HEADING.find_iter(wikitext).count() >= 2 {
            return true;
        }
        if (CANON_MARKERS.iter().any(|m| m.is_match(wikitext))
            || LEGENDS_MARKERS.iter().any(|m| m.is_match(wikitext)))
            && cleaned_length(wikitext) > 50
        {
            return true;
        }
        INFOBOX.is_match(wikitext) && cleaned_length(wikitext) > 30
    }

    /// Hard gate: should the page be processed, and why / why not.
    #[must_use]
    pub fn should_process(&self, title: &str, wikitext: &str) -> (bool, FilterReason) {
        if self.is_redirect(wikitext) {
            return (false, FilterReason::Redirect);
        }
        if self.is_disambiguation(title, wikitext) {
            return (false, FilterReason::Disambiguation);
        }
        if self.is_meta_utility(wikitext) {
            return (false, FilterReason::MetaUtility);
        }
        // Stubs pass: the current policy processes them and records the
        // tag in metadata.
        (true, FilterReason::Content)
    }

    /// Classify a page in one pass.
    #[must_use]
    pub fn classify(
        &self,
        title: &str,
        wikitext: &str,
        plain_text: Option<&str>,
    ) -> PageClassification {
        let (_, reason) = self.should_process(title, wikitext);
        PageClassification {
            reason,
            canonicity: detect_canonicity(wikitext),
            stub: reason == FilterReason::Content && self.is_stub(wikitext, plain_text),
            categories: extract_categories(wikitext),
        }
    }
}

/// Extract `Category:Name` entries in source order, deduplicated.
#[must_use]
pub fn extract_categories(wikitext: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut categories = Vec::new();
    for caps in CATEGORY.captures_iter(wikitext) {
        let name = format!("Category:{}", caps[1].trim());
        if seen.insert(name.clone()) {
            categories.push(name);
        }
    }
    categories
}

/// Detect canonicity from explicit markers, then heuristics.
///
/// Heuristics are best-effort and can misclassify; the result is metadata
/// only and never gates processing.
#[must_use]
pub fn detect_canonicity(wikitext: &str) -> Canonicity {
    if CANON_MARKERS.iter().any(|m| m.is_match(wikitext)) {
        return Canonicity::Canon;
    }
    if LEGENDS_MARKERS.iter().any(|m| m.is_match(wikitext)) {
        return Canonicity::Legends;
    }
    // Disney-era proper nouns only exist in Canon material.
    if DISNEY_ERA.is_match(wikitext) {
        return Canonicity::Canon;
    }
    // Frequent untagged "Legends" mentions in a short article.
    if wikitext.len() < 5000 && wikitext.matches("Legends").count() > 5 {
        return Canonicity::Legends;
    }
    Canonicity::Unknown
}

fn count_important_templates(wikitext: &str) -> usize {
    let lower = wikitext.to_lowercase();
    IMPORTANT_TEMPLATES
        .iter()
        .map(|t| lower.matches(&format!("{{{{{t}")).count())
        .sum()
}

/// Length of the wikitext with templates, categories, links and italics
/// stripped, the cheap approximation used by the stub thresholds.
fn cleaned_length(wikitext: &str) -> usize {
    static STRIP_TEMPLATE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\{\{[^}]*\}\}").unwrap_or_else(|e| unreachable!("static regex: {e}"))
    });
    static STRIP_CATEGORY: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\[\[Category:[^\]]*\]\]").unwrap_or_else(|e| unreachable!("static regex: {e}"))
    });
    static STRIP_LINK: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\[\[([^\]]*)\]\]").unwrap_or_else(|e| unreachable!("static regex: {e}"))
    });
    let text = STRIP_TEMPLATE.replace_all(wikitext, "");
    let text = STRIP_CATEGORY.replace_all(&text, "");
    let text = STRIP_LINK.replace_all(&text, "$1");
    let text = text.replace("''", "");
    text.trim().chars().count()
}
