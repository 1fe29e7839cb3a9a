//! MediaWiki markup to plain text conversion.
//!
//! The normalizer applies a fixed rule pipeline: comments and references,
//! file/image and category links, templates (innermost-first to fixpoint),
//! wiki links, residual HTML, apostrophe formatting, section headers,
//! lists, tables, then whitespace cleanup. Output never contains `{{`,
//! `[[`, `<ref` or table delimiters for well-formed input, and running the
//! normalizer over its own output is a no-op.

use std::sync::LazyLock;

use regex::Regex;

/// Templates dropped outright rather than reduced to an argument.
const SKIP_TEMPLATES: [&str; 4] = ["cite", "ref", "dead link", "citation needed"];

/// Upper bound on innermost-first template collapse passes. Real pages
/// nest a handful of levels; the cap only guards against pathological
/// unbalanced input.
const MAX_TEMPLATE_PASSES: usize = 16;

static COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--.*?-->").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static REF_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?si)<ref[^>/]*>.*?</ref>").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static REF_SELF_CLOSING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<ref[^>]*/>").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static TEMPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{([^{}]*)\}\}").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static INTERNAL_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[([^\[\]]+)\]\]").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static EXTERNAL_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(?:https?|ftp)[^\[\]\s]*\s+([^\]]+)\]")
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static CATEGORY_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[\[Category:[^\]]+\]\]").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"</?[A-Za-z][^>\n]*>").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(={2,6})\s*([^=\n]+?)\s*=*\s*$")
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\{\|.*?\|\}").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static TABLE_CELL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\|\s*([^|\n\[\]{}]+)").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static MULTI_NEWLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n{3,}").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r" {2,}").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static SPACE_AROUND_NEWLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r" *\n *").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

/// Converts MediaWiki markup to clean plain text.
///
/// Stateless and cheap to share; all patterns are compiled once per
/// process.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupNormalizer;

impl MarkupNormalizer {
    /// New normalizer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Convert wiki markup to plain text. Never fails; unknown
    /// constructs fall through unchanged.
    ///
    /// The file/category strip runs before link replacement so media
    /// links vanish instead of degrading into their captions.
    #[must_use]
    pub fn normalize(&self, wikitext: &str) -> String {
        let text = COMMENT.replace_all(wikitext, "");
        let text = REF_BLOCK.replace_all(&text, "");
        let text = REF_SELF_CLOSING.replace_all(&text, "");
        let text = strip_file_links(&text);
        let text = CATEGORY_LINK.replace_all(&text, "");
        let text = collapse_templates(&text);
        let text = replace_links(&text);
        let text = HTML_TAG.replace_all(&text, "");
        let text = strip_apostrophe_formatting(&text);
        let text = process_tables(&text);
        let text = process_lines(&text);
        clean_whitespace(&text)
    }
}

/// Remove `[[File:...]]` and `[[Image:...]]` links, including ones whose
/// caption contains nested `[[...]]` links. The regex engine cannot match
/// the balanced form, so this scans bracket depth by hand.
fn strip_file_links(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;

    while pos < text.len() {
        let Some(start) = find_media_link(text, pos) else {
            out.push_str(&text[pos..]);
            break;
        };
        out.push_str(&text[pos..start]);

        // Walk to the matching `]]`, counting nested `[[`.
        let mut depth = 1usize;
        let mut cursor = start + 2;
        let bytes = text.as_bytes();
        while cursor + 1 < bytes.len() && depth > 0 {
            if bytes[cursor] == b'[' && bytes[cursor + 1] == b'[' {
                depth += 1;
                cursor += 2;
            } else if bytes[cursor] == b']' && bytes[cursor + 1] == b']' {
                depth -= 1;
                cursor += 2;
            } else {
                cursor += 1;
            }
        }
        if depth > 0 {
            // Unterminated link: keep the rest untouched.
            out.push_str(&text[start..]);
            break;
        }
        pos = cursor;
    }
    out
}

/// Byte offset of the next `[[File:` or `[[Image:` at or after `from`.
/// ASCII case-insensitive without lowercasing the haystack, so byte
/// offsets stay valid for Unicode article text.
fn find_media_link(text: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = from;
    while let Some(rel) = text.get(i..).and_then(|tail| tail.find("[[")) {
        let start = i + rel;
        let rest = &bytes[start + 2..];
        let is_media = rest
            .get(..5)
            .is_some_and(|p| p.eq_ignore_ascii_case(b"file:"))
            || rest
                .get(..6)
                .is_some_and(|p| p.eq_ignore_ascii_case(b"image:"));
        if is_media {
            return Some(start);
        }
        i = start + 2;
    }
    None
}

/// Collapse `{{...}}` templates innermost-first until no template remains.
fn collapse_templates(text: &str) -> String {
    let mut current = text.to_owned();
    for _ in 0..MAX_TEMPLATE_PASSES {
        if !TEMPLATE.is_match(&current) {
            break;
        }
        current = TEMPLATE
            .replace_all(&current, |caps: &regex::Captures<'_>| {
                reduce_template(&caps[1])
            })
            .into_owned();
    }
    current
}

/// Reduce one template body to its display text.
///
/// Citation and maintenance templates vanish; anything with positional
/// arguments keeps the last non-empty one (named `key=value` arguments are
/// never display text); bare templates vanish.
fn reduce_template(body: &str) -> String {
    let lower = body.to_lowercase();
    if SKIP_TEMPLATES.iter().any(|t| lower.contains(t)) {
        return String::new();
    }
    let parts: Vec<&str> = body.split('|').map(str::trim).collect();
    if parts.len() > 1 {
        if let Some(last) = parts[1..]
            .iter()
            .filter(|p| !p.is_empty() && !p.contains('='))
            .next_back()
        {
            return (*last).to_owned();
        }
    }
    String::new()
}

/// `[[page|text]]` -> `text`, `[[page]]` -> `page`, `[url text]` -> `text`.
fn replace_links(text: &str) -> String {
    let text = INTERNAL_LINK.replace_all(text, |caps: &regex::Captures<'_>| {
        let target = &caps[1];
        target
            .rsplit_once('|')
            .map_or_else(|| target.to_owned(), |(_, label)| label.to_owned())
    });
    EXTERNAL_LINK.replace_all(&text, "$1").into_owned()
}

/// Strip `'''''`, `'''` and `''` groupings, preserving the inner text.
fn strip_apostrophe_formatting(text: &str) -> String {
    text.replace("'''''", "")
        .replace("'''", "")
        .replace("''", "")
}

/// Replace `{|...|}` tables with their cell text joined by newlines.
fn process_tables(text: &str) -> String {
    TABLE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let table = &caps[0];
            let cells: Vec<&str> = TABLE_CELL
                .captures_iter(table)
                .map(|c| c.get(1).map_or("", |m| m.as_str()).trim())
                .filter(|cell| {
                    !cell.is_empty()
                        && !cell.starts_with('{')
                        && !cell.starts_with('!')
                        && !cell.starts_with('-')
                        // attribute soup like class="wikitable"
                        && !cell.contains("=\"")
                })
                .collect();
            cells.join("\n")
        })
        .into_owned()
}

/// Per-line pass: section headers to `#` markers, list items to bullets.
fn process_lines(text: &str) -> String {
    let mut lines = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(caps) = SECTION.captures(trimmed) {
            let level = caps[1].len();
            let title = caps[2].trim();
            let marker = match level {
                2 => "#",
                3 => "##",
                _ => "###",
            };
            lines.push(String::new());
            lines.push(format!("{marker} {title}"));
            lines.push(String::new());
        } else if let Some(item) = list_item_text(trimmed) {
            lines.push(format!("• {item}"));
        } else {
            lines.push(trimmed.to_owned());
        }
    }
    lines.join("\n")
}

/// Extract the text of a wiki list line, if this is one.
///
/// A `#` followed by a space is left alone: that form is exactly what the
/// section rule emits, and converting it on a later pass would eat
/// headings. Wookieepedia lists are overwhelmingly `*`-style.
fn list_item_text(line: &str) -> Option<&str> {
    let first = line.chars().next()?;
    if !matches!(first, '*' | '#' | ':' | ';') {
        return None;
    }
    if first == '#' {
        let rest = line.trim_start_matches('#');
        if rest.starts_with(' ') {
            return None;
        }
    }
    Some(
        line.trim_start_matches(['*', '#', ':', ';'])
            .trim_start_matches(' '),
    )
}

/// Collapse runs of blank lines and spaces, trim the ends.
fn clean_whitespace(text: &str) -> String {
    let text = SPACE_AROUND_NEWLINE.replace_all(text, "\n");
    let text = MULTI_NEWLINE.replace_all(&text, "\n\n");
    let text = MULTI_SPACE.replace_all(&text, " ");
    text.trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(input: &str) -> String {
        MarkupNormalizer::new().normalize(input)
    }

    #[test]
    fn strips_comments_and_refs() {
        let out = normalize("Rex<!-- hidden --> plays<ref name=\"a\">cite</ref> music<ref/>.");
        assert_eq!(out, "Rex plays music.");
    }

    #[test]
    fn collapses_nested_templates_to_fixpoint() {
        let out = normalize("{{Quote|{{Era|canon|text inside}}|the speaker}}");
        assert_eq!(out, "the speaker");
    }

    #[test]
    fn citation_templates_vanish() {
        assert_eq!(normalize("fact{{cite web|url=x}} stands"), "fact stands");
        assert_eq!(normalize("fact{{Citation needed}} stands"), "fact stands");
    }

    #[test]
    fn template_keeps_last_positional_argument() {
        assert_eq!(normalize("{{C|Oga's|Cantina}}"), "Cantina");
        assert_eq!(normalize("{{Top|canon=1}}"), "");
    }

    #[test]
    fn replaces_links() {
        assert_eq!(normalize("[[DJ R3X|Rex]] at [[Oga's Cantina]]"), "Rex at Oga's Cantina");
        assert_eq!(
            normalize("see [https://example.com the site] now"),
            "see the site now"
        );
    }

    #[test]
    fn removes_file_and_category_links() {
        let out = normalize(
            "Intro [[File:rex.jpg|thumb|DJ [[R3X]] at work]] text\n[[Category:Droids]]",
        );
        assert_eq!(out, "Intro text");
    }

    #[test]
    fn strips_bold_italic_preserving_text() {
        assert_eq!(normalize("'''''both''''' '''bold''' ''italic''"), "both bold italic");
    }

    #[test]
    fn converts_section_headers_by_level() {
        let out = normalize("== History ==\ntext\n=== Early life ===\nmore\n==== Detail ====\nend");
        assert_eq!(
            out,
            "# History\n\ntext\n\n## Early life\n\nmore\n\n### Detail\n\nend"
        );
    }

    #[test]
    fn converts_lists_to_bullets() {
        let out = normalize("*First\n* Second\n:indented\n;term");
        assert_eq!(out, "• First\n• Second\n• indented\n• term");
    }

    #[test]
    fn extracts_table_cells() {
        let out = normalize("{| class=\"wikitable\"\n! Header\n|-\n| Cell one\n| Cell two\n|}");
        assert!(out.contains("Cell one"));
        assert!(out.contains("Cell two"));
        assert!(!out.contains("{|"));
        assert!(!out.contains("wikitable"));
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize("a\n\n\n\n\nb   c"), "a\n\nb c");
    }

    #[test]
    fn output_contains_no_markup_delimiters() {
        let sample = "'''Bold''' [[link|text]] {{template|arg}} <ref>r</ref>\n\
                      == Section ==\n{| \n| cell\n|}\n[[Category:Test]]\n\
                      [[File:image.jpg|thumb|Caption]]";
        let out = normalize(sample);
        assert!(!out.contains("{{"), "templates left in: {out}");
        assert!(!out.contains("[["), "links left in: {out}");
        assert!(!out.contains("<ref"), "refs left in: {out}");
        assert!(!out.contains("{|"), "tables left in: {out}");
    }

    #[test]
    fn normalize_is_idempotent_within_two_passes() {
        let samples = [
            "== History ==\n* item one\n* item two\n\nBody with [[link]] and {{Era|canon}}.",
            "'''DJ R3X''' is a droid.<ref>source</ref>\n{| \n| cell\n|}",
            "Plain paragraph.\n\nAnother paragraph.",
        ];
        let normalizer = MarkupNormalizer::new();
        for sample in samples {
            let once = normalizer.normalize(sample);
            let twice = normalizer.normalize(&once);
            assert_eq!(once, twice, "not a fixpoint for: {sample}");
        }
    }

    #[test]
    fn unknown_constructs_fall_through() {
        // Unbalanced markup must not panic or loop.
        let out = normalize("broken {{template without end and [[link");
        assert!(out.contains("broken"));
    }
}
