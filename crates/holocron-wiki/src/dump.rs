//! Streaming MediaWiki XML export processing.
//!
//! Iterates a dump of arbitrary size without loading it: pages are
//! assembled from parser events, classified, normalized and handed to a
//! sink, and every buffer is cleared as soon as a page completes.

use std::fs::File;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{info, warn};

use holocron_domain::constants::{ARTICLES_PER_BATCH, DUMP_LOG_INTERVAL, RETAINED_NAMESPACES};
use holocron_domain::{Error, FilterReason, IngestCounters, NormalizedArticle, RawPage, Result};

use crate::process::PageProcessor;

/// Canonical article URL for a wiki title.
#[must_use]
pub fn article_url(title: &str) -> String {
    format!(
        "https://starwars.fandom.com/wiki/{}",
        title.replace(' ', "_")
    )
}

/// Collect the article titles of a dump's retained namespaces, in dump
/// order. Used to seed a fresh progress store from an export instead of
/// a URL CSV.
///
/// # Errors
///
/// Returns an error when the XML is unreadable at the stream level.
pub fn collect_titles<R: BufRead>(reader: R) -> Result<Vec<String>> {
    let mut xml = Reader::from_reader(reader);
    let mut buf = Vec::new();
    let mut titles = Vec::new();
    let mut in_title = false;
    let mut in_page = false;
    let mut current = String::new();
    let mut namespace = String::new();
    let mut in_ns = false;

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(start)) => match start.name().as_ref() {
                b"page" => {
                    in_page = true;
                    current.clear();
                    namespace.clear();
                }
                b"title" if in_page => in_title = true,
                b"ns" if in_page => in_ns = true,
                _ => {}
            },
            Ok(Event::Text(text)) => {
                if in_title || in_ns {
                    let value = text
                        .unescape()
                        .map_err(|e| Error::parse(format!("bad text node in dump: {e}")))?;
                    if in_title {
                        current.push_str(&value);
                    } else {
                        namespace.push_str(&value);
                    }
                }
            }
            Ok(Event::End(end)) => match end.name().as_ref() {
                b"title" => in_title = false,
                b"ns" => in_ns = false,
                b"page" => {
                    in_page = false;
                    let ns = namespace.trim().parse::<i32>().unwrap_or(0);
                    if !current.is_empty() && RETAINED_NAMESPACES.contains(&ns) {
                        titles.push(std::mem::take(&mut current));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(Error::parse(format!(
                    "XML error at byte {}: {e}",
                    xml.buffer_position()
                )));
            }
        }
        buf.clear();
    }
    Ok(titles)
}

/// Summary of one dump run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpReport {
    /// Page-level counters
    pub counters: IngestCounters,
    /// Batch directories written (directory mode only)
    pub batches_written: usize,
}

/// Fields of the `<page>` element currently being assembled.
#[derive(Debug, Default)]
struct PageBuilder {
    title: String,
    ns: String,
    revision_id: String,
    text: String,
    in_revision: bool,
}

impl PageBuilder {
    fn into_raw_page(self) -> Option<RawPage> {
        if self.title.is_empty() || self.revision_id.is_empty() || self.text.is_empty() {
            return None;
        }
        let namespace = self.ns.trim().parse::<i32>().unwrap_or(0);
        Some(RawPage {
            url: article_url(&self.title),
            title: self.title,
            namespace,
            revision_id: self.revision_id,
            wikitext: self.text,
        })
    }
}

/// Streams a MediaWiki export, emitting normalized articles.
#[derive(Debug, Clone)]
pub struct DumpProcessor {
    processor: PageProcessor,
    articles_per_batch: usize,
    max_articles: Option<usize>,
}

impl Default for DumpProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DumpProcessor {
    /// New processor with the default batch size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            processor: PageProcessor::new(),
            articles_per_batch: ARTICLES_PER_BATCH,
            max_articles: None,
        }
    }

    /// Override articles per output batch directory.
    #[must_use]
    pub fn with_articles_per_batch(mut self, articles_per_batch: usize) -> Self {
        self.articles_per_batch = articles_per_batch.max(1);
        self
    }

    /// Stop after emitting this many accepted articles (partial runs,
    /// smoke tests over multi-gigabyte dumps).
    #[must_use]
    pub fn with_max_articles(mut self, max_articles: Option<usize>) -> Self {
        self.max_articles = max_articles;
        self
    }

    /// Stream the export, pushing each accepted article into `sink`.
    ///
    /// Malformed page elements are logged, counted as other-filtered and
    /// skipped; the stream keeps going. A sink error aborts the run.
    ///
    /// # Errors
    ///
    /// Returns an error when the XML is unreadable at the stream level or
    /// the sink fails.
    pub fn process<R, F>(&self, reader: R, mut sink: F) -> Result<IngestCounters>
    where
        R: BufRead,
        F: FnMut(NormalizedArticle) -> Result<()>,
    {
        let mut xml = Reader::from_reader(reader);
        let mut counters = IngestCounters::default();
        let mut buf = Vec::new();
        let mut page: Option<PageBuilder> = None;
        let mut field: Option<&'static str> = None;

        loop {
            match xml.read_event_into(&mut buf) {
                Ok(Event::Start(start)) => match start.name().as_ref() {
                    b"page" => {
                        page = Some(PageBuilder::default());
                        field = None;
                    }
                    b"revision" => {
                        if let Some(builder) = page.as_mut() {
                            builder.in_revision = true;
                        }
                    }
                    b"title" => field = Some("title"),
                    b"ns" => field = Some("ns"),
                    b"id" => {
                        // The page element carries its own <id>; only the
                        // first id inside <revision> is the revision id.
                        let capture = page
                            .as_ref()
                            .is_some_and(|b| b.in_revision && b.revision_id.is_empty());
                        field = capture.then_some("revision_id");
                    }
                    b"text" => {
                        let capture = page.as_ref().is_some_and(|b| b.in_revision);
                        field = capture.then_some("text");
                    }
                    _ => field = None,
                },
                Ok(Event::Text(text)) => {
                    if let (Some(builder), Some(name)) = (page.as_mut(), field) {
                        let value = text.unescape().map_err(|e| {
                            Error::parse(format!("bad text node in dump: {e}"))
                        })?;
                        builder.append(name, &value);
                    }
                }
                Ok(Event::CData(cdata)) => {
                    if let (Some(builder), Some(name)) = (page.as_mut(), field) {
                        let value = String::from_utf8_lossy(&cdata).into_owned();
                        builder.append(name, &value);
                    }
                }
                Ok(Event::End(end)) => match end.name().as_ref() {
                    b"page" => {
                        if let Some(builder) = page.take() {
                            self.finish_page(builder, &mut counters, &mut sink)?;
                        }
                        field = None;
                        if self
                            .max_articles
                            .is_some_and(|max| counters.processed >= max)
                        {
                            info!(
                                processed = counters.processed,
                                "article cap reached, stopping dump walk"
                            );
                            break;
                        }
                    }
                    b"revision" => {
                        if let Some(builder) = page.as_mut() {
                            builder.in_revision = false;
                        }
                        field = None;
                    }
                    _ => field = None,
                },
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(Error::parse(format!(
                        "XML error at byte {}: {e}",
                        xml.buffer_position()
                    )));
                }
            }
            buf.clear();
        }

        info!(summary = %counters.summary(), "dump processing complete");
        Ok(counters)
    }

    /// Stream the export into `output_dir/batch_NNNN/` JSON files.
    ///
    /// # Errors
    ///
    /// Returns an error if the dump cannot be opened or output files
    /// cannot be written.
    pub fn process_file(&self, dump_path: &Path, output_dir: &Path) -> Result<DumpReport> {
        let file = File::open(dump_path).map_err(|e| {
            Error::config(format!("cannot open dump {}: {e}", dump_path.display()))
        })?;
        let reader = std::io::BufReader::new(file);

        std::fs::create_dir_all(output_dir)?;
        let mut writer = BatchWriter::new(output_dir.to_path_buf(), self.articles_per_batch);
        let counters = self.process(reader, |article| writer.push(article))?;
        writer.flush()?;

        Ok(DumpReport {
            counters,
            batches_written: writer.batches_written,
        })
    }

    fn finish_page<F>(
        &self,
        builder: PageBuilder,
        counters: &mut IngestCounters,
        sink: &mut F,
    ) -> Result<()>
    where
        F: FnMut(NormalizedArticle) -> Result<()>,
    {
        counters.total_pages += 1;
        if counters.total_pages % DUMP_LOG_INTERVAL == 0 {
            info!(
                pages = counters.total_pages,
                processed = counters.processed,
                canon = counters.canon,
                legends = counters.legends,
                "dump progress"
            );
        }

        let Some(raw) = builder.into_raw_page() else {
            counters.other_filtered += 1;
            warn!("page missing title, revision id or text; skipping");
            return Ok(());
        };

        if !RETAINED_NAMESPACES.contains(&raw.namespace) {
            counters.other_filtered += 1;
            return Ok(());
        }

        let processed = self.processor.process(&raw);
        counters.record_filter(processed.reason);
        if processed.reason != FilterReason::Content {
            return Ok(());
        }

        let Some(article) = processed.article else {
            counters.other_filtered += 1;
            return Ok(());
        };
        counters.record_canonicity(article.canonicity());
        if article.is_stub() {
            counters.stubs += 1;
        }
        sink(article)
    }
}

impl PageBuilder {
    fn append(&mut self, field: &str, value: &str) {
        match field {
            "title" => self.title.push_str(value),
            "ns" => self.ns.push_str(value),
            "revision_id" => self.revision_id.push_str(value),
            "text" => self.text.push_str(value),
            _ => {}
        }
    }
}

/// Writes accepted articles into numbered batch directories, one JSON
/// file per article.
struct BatchWriter {
    output_dir: PathBuf,
    articles_per_batch: usize,
    pending: Vec<NormalizedArticle>,
    batches_written: usize,
}

impl BatchWriter {
    fn new(output_dir: PathBuf, articles_per_batch: usize) -> Self {
        Self {
            output_dir,
            articles_per_batch,
            pending: Vec::new(),
            batches_written: 0,
        }
    }

    fn push(&mut self, article: NormalizedArticle) -> Result<()> {
        self.pending.push(article);
        if self.pending.len() >= self.articles_per_batch {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch_dir = self
            .output_dir
            .join(format!("batch_{:04}", self.batches_written + 1));
        std::fs::create_dir_all(&batch_dir)?;

        for article in self.pending.drain(..) {
            let safe_title: String = article
                .title
                .chars()
                .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
                .collect();
            let path = batch_dir.join(format!("{safe_title}.json"));
            let json = serde_json::to_string_pretty(&article)?;
            std::fs::write(&path, json)?;
        }

        self.batches_written += 1;
        info!(batch = %batch_dir.display(), "saved article batch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn dump_xml() -> String {
        let pages = [
            (
                "DJ R3X",
                "0",
                "101",
                "{{Canon}}'''DJ R3X''' is a droid DJ at [[Oga's Cantina]] in Star Wars: Galaxy's Edge.\n\
                 == History ==\nFormer [[Star Tours]] pilot, now resident DJ spinning tracks nightly.\n\
                 [[Category:Canon articles]][[Category:Droids]]",
            ),
            (
                "Oga's Cantina",
                "0",
                "102",
                "{{Canon}}'''Oga's Cantina''' is a popular establishment in [[Black Spire Outpost]] \
                 serving patrons from across the galaxy under Oga Garra's strict rules.\n\
                 [[Category:Canon articles]][[Category:Locations]]",
            ),
            (
                "Star Tours",
                "0",
                "103",
                "#REDIRECT [[Star Tours (attraction)]]",
            ),
            (
                "Talk:DJ R3X",
                "1",
                "104",
                "Discussion page, never indexed.",
            ),
        ];
        let mut xml = String::from("<mediawiki xmlns=\"http://www.mediawiki.org/xml/export-0.11/\">\n");
        for (title, ns, rev, text) in pages {
            xml.push_str(&format!(
                "<page><title>{title}</title><ns>{ns}</ns><id>7</id>\
                 <revision><id>{rev}</id><text>{}</text></revision></page>\n",
                text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
            ));
        }
        xml.push_str("</mediawiki>");
        xml
    }

    #[test]
    fn three_page_dump_yields_two_articles_and_one_redirect() {
        let mut articles = Vec::new();
        let counters = DumpProcessor::new()
            .process(Cursor::new(dump_xml()), |article| {
                articles.push(article);
                Ok(())
            })
            .unwrap_or_else(|e| panic!("dump: {e}"));

        assert_eq!(counters.total_pages, 4);
        assert_eq!(counters.processed, 2);
        assert_eq!(counters.redirects, 1);
        assert_eq!(counters.other_filtered, 1); // talk namespace
        assert_eq!(counters.canon, 2);

        let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["DJ R3X", "Oga's Cantina"]);
        assert_eq!(articles[0].revision_id, "101");
        assert_eq!(articles[0].is_canonical, Some(true));
        assert!(articles[0].plain_text.contains("# History"));
        assert_eq!(
            articles[0].categories,
            vec!["Category:Canon articles".to_owned(), "Category:Droids".to_owned()]
        );
    }

    #[test]
    fn revision_id_is_taken_from_revision_not_page() {
        let mut articles = Vec::new();
        DumpProcessor::new()
            .process(Cursor::new(dump_xml()), |article| {
                articles.push(article);
                Ok(())
            })
            .unwrap_or_else(|e| panic!("dump: {e}"));
        assert!(articles.iter().all(|a| a.revision_id != "7"));
    }

    #[test]
    fn malformed_page_is_counted_and_skipped() {
        let xml = "<mediawiki><page><title>Broken</title></page>\
                   <page><title>Ok Article</title><ns>0</ns>\
                   <revision><id>9</id><text>{{Canon}}A droid DJ with a long and storied career \
                   entertaining guests at the outpost cantina.</text></revision></page></mediawiki>";
        let mut emitted = 0;
        let counters = DumpProcessor::new()
            .process(Cursor::new(xml), |_| {
                emitted += 1;
                Ok(())
            })
            .unwrap_or_else(|e| panic!("dump: {e}"));
        assert_eq!(counters.total_pages, 2);
        assert_eq!(counters.other_filtered, 1);
        assert_eq!(emitted, 1);
    }

    #[test]
    fn process_file_writes_batch_directories() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let dump_path = dir.path().join("dump.xml");
        std::fs::write(&dump_path, dump_xml()).unwrap_or_else(|e| panic!("write: {e}"));
        let out_dir = dir.path().join("out");

        let report = DumpProcessor::new()
            .with_articles_per_batch(1)
            .process_file(&dump_path, &out_dir)
            .unwrap_or_else(|e| panic!("process_file: {e}"));

        assert_eq!(report.batches_written, 2);
        assert!(out_dir.join("batch_0001").join("DJ R3X.json").exists());
        assert!(out_dir.join("batch_0002").join("Oga's Cantina.json").exists());

        let json = std::fs::read_to_string(out_dir.join("batch_0001/DJ R3X.json"))
            .unwrap_or_else(|e| panic!("read: {e}"));
        let article: NormalizedArticle =
            serde_json::from_str(&json).unwrap_or_else(|e| panic!("json: {e}"));
        assert_eq!(article.namespace, 0);
        assert_eq!(article.is_canonical, Some(true));
    }

    #[test]
    fn article_cap_stops_the_walk_early() {
        let mut emitted = 0;
        let counters = DumpProcessor::new()
            .with_max_articles(Some(1))
            .process(Cursor::new(dump_xml()), |_| {
                emitted += 1;
                Ok(())
            })
            .unwrap_or_else(|e| panic!("dump: {e}"));
        assert_eq!(emitted, 1);
        assert_eq!(counters.processed, 1);
        assert!(counters.total_pages < 4, "walk should stop before the end");
    }

    #[test]
    fn collect_titles_skips_non_content_namespaces() {
        let titles = collect_titles(Cursor::new(dump_xml())).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(titles, vec!["DJ R3X", "Oga's Cantina", "Star Tours"]);
    }

    #[test]
    fn article_url_replaces_spaces() {
        assert_eq!(
            article_url("Oga's Cantina"),
            "https://starwars.fandom.com/wiki/Oga's_Cantina"
        );
    }
}
