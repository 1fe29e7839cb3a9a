//! Polite wiki crawler.
//!
//! Fetches raw wikitext from a live MediaWiki (`?action=raw`) with a
//! fixed User-Agent and the shared rate limiter in front of every
//! request. Wiki URLs that went through broken encoding round-trips are
//! repaired before fetching.

use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::StatusCode;
use tracing::{debug, warn};

use holocron_application::pipeline::RateLimiter;
use holocron_domain::constants::{CRAWLER_USER_AGENT, HTTP_TIMEOUT_SECS};
use holocron_domain::ports::PageFetcher;
use holocron_domain::{Error, RawPage, Result, WorkItem};

static FFFD_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x{FFFD}([A-Za-z0-9_])").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static HEX_FFFD_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%EF%BF%BD([A-Za-z0-9_])").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

/// Repair a wiki article URL whose percent escapes were corrupted.
///
/// Two corruptions show up in exported URL lists: the Unicode
/// replacement character (U+FFFD) where a `%` used to be, and its
/// percent-encoded form `%EF%BF%BD`. Both are restored to `%` before the
/// path segment is decoded once and re-encoded.
#[must_use]
pub fn repair_wiki_url(url: &str) -> String {
    let Some((prefix, article)) = url.split_once("/wiki/") else {
        return url.to_owned();
    };

    let mut name = article.to_owned();
    if name.contains('\u{FFFD}') {
        warn!(url, "URL contains a Unicode replacement character, repairing");
        name = FFFD_ESCAPE.replace_all(&name, "%$1").into_owned();
    }
    if name.contains("%EF%BF%BD") {
        warn!(url, "URL contains a hex-encoded replacement character, repairing");
        name = HEX_FFFD_ESCAPE.replace_all(&name, "%$1").into_owned();
    }

    // Decode once to avoid double-encoding, protect stray percent signs,
    // then re-encode the whole segment.
    let decoded = urlencoding::decode(&name).map_or(name.clone(), |d| d.into_owned());
    let protected = decoded.replace('%', "%25");
    let encoded = urlencoding::encode(&protected).into_owned();

    format!("{prefix}/wiki/{encoded}")
}

/// Polite HTTP fetcher for live wiki pages.
///
/// Pass a rate limiter for standalone use; when the orchestrator already
/// acquires a token per item, build the crawler without one so each fetch
/// is charged once.
pub struct WikiCrawler {
    client: reqwest::Client,
    rate_limiter: Option<Arc<RateLimiter>>,
}

impl WikiCrawler {
    /// Build a crawler with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(rate_limiter: Option<Arc<RateLimiter>>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(CRAWLER_USER_AGENT)
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::config(format!("crawler HTTP client: {e}")))?;
        Ok(Self {
            client,
            rate_limiter,
        })
    }

    /// Build a crawler sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, rate_limiter: Option<Arc<RateLimiter>>) -> Self {
        Self {
            client,
            rate_limiter,
        }
    }
}

#[async_trait]
impl PageFetcher for WikiCrawler {
    async fn fetch(&self, item: &WorkItem) -> Result<Option<RawPage>> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.acquire().await;
        }

        let repaired = repair_wiki_url(&item.url);
        let raw_url = format!("{repaired}?action=raw");
        debug!(url = %raw_url, "fetching wiki page");

        let response = self
            .client
            .get(&raw_url)
            .send()
            .await
            .map_err(|e| Error::network_with_source(format!("fetching {repaired}"), e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_server_error() => Err(Error::network(format!(
                "wiki returned {status} for {repaired}"
            ))),
            status if !status.is_success() => Err(Error::network(format!(
                "wiki returned {status} for {repaired}"
            ))),
            _ => {
                let wikitext = response
                    .text()
                    .await
                    .map_err(|e| Error::network_with_source("reading wiki response", e))?;
                if wikitext.trim().is_empty() {
                    return Ok(None);
                }
                Ok(Some(RawPage {
                    title: item.title(),
                    url: repaired,
                    namespace: 0,
                    revision_id: "live".to_owned(),
                    wikitext,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn replacement_character_is_restored_to_percent() {
        let url = "https://starwars.fandom.com/wiki/Chalmun\u{FFFD}27s_Cantina";
        let repaired = repair_wiki_url(url);
        assert!(!repaired.contains('\u{FFFD}'));
        assert!(repaired.contains("%2527s") || repaired.contains("%27s"));
    }

    #[test]
    fn hex_encoded_replacement_is_restored() {
        let url = "https://starwars.fandom.com/wiki/Chalmun%EF%BF%BD27s_Cantina";
        let repaired = repair_wiki_url(url);
        assert!(!repaired.contains("%EF%BF%BD"));
    }

    #[test]
    fn plain_urls_keep_their_article_name() {
        let repaired = repair_wiki_url("https://starwars.fandom.com/wiki/DJ_R3X");
        assert_eq!(repaired, "https://starwars.fandom.com/wiki/DJ_R3X");
    }

    #[rstest]
    #[case("https://starwars.fandom.com/robots.txt")]
    #[case("not a url at all")]
    fn non_wiki_urls_pass_through(#[case] url: &str) {
        assert_eq!(repair_wiki_url(url), url);
    }

    #[test]
    fn decode_then_encode_does_not_double_encode() {
        let url = "https://starwars.fandom.com/wiki/Oga%27s_Cantina";
        let repaired = repair_wiki_url(url);
        // One decode/encode cycle: %27 stays %27, not %2527.
        assert!(repaired.ends_with("Oga%27s_Cantina"));
    }
}
