//! Pipeline counters.

use serde::{Deserialize, Serialize};

use crate::value_objects::{Canonicity, FilterReason};

/// Counters maintained across a dump or crawl run.
///
/// Updated by the dump processor and the orchestrator, printed as the
/// terminal summary when a run finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestCounters {
    /// Pages seen in the input
    pub total_pages: usize,
    /// Pages that passed the content filter
    pub processed: usize,
    /// Canon articles
    pub canon: usize,
    /// Legends articles
    pub legends: usize,
    /// Articles with undetermined canonicity
    pub undetermined: usize,
    /// Redirect pages skipped
    pub redirects: usize,
    /// Disambiguation pages skipped
    pub disambiguations: usize,
    /// Stub-tagged articles (processed, tracked for reporting)
    pub stubs: usize,
    /// Meta/utility pages skipped
    pub meta_utility: usize,
    /// Pages dropped for other reasons (parse errors, missing revisions)
    pub other_filtered: usize,
    /// Chunks emitted
    pub chunks_created: usize,
    /// Items that failed permanently
    pub failed: usize,
}

impl IngestCounters {
    /// Record a filter decision.
    pub fn record_filter(&mut self, reason: FilterReason) {
        match reason {
            FilterReason::Content => self.processed += 1,
            FilterReason::Redirect => self.redirects += 1,
            FilterReason::Disambiguation => self.disambiguations += 1,
            FilterReason::MetaUtility => self.meta_utility += 1,
        }
    }

    /// Record a canonicity determination for a processed article.
    pub fn record_canonicity(&mut self, canonicity: Canonicity) {
        match canonicity {
            Canonicity::Canon => self.canon += 1,
            Canonicity::Legends => self.legends += 1,
            Canonicity::Unknown => self.undetermined += 1,
        }
    }

    /// Fold another counter set into this one.
    pub fn merge(&mut self, other: &IngestCounters) {
        self.total_pages += other.total_pages;
        self.processed += other.processed;
        self.canon += other.canon;
        self.legends += other.legends;
        self.undetermined += other.undetermined;
        self.redirects += other.redirects;
        self.disambiguations += other.disambiguations;
        self.stubs += other.stubs;
        self.meta_utility += other.meta_utility;
        self.other_filtered += other.other_filtered;
        self.chunks_created += other.chunks_created;
        self.failed += other.failed;
    }

    /// One-line summary for the terminal.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "pages={} processed={} canon={} legends={} undetermined={} \
             redirects={} disambig={} stubs={} meta={} other={} chunks={} failed={}",
            self.total_pages,
            self.processed,
            self.canon,
            self.legends,
            self.undetermined,
            self.redirects,
            self.disambiguations,
            self.stubs,
            self.meta_utility,
            self.other_filtered,
            self.chunks_created,
            self.failed,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_reasons_hit_their_counters() {
        let mut counters = IngestCounters::default();
        counters.record_filter(FilterReason::Redirect);
        counters.record_filter(FilterReason::Redirect);
        counters.record_filter(FilterReason::Content);
        counters.record_filter(FilterReason::MetaUtility);
        assert_eq!(counters.redirects, 2);
        assert_eq!(counters.processed, 1);
        assert_eq!(counters.meta_utility, 1);
        assert_eq!(counters.disambiguations, 0);
    }

    #[test]
    fn merge_adds_fieldwise() {
        let mut a = IngestCounters {
            total_pages: 3,
            processed: 2,
            canon: 1,
            ..IngestCounters::default()
        };
        let b = IngestCounters {
            total_pages: 4,
            legends: 2,
            ..IngestCounters::default()
        };
        a.merge(&b);
        assert_eq!(a.total_pages, 7);
        assert_eq!(a.processed, 2);
        assert_eq!(a.legends, 2);
    }
}
