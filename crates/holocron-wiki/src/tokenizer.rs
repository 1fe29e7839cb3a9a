//! Token counting for chunk sizing.
//!
//! Uses the `cl100k_base` BPE table so chunk budgets line up with what the
//! embedding API actually counts.

use std::sync::Arc;

use tiktoken_rs::{CoreBPE, cl100k_base};

use holocron_domain::{Error, Result};

/// Shared cl100k token counter.
///
/// Construction loads the BPE table once; clones share it.
#[derive(Clone)]
pub struct TokenCounter {
    bpe: Arc<CoreBPE>,
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter").finish_non_exhaustive()
    }
}

impl TokenCounter {
    /// Load the cl100k_base table.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundled BPE table fails to load.
    pub fn new() -> Result<Self> {
        let bpe = cl100k_base()
            .map_err(|e| Error::internal(format!("failed to load cl100k_base tokenizer: {e}")))?;
        Ok(Self { bpe: Arc::new(bpe) })
    }

    /// Number of tokens in `text`.
    #[must_use]
    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_are_stable_and_nonzero() {
        let counter = TokenCounter::new().unwrap_or_else(|e| panic!("tokenizer: {e}"));
        let n = counter.count("DJ R3X spins tracks at Oga's Cantina.");
        assert!(n > 0);
        assert_eq!(n, counter.count("DJ R3X spins tracks at Oga's Cantina."));
        assert_eq!(counter.count(""), 0);
    }

    #[test]
    fn longer_text_has_more_tokens() {
        let counter = TokenCounter::new().unwrap_or_else(|e| panic!("tokenizer: {e}"));
        let short = counter.count("cantina");
        let long = counter.count("cantina cantina cantina cantina");
        assert!(long > short);
    }
}
