//! Fit text into a token budget, keeping as much of its prefix as possible.

use crate::splitter::{char_prefix, RecursiveSplitter};
use crate::Tokenizer;
use std::sync::Arc;
use tracing::debug;

const MIN_CHUNK_CHARS: usize = 140;
/// Rough average used to turn token overflow into a char count.
const CHARS_PER_TOKEN: usize = 3;

#[derive(Clone)]
pub struct TextBudgeter {
    tokenizer: Arc<dyn Tokenizer>,
    min_chunk_chars: usize,
    chars_per_token: usize,
}

impl std::fmt::Debug for TextBudgeter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextBudgeter")
            .field("min_chunk_chars", &self.min_chunk_chars)
            .field("chars_per_token", &self.chars_per_token)
            .finish()
    }
}

impl TextBudgeter {
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            tokenizer,
            min_chunk_chars: MIN_CHUNK_CHARS,
            chars_per_token: CHARS_PER_TOKEN,
        }
    }

    pub fn count(&self, text: &str) -> usize {
        self.tokenizer.count(text)
    }

    /// Returns a prefix-preserving version of `text` that encodes within `budget` tokens.
    ///
    /// Every iteration either returns or strictly shortens the candidate, so this terminates;
    /// the empty string always fits.
    pub fn fit(&self, text: &str, budget: usize) -> String {
        let mut current = text.to_string();
        loop {
            if current.is_empty() {
                return current;
            }
            let tokens = self.tokenizer.count(&current);
            if tokens <= budget {
                return current;
            }

            let len = current.chars().count();
            let overflow = tokens - budget;
            let target = len.saturating_sub(overflow.saturating_mul(self.chars_per_token));
            if target < self.min_chunk_chars {
                // Hard cut to the minimum chunk; once already that short, keep cutting by the
                // estimate so tiny budgets still converge.
                current = if len > self.min_chunk_chars {
                    char_prefix(&current, self.min_chunk_chars)
                } else {
                    char_prefix(&current, target)
                };
                continue;
            }

            let first = RecursiveSplitter::new(target).first_chunk(&current);
            let first_len = first.chars().count();
            if first_len >= len {
                debug!(len, target, "splitter made no progress, hard cut");
                current = char_prefix(&current, target);
            } else {
                current = first;
            }
        }
    }
}
