//! Fallback ladders and truncation thresholds.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruncationPolicy {
    /// Planner retry keeps only this many of the most recent learnings.
    pub planner_keep_learnings: usize,
    /// More documents than this switches the synthesizer to `many_documents_trim` up front.
    pub many_documents_threshold: usize,
    pub many_documents_trim: usize,
    /// Per-document trim sizes tried in order until the synthesis prompt fits.
    pub synthesis_trim_ladder: Vec<usize>,
    /// Report retry keeps only this many of the most recent learnings.
    pub report_keep_learnings: usize,
    pub learnings_per_query: usize,
}

impl Default for TruncationPolicy {
    fn default() -> Self {
        Self {
            planner_keep_learnings: 3,
            many_documents_threshold: 5,
            many_documents_trim: 2_000,
            synthesis_trim_ladder: vec![8_000, 4_000, 2_000, 1_000, 500],
            report_keep_learnings: 5,
            learnings_per_query: 3,
        }
    }
}

impl TruncationPolicy {
    /// Per-document trim sizes the synthesizer tries, in order.
    pub fn synthesis_trim_schedule(
        &self,
        document_count: usize,
        context_ceiling: usize,
    ) -> Vec<usize> {
        let initial = if document_count > self.many_documents_threshold {
            self.many_documents_trim
        } else {
            context_ceiling
        };
        std::iter::once(initial)
            .chain(self.synthesis_trim_ladder.iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn many_documents_start_at_two_thousand() {
        let p = TruncationPolicy::default();
        assert_eq!(
            p.synthesis_trim_schedule(6, 8_000),
            vec![2_000, 8_000, 4_000, 2_000, 1_000, 500]
        );
    }

    #[test]
    fn few_documents_start_at_the_context_ceiling() {
        let p = TruncationPolicy::default();
        assert_eq!(p.synthesis_trim_schedule(5, 30_000)[0], 30_000);
        assert_eq!(p.synthesis_trim_schedule(0, 8_000)[0], 8_000);
    }
}
