//! Per-model capability descriptor.
//!
//! Everything that depends on "which model is this" is resolved once into a [`ModelProfile`] and
//! threaded through the pipeline, instead of comparing model ids at each call site.

use serde::{Deserialize, Serialize};

/// Model that only supports free-text generation and emits `<think>` traces.
pub const REASONING_MODEL: &str = "deepseek-ai/DeepSeek-R1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityPolicy {
    pub text_mode_model: String,
    pub text_mode_context_ceiling: usize,
    pub default_context_ceiling: usize,
    /// Case-insensitive substrings marking 70B+ class models.
    pub large_model_patterns: Vec<String>,
    pub large_model_concurrency: usize,
    /// Case-insensitive substrings marking 32B/34B class models.
    pub mid_model_patterns: Vec<String>,
    pub mid_model_concurrency: usize,
    pub default_concurrency: usize,
}

impl Default for CapabilityPolicy {
    fn default() -> Self {
        Self {
            text_mode_model: REASONING_MODEL.to_string(),
            text_mode_context_ceiling: 30_000,
            default_context_ceiling: 8_000,
            large_model_patterns: ["70b", "72b", "claude-3", "deepseek-r1"]
                .into_iter()
                .map(String::from)
                .collect(),
            large_model_concurrency: 1,
            mid_model_patterns: ["32b", "34b"].into_iter().map(String::from).collect(),
            mid_model_concurrency: 1,
            default_concurrency: 4,
        }
    }
}

impl CapabilityPolicy {
    pub fn resolve(&self, model_id: &str) -> ModelProfile {
        let text_mode = model_id == self.text_mode_model;
        ModelProfile {
            id: model_id.to_string(),
            supports_structured_output: !text_mode,
            context_ceiling: if text_mode {
                self.text_mode_context_ceiling
            } else {
                self.default_context_ceiling
            },
            concurrency_ceiling: self.concurrency_ceiling(model_id),
        }
    }

    fn concurrency_ceiling(&self, model_id: &str) -> usize {
        let lower = model_id.to_ascii_lowercase();
        let matches = |patterns: &[String]| {
            patterns
                .iter()
                .any(|p| lower.contains(&p.to_ascii_lowercase()))
        };
        if matches(&self.large_model_patterns) {
            self.large_model_concurrency
        } else if matches(&self.mid_model_patterns) {
            self.mid_model_concurrency
        } else {
            self.default_concurrency
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelProfile {
    pub id: String,
    pub supports_structured_output: bool,
    /// Maximum prompt size in tokens.
    pub context_ceiling: usize,
    pub concurrency_ceiling: usize,
}

impl ModelProfile {
    pub fn resolve(model_id: &str) -> Self {
        CapabilityPolicy::default().resolve(model_id)
    }

    /// `min(requested, ceiling)`, never below one so the gate always admits work.
    pub fn effective_concurrency(&self, requested: usize) -> usize {
        requested.min(self.concurrency_ceiling).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasoning_model_is_text_mode_with_wide_context() {
        let p = ModelProfile::resolve(REASONING_MODEL);
        assert!(!p.supports_structured_output);
        assert_eq!(p.context_ceiling, 30_000);
        assert_eq!(p.concurrency_ceiling, 1);
    }

    #[test]
    fn other_models_use_structured_output_and_default_context() {
        let p = ModelProfile::resolve("mistralai/Mistral-Nemo-Instruct-2407");
        assert!(p.supports_structured_output);
        assert_eq!(p.context_ceiling, 8_000);
        assert_eq!(p.concurrency_ceiling, 4);
    }

    #[test]
    fn seventy_b_models_are_capped_at_one_regardless_of_request() {
        let p = ModelProfile::resolve("meta-llama/Llama-3.3-70B-Instruct");
        for requested in [1, 2, 4, 16] {
            assert_eq!(p.effective_concurrency(requested), 1);
        }
    }

    #[test]
    fn mid_size_patterns_match_case_insensitively() {
        assert_eq!(ModelProfile::resolve("Qwen/Qwen2.5-32B-Instruct").concurrency_ceiling, 1);
        assert_eq!(ModelProfile::resolve("some-34B-model").concurrency_ceiling, 1);
        assert_eq!(ModelProfile::resolve("tiny-8b").effective_concurrency(3), 3);
    }

    #[test]
    fn zero_requested_concurrency_still_admits_one_branch() {
        assert_eq!(ModelProfile::resolve("tiny-8b").effective_concurrency(0), 1);
    }
}
