//! Backend-agnostic recursive research orchestration.
//!
//! This crate contains no IO. Model invocation, search, tokenization and the model catalog are
//! collaborator traits; `delve-local` provides the reqwest-backed implementations.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub mod budget;
pub mod capability;
pub mod engine;
pub mod feedback;
pub mod orchestrator;
pub mod planner;
pub mod policy;
pub mod prompts;
pub mod protocol;
pub mod report;
pub mod splitter;
pub mod structured;
pub mod synthesizer;
#[cfg(test)]
pub(crate) mod testutil;

pub use budget::TextBudgeter;
pub use capability::{CapabilityPolicy, ModelProfile};
pub use engine::{ResearchEngine, ResearchOutcome};
pub use feedback::FeedbackGenerator;
pub use orchestrator::{Orchestrator, ResearchEvent, ResearchRequest, ResearchTask, SlotPolicy};
pub use planner::QueryPlanner;
pub use policy::TruncationPolicy;
pub use protocol::StreamLine;
pub use report::ReportWriter;
pub use structured::StructuredGenerator;
pub use synthesizer::ResultSynthesizer;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Structured output could not be extracted or decoded.
    #[error("parse failed: {0}")]
    Parse(String),
    #[error("prompt too large: {tokens} tokens exceeds ceiling of {ceiling}")]
    PromptTooLarge { tokens: usize, ceiling: usize },
    /// Search/scrape transport failure.
    #[error("provider failed: {0}")]
    Provider(String),
    /// Model transport failure.
    #[error("llm failed: {0}")]
    Llm(String),
    #[error("tokenizer failed: {0}")]
    Tokenizer(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// One search query proposed by the planner, with the reason it is worth running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResearchQuery {
    /// The search query to use
    pub query: String,
    /// Research goal and additional directions for this query
    pub research_goal: String,
}

impl ResearchQuery {
    pub fn new(query: impl Into<String>, research_goal: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            research_goal: research_goal.into(),
        }
    }
}

/// Learnings and follow-up questions extracted from one query's documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisResult {
    /// Key learnings from the search results
    pub learnings: Vec<String>,
    /// Follow-up questions to explore the topic further
    pub follow_up_questions: Vec<String>,
}

/// Accumulated output of a research subtree.
///
/// `learnings` and `visited_urls` keep first-seen order; call [`ResearchResult::dedup`] (or build
/// through [`ResearchResult::union`]) to collapse exact duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchResult {
    pub learnings: Vec<String>,
    pub visited_urls: Vec<String>,
}

impl ResearchResult {
    pub fn new(learnings: Vec<String>, visited_urls: Vec<String>) -> Self {
        Self {
            learnings,
            visited_urls,
        }
    }

    pub fn dedup(self) -> Self {
        Self {
            learnings: dedup_preserving_order(self.learnings),
            visited_urls: dedup_preserving_order(self.visited_urls),
        }
    }

    /// Set union of several results by exact string equality, in first-seen order.
    pub fn union(results: impl IntoIterator<Item = ResearchResult>) -> Self {
        let mut learnings = Vec::new();
        let mut visited_urls = Vec::new();
        for r in results {
            learnings.extend(r.learnings);
            visited_urls.extend(r.visited_urls);
        }
        Self::new(learnings, visited_urls).dedup()
    }
}

pub fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    /// Timeout for the provider request.
    pub timeout_ms: Option<u64>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            timeout_ms: None,
        }
    }
}

/// Documents and source urls returned for one query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchHits {
    /// Plain-text/markdown bodies, in provider order. May contain empty entries.
    pub documents: Vec<String>,
    pub urls: Vec<String>,
    pub provider: String,
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, q: &SearchQuery) -> Result<SearchHits>;
}

/// Deterministic token count for a fixed encoding.
pub trait Tokenizer: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
}

impl SamplingParams {
    pub fn new(temperature: Option<f64>, max_tokens: Option<u64>) -> Self {
        Self {
            temperature,
            max_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub params: SamplingParams,
}

/// JSON schema handed to a schema-constrained generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSchema {
    pub name: String,
    pub schema: serde_json::Value,
}

#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    /// Schema-constrained generation; returns the decoded JSON value.
    async fn generate_structured(
        &self,
        req: &GenerationRequest,
        schema: &OutputSchema,
    ) -> Result<serde_json::Value>;

    /// Free-text generation.
    async fn generate_text(&self, req: &GenerationRequest) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub available_on_current_plan: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub model_class: String,
    #[serde(default)]
    pub context_length: u64,
    #[serde(default)]
    pub max_completion_tokens: u64,
}

#[async_trait::async_trait]
pub trait ModelCatalog: Send + Sync {
    async fn list_available_models(&self) -> Result<Vec<ModelInfo>>;
}
