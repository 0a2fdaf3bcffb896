//! Composition root wiring collaborators into the research pipeline.

use crate::budget::TextBudgeter;
use crate::capability::{CapabilityPolicy, ModelProfile};
use crate::feedback::FeedbackGenerator;
use crate::orchestrator::{Orchestrator, ResearchEvent, ResearchRequest, SlotPolicy};
use crate::planner::QueryPlanner;
use crate::policy::TruncationPolicy;
use crate::report::ReportWriter;
use crate::structured::StructuredGenerator;
use crate::synthesizer::ResultSynthesizer;
use crate::{LanguageModel, ResearchResult, SearchProvider, Tokenizer};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    pub result: ResearchResult,
    pub report: String,
}

#[derive(Clone)]
pub struct ResearchEngine {
    model: Arc<dyn LanguageModel>,
    search: Arc<dyn SearchProvider>,
    tokenizer: Arc<dyn Tokenizer>,
    capabilities: CapabilityPolicy,
    truncation: TruncationPolicy,
    slot_policy: SlotPolicy,
}

impl std::fmt::Debug for ResearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchEngine")
            .field("search", &self.search.name())
            .field("slot_policy", &self.slot_policy)
            .finish_non_exhaustive()
    }
}

impl ResearchEngine {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        search: Arc<dyn SearchProvider>,
        tokenizer: Arc<dyn Tokenizer>,
    ) -> Self {
        Self {
            model,
            search,
            tokenizer,
            capabilities: CapabilityPolicy::default(),
            truncation: TruncationPolicy::default(),
            slot_policy: SlotPolicy::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: CapabilityPolicy) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_truncation(mut self, truncation: TruncationPolicy) -> Self {
        self.truncation = truncation;
        self
    }

    pub fn with_slot_policy(mut self, slot_policy: SlotPolicy) -> Self {
        self.slot_policy = slot_policy;
        self
    }

    pub fn search_provider(&self) -> &'static str {
        self.search.name()
    }

    pub fn profile(&self, model_id: &str) -> ModelProfile {
        self.capabilities.resolve(model_id)
    }

    fn generator(&self) -> StructuredGenerator {
        StructuredGenerator::new(self.model.clone())
    }

    fn budgeter(&self) -> TextBudgeter {
        TextBudgeter::new(self.tokenizer.clone())
    }

    pub fn orchestrator(
        &self,
        progress: Option<mpsc::UnboundedSender<ResearchEvent>>,
    ) -> Orchestrator {
        let planner = QueryPlanner::new(self.generator(), self.budgeter(), self.truncation.clone());
        let synthesizer =
            ResultSynthesizer::new(self.generator(), self.budgeter(), self.truncation.clone());
        let o = Orchestrator::new(planner, synthesizer, self.search.clone())
            .with_capabilities(self.capabilities.clone())
            .with_slot_policy(self.slot_policy)
            .with_learnings_per_query(self.truncation.learnings_per_query);
        match progress {
            Some(tx) => o.with_progress(tx),
            None => o,
        }
    }

    pub fn report_writer(&self) -> ReportWriter {
        ReportWriter::new(self.generator(), self.budgeter(), self.truncation.clone())
    }

    pub fn feedback(&self) -> FeedbackGenerator {
        FeedbackGenerator::new(self.generator())
    }

    /// Clarifying questions for `query`; never empty when `num_questions > 0`.
    pub async fn clarifying_questions(
        &self,
        query: &str,
        num_questions: usize,
        model_id: &str,
    ) -> Vec<String> {
        self.feedback()
            .questions(query, num_questions, &self.profile(model_id))
            .await
    }

    /// Research tree followed by the final report for the original query.
    pub async fn run(
        &self,
        req: &ResearchRequest,
        progress: Option<mpsc::UnboundedSender<ResearchEvent>>,
    ) -> ResearchOutcome {
        let result = self.orchestrator(progress).research(req).await;
        info!(
            learnings = result.learnings.len(),
            urls = result.visited_urls.len(),
            "research complete, writing report"
        );
        let report = self
            .report_writer()
            .write(
                &req.query,
                &result.learnings,
                &result.visited_urls,
                &self.profile(&req.model),
            )
            .await;
        ResearchOutcome { result, report }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{CharTokenizer, ScriptedModel, ScriptedSearch};
    use serde_json::json;

    fn model() -> Arc<ScriptedModel> {
        Arc::new(ScriptedModel::new(|_, req| {
            let p = &req.prompt;
            let out = if p.starts_with("Generate ") {
                json!({ "queries": [
                    { "query": "alpha", "researchGoal": "g1" },
                    { "query": "beta", "researchGoal": "g2" },
                ]})
            } else if p.starts_with("Analyze") {
                json!({ "learnings": ["shared fact"], "followUpQuestions": ["next?"] })
            } else if p.starts_with("Given the following prompt") {
                json!({ "reportMarkdown": "# Report\\n\\nshared fact" })
            } else {
                json!({ "questions": ["which part?"] })
            };
            Ok(out.to_string())
        }))
    }

    fn engine(model: Arc<ScriptedModel>) -> ResearchEngine {
        ResearchEngine::new(
            model,
            Arc::new(ScriptedSearch::echo()),
            Arc::new(CharTokenizer::new(3)),
        )
    }

    #[tokio::test]
    async fn run_produces_learnings_and_a_sourced_report() {
        let e = engine(model());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let out = e
            .run(&ResearchRequest::new("topic", 2, 1, "tiny-8b"), Some(tx))
            .await;
        assert_eq!(out.result.learnings, vec!["shared fact"]);
        assert_eq!(
            out.result.visited_urls,
            vec!["https://example.com/5", "https://example.com/4"]
        );
        assert!(out.report.starts_with("# Report\n\nshared fact\n\n## Sources\n\n"));
        assert!(out.report.contains("- https://example.com/5"));
        assert_eq!(rx.recv().await, Some(ResearchEvent::Learning("shared fact".into())));
    }

    #[tokio::test]
    async fn clarifying_questions_come_from_the_model() {
        let e = engine(model());
        assert_eq!(
            e.clarifying_questions("topic", 3, "tiny-8b").await,
            vec!["which part?"]
        );
    }
}
