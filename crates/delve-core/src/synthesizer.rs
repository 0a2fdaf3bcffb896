use crate::budget::TextBudgeter;
use crate::capability::ModelProfile;
use crate::policy::TruncationPolicy;
use crate::structured::StructuredGenerator;
use crate::{prompts, Error, Result, SamplingParams, SynthesisResult};
use tracing::{debug, info, warn};

/// Extracts learnings and follow-up questions from one query's documents.
#[derive(Debug, Clone)]
pub struct ResultSynthesizer {
    generator: StructuredGenerator,
    budgeter: TextBudgeter,
    policy: TruncationPolicy,
}

impl ResultSynthesizer {
    pub fn new(
        generator: StructuredGenerator,
        budgeter: TextBudgeter,
        policy: TruncationPolicy,
    ) -> Self {
        Self {
            generator,
            budgeter,
            policy,
        }
    }

    /// Never fails: on any error returns [`fallback_synthesis`] for `query`.
    pub async fn synthesize(
        &self,
        query: &str,
        documents: &[String],
        num_learnings: usize,
        num_follow_ups: usize,
        profile: &ModelProfile,
    ) -> SynthesisResult {
        match self
            .try_synthesize(query, documents, num_learnings, num_follow_ups, profile)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(query, error = %e, "synthesis failed, using placeholder learnings");
                fallback_synthesis(query, num_learnings, num_follow_ups)
            }
        }
    }

    pub async fn try_synthesize(
        &self,
        query: &str,
        documents: &[String],
        num_learnings: usize,
        num_follow_ups: usize,
        profile: &ModelProfile,
    ) -> Result<SynthesisResult> {
        let contents: Vec<&str> = documents
            .iter()
            .map(String::as_str)
            .filter(|d| !d.is_empty())
            .collect();
        info!(query, contents = contents.len(), "synthesizing search results");

        let prompt = self.fitting_prompt(
            query,
            &contents,
            num_learnings,
            num_follow_ups,
            profile.context_ceiling,
        )?;
        let mut out: SynthesisResult = self
            .generator
            .generate(profile, &prompt, SamplingParams::new(None, Some(4_000)))
            .await?;
        out.learnings.truncate(num_learnings);
        out.follow_up_questions.truncate(num_follow_ups);
        Ok(out)
    }

    fn fitting_prompt(
        &self,
        query: &str,
        contents: &[&str],
        num_learnings: usize,
        num_follow_ups: usize,
        ceiling: usize,
    ) -> Result<String> {
        let mut tokens = 0;
        for trim in self.policy.synthesis_trim_schedule(contents.len(), ceiling) {
            let joined = contents
                .iter()
                .map(|c| self.budgeter.fit(c, trim))
                .collect::<Vec<_>>()
                .join("\n\n");
            let prompt = prompts::synthesis(query, &joined, num_learnings, num_follow_ups);
            tokens = self.budgeter.count(&prompt);
            debug!(trim, tokens, "synthesis prompt token count");
            if tokens <= ceiling {
                return Ok(prompt);
            }
            warn!(tokens, ceiling, trim, "synthesis prompt too long, trimming harder");
        }
        Err(Error::PromptTooLarge { tokens, ceiling })
    }
}

pub fn fallback_synthesis(
    query: &str,
    num_learnings: usize,
    num_follow_ups: usize,
) -> SynthesisResult {
    SynthesisResult {
        learnings: [
            format!("Found information about {query}"),
            "Additional research may be needed".to_string(),
            "Consider exploring related topics".to_string(),
        ]
        .into_iter()
        .take(num_learnings)
        .collect(),
        follow_up_questions: [
            format!("What are the most important aspects of {query}?"),
            "What are the latest developments in this area?".to_string(),
            "How does this compare to alternatives?".to_string(),
        ]
        .into_iter()
        .take(num_follow_ups)
        .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{CharTokenizer, ScriptedModel};
    use std::sync::Arc;

    const REPLY: &str = r#"{"learnings":["l1","l2","l3","l4"],"followUpQuestions":["f1","f2"]}"#;

    fn synthesizer(model: Arc<ScriptedModel>) -> (ResultSynthesizer, TextBudgeter) {
        let budgeter = TextBudgeter::new(Arc::new(CharTokenizer::new(3)));
        (
            ResultSynthesizer::new(
                StructuredGenerator::new(model),
                budgeter.clone(),
                TruncationPolicy::default(),
            ),
            budgeter,
        )
    }

    fn profile(ceiling: usize) -> ModelProfile {
        ModelProfile {
            id: "small-model".to_string(),
            supports_structured_output: true,
            context_ceiling: ceiling,
            concurrency_ceiling: 4,
        }
    }

    fn doc(tag: &str, chars: usize) -> String {
        let mut s = format!("{tag} ");
        while s.len() < chars {
            s.push_str("lorem ipsum ");
        }
        s.truncate(chars);
        s
    }

    #[tokio::test]
    async fn six_documents_are_trimmed_to_two_thousand_on_the_first_attempt() {
        let model = Arc::new(ScriptedModel::replying(REPLY));
        let (s, budgeter) = synthesizer(model.clone());
        let docs: Vec<String> = (0..6).map(|i| doc(&format!("doc{i}"), 9_000)).collect();
        s.try_synthesize("q", &docs, 3, 2, &profile(20_000))
            .await
            .unwrap();

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        let tokens = budgeter.count(&prompts[0]);
        assert!(tokens <= 6 * 2_000 + 1_000, "{tokens}");
        assert!(tokens >= 6 * 1_500, "{tokens}");
    }

    #[tokio::test]
    async fn five_documents_keep_their_full_text_when_it_fits() {
        let model = Arc::new(ScriptedModel::replying(REPLY));
        let (s, _) = synthesizer(model.clone());
        let docs: Vec<String> = (0..5).map(|i| doc(&format!("doc{i}"), 9_000)).collect();
        s.try_synthesize("q", &docs, 3, 2, &profile(20_000))
            .await
            .unwrap();
        assert!(model.prompts()[0].contains(&docs[4]));
    }

    #[tokio::test]
    async fn ladder_steps_down_until_the_prompt_fits() {
        let model = Arc::new(ScriptedModel::replying(REPLY));
        let (s, budgeter) = synthesizer(model.clone());
        let docs = vec![doc("a", 18_000), doc("b", 18_000)];
        s.try_synthesize("q", &docs, 3, 2, &profile(5_000))
            .await
            .unwrap();
        assert!(budgeter.count(&model.prompts()[0]) <= 5_000);
    }

    #[tokio::test]
    async fn exhausted_ladder_returns_placeholders_without_calling_the_model() {
        let model = Arc::new(ScriptedModel::replying(REPLY));
        let (s, _) = synthesizer(model.clone());
        let docs: Vec<String> = (0..6).map(|i| doc(&format!("doc{i}"), 9_000)).collect();
        let out = s.synthesize("rust", &docs, 3, 3, &profile(1_000)).await;
        assert_eq!(out, fallback_synthesis("rust", 3, 3));
        assert!(model.calls().is_empty());
    }

    #[tokio::test]
    async fn results_are_capped_and_only_empty_documents_dropped() {
        let model = Arc::new(ScriptedModel::replying(REPLY));
        let (s, _) = synthesizer(model.clone());
        let docs = vec![String::new(), "  ".to_string(), "real content".to_string()];
        let out = s.synthesize("q", &docs, 3, 1, &profile(8_000)).await;
        assert_eq!(out.learnings, vec!["l1", "l2", "l3"]);
        assert_eq!(out.follow_up_questions, vec!["f1"]);
        assert!(model.prompts()[0].contains("Search Results:\n  \n\nreal content\n"));
    }

    #[test]
    fn fallback_is_truncated_per_list() {
        let out = fallback_synthesis("rust", 1, 2);
        assert_eq!(out.learnings, vec!["Found information about rust"]);
        assert_eq!(
            out.follow_up_questions,
            vec![
                "What are the most important aspects of rust?",
                "What are the latest developments in this area?",
            ]
        );
    }
}
