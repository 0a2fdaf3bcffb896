//! Clarifying questions asked before a research run.

use crate::capability::ModelProfile;
use crate::structured::StructuredGenerator;
use crate::{prompts, Error, Result, SamplingParams};
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct Questions {
    /// Follow up questions to clarify the research direction
    questions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FeedbackGenerator {
    generator: StructuredGenerator,
}

impl FeedbackGenerator {
    pub fn new(generator: StructuredGenerator) -> Self {
        Self { generator }
    }

    pub async fn questions(
        &self,
        query: &str,
        num_questions: usize,
        profile: &ModelProfile,
    ) -> Vec<String> {
        match self.try_questions(query, num_questions, profile).await {
            Ok(q) => q,
            Err(e) => {
                warn!(error = %e, "clarifying questions failed, using defaults");
                fallback_questions(num_questions)
            }
        }
    }

    pub async fn try_questions(
        &self,
        query: &str,
        num_questions: usize,
        profile: &ModelProfile,
    ) -> Result<Vec<String>> {
        let prompt = prompts::clarifying_questions(query, num_questions);
        let out: Questions = self
            .generator
            .generate(profile, &prompt, SamplingParams::new(Some(0.7), Some(500)))
            .await?;
        if out.questions.is_empty() {
            return Err(Error::Parse("model returned no questions".to_string()));
        }
        Ok(out.questions.into_iter().take(num_questions).collect())
    }
}

pub fn fallback_questions(num_questions: usize) -> Vec<String> {
    [
        "Could you provide more specific details about what you want to learn?",
        "What is your main goal with this research?",
        "Are there any specific aspects you want to focus on?",
    ]
    .into_iter()
    .take(num_questions)
    .map(String::from)
    .collect()
}
