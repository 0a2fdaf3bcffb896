use crate::budget::TextBudgeter;
use crate::capability::ModelProfile;
use crate::policy::TruncationPolicy;
use crate::structured::StructuredGenerator;
use crate::{dedup_preserving_order, prompts, Error, Result, SamplingParams};
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
struct Report {
    /// Final report on the topic in Markdown format with escaped newlines
    report_markdown: String,
}

/// Turns accumulated learnings into a markdown report.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    generator: StructuredGenerator,
    budgeter: TextBudgeter,
    policy: TruncationPolicy,
}

impl ReportWriter {
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

    /// Always produces a report; see [`fallback_report`].
    pub async fn write(
        &self,
        prompt: &str,
        learnings: &[String],
        visited_urls: &[String],
        profile: &ModelProfile,
    ) -> String {
        match self.try_write(prompt, learnings, visited_urls, profile).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "report generation failed, assembling fallback report");
                fallback_report(prompt, learnings, visited_urls)
            }
        }
    }

    pub async fn try_write(
        &self,
        prompt: &str,
        learnings: &[String],
        visited_urls: &[String],
        profile: &ModelProfile,
    ) -> Result<String> {
        let text = self.fitting_prompt(prompt, learnings, profile.context_ceiling)?;
        let out: Report = self
            .generator
            .generate(profile, &text, SamplingParams::new(Some(0.7), Some(2_000)))
            .await?;
        let body = out.report_markdown.replace("\\n", "\n");
        Ok(format!("{body}\n\n## Sources\n\n{}", sources(visited_urls)))
    }

    fn fitting_prompt(&self, prompt: &str, learnings: &[String], ceiling: usize) -> Result<String> {
        let text = prompts::final_report(prompt, learnings);
        let tokens = self.budgeter.count(&text);
        debug!(tokens, "report prompt token count");
        if tokens <= ceiling {
            return Ok(text);
        }

        warn!(tokens, ceiling, "report prompt too long, keeping only recent learnings");
        let skip = learnings
            .len()
            .saturating_sub(self.policy.report_keep_learnings);
        let text = prompts::final_report(prompt, &learnings[skip..]);
        let tokens = self.budgeter.count(&text);
        if tokens > ceiling {
            return Err(Error::PromptTooLarge { tokens, ceiling });
        }
        Ok(text)
    }
}

/// Deterministic report from the raw inputs.
pub fn fallback_report(prompt: &str, learnings: &[String], visited_urls: &[String]) -> String {
    format!(
        "# Research Report\n\n## Summary\n{prompt}\n\n## Key Findings\n{}\n\n## Sources\n{}",
        prompts::numbered(learnings),
        sources(visited_urls)
    )
}

fn sources(visited_urls: &[String]) -> String {
    prompts::bullets(&dedup_preserving_order(visited_urls.to_vec()))
}
