use crate::budget::TextBudgeter;
use crate::capability::ModelProfile;
use crate::policy::TruncationPolicy;
use crate::structured::StructuredGenerator;
use crate::{prompts, Error, ResearchQuery, Result, SamplingParams};
use serde::Deserialize;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct QueryPlan {
    queries: Vec<ResearchQuery>,
}

/// Turns a topic plus prior learnings into search queries.
#[derive(Debug, Clone)]
pub struct QueryPlanner {
    generator: StructuredGenerator,
    budgeter: TextBudgeter,
    policy: TruncationPolicy,
}

impl QueryPlanner {
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

    /// At most `num_queries` queries; falls back to [`fallback_queries`] on any failure.
    pub async fn plan(
        &self,
        topic: &str,
        learnings: &[String],
        num_queries: usize,
        profile: &ModelProfile,
    ) -> Vec<ResearchQuery> {
        if num_queries == 0 {
            return Vec::new();
        }
        match self.try_plan(topic, learnings, num_queries, profile).await {
            Ok(queries) => {
                info!(count = queries.len(), "created search queries");
                queries
            }
            Err(e) => {
                warn!(error = %e, "query planning failed, using fallback queries");
                fallback_queries(topic, num_queries)
            }
        }
    }

    pub async fn try_plan(
        &self,
        topic: &str,
        learnings: &[String],
        num_queries: usize,
        profile: &ModelProfile,
    ) -> Result<Vec<ResearchQuery>> {
        let prompt = self.fitting_prompt(topic, learnings, num_queries, profile.context_ceiling)?;
        let plan: QueryPlan = self
            .generator
            .generate(profile, &prompt, SamplingParams::new(Some(0.7), Some(1_000)))
            .await?;
        if plan.queries.is_empty() {
            return Err(Error::Parse("model returned no queries".to_string()));
        }
        Ok(plan.queries.into_iter().take(num_queries).collect())
    }

    fn fitting_prompt(
        &self,
        topic: &str,
        learnings: &[String],
        num_queries: usize,
        ceiling: usize,
    ) -> Result<String> {
        let prompt = prompts::query_plan(topic, learnings, num_queries);
        let tokens = self.budgeter.count(&prompt);
        debug!(tokens, "query plan prompt token count");
        if tokens <= ceiling {
            return Ok(prompt);
        }
        if learnings.is_empty() {
            return Err(Error::PromptTooLarge { tokens, ceiling });
        }

        warn!(tokens, ceiling, "query plan prompt too long, keeping only recent learnings");
        let skip = learnings
            .len()
            .saturating_sub(self.policy.planner_keep_learnings);
        let prompt = prompts::query_plan(topic, &learnings[skip..], num_queries);
        let tokens = self.budgeter.count(&prompt);
        if tokens > ceiling {
            return Err(Error::PromptTooLarge { tokens, ceiling });
        }
        Ok(prompt)
    }
}

/// Deterministic queries derived from the topic, truncated to `num_queries`.
pub fn fallback_queries(topic: &str, num_queries: usize) -> Vec<ResearchQuery> {
    [
        ResearchQuery::new(
            topic,
            "Understand the basic concepts and current developments",
        ),
        ResearchQuery::new(
            format!("{topic} latest developments"),
            "Focus on recent updates and changes in the field",
        ),
        ResearchQuery::new(
            format!("{topic} detailed analysis"),
            "Deep dive into specific aspects and implications",
        ),
    ]
    .into_iter()
    .take(num_queries)
    .collect()
}
