//! Schema-conforming generation over models with and without native structured output.

use crate::capability::ModelProfile;
use crate::{prompts, Error, GenerationRequest, LanguageModel, OutputSchema, Result, SamplingParams};
use regex::Regex;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use std::sync::{Arc, LazyLock};
use tracing::debug;

static THINK_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    // (?is): case-insensitive, `.` spans newlines; `*?` stops at the first closing tag.
    Regex::new(r"(?is)<think>.*?</think>").expect("static regex")
});

/// Strip `<think>...</think>` spans and return the text from the first `{` on.
pub fn sanitize_reasoning_output(raw: &str) -> Result<String> {
    let without_think = THINK_SPAN.replace_all(raw, "");
    let start = without_think
        .find('{')
        .ok_or_else(|| Error::Parse("no JSON object in model output".to_string()))?;
    Ok(without_think[start..].trim().to_string())
}

pub fn output_schema<T: JsonSchema>() -> Result<OutputSchema> {
    let schema = serde_json::to_value(schemars::schema_for!(T))
        .map_err(|e| Error::Parse(format!("schema serialization: {e}")))?;
    Ok(OutputSchema {
        name: T::schema_name().into_owned(),
        schema,
    })
}

#[derive(Clone)]
pub struct StructuredGenerator {
    model: Arc<dyn LanguageModel>,
}

impl std::fmt::Debug for StructuredGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredGenerator").finish_non_exhaustive()
    }
}

impl StructuredGenerator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Parse failures surface to the caller; nothing is retried here.
    pub async fn generate<T>(
        &self,
        profile: &ModelProfile,
        prompt: &str,
        params: SamplingParams,
    ) -> Result<T>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let req = GenerationRequest {
            model: profile.id.clone(),
            system: prompts::system_prompt().to_string(),
            prompt: prompt.to_string(),
            params,
        };

        if profile.supports_structured_output {
            let schema = output_schema::<T>()?;
            let value = self.model.generate_structured(&req, &schema).await?;
            return serde_json::from_value(value).map_err(|e| Error::Parse(e.to_string()));
        }

        debug!(model = %profile.id, "text-mode generation");
        let raw = self.model.generate_text(&req).await?;
        let json = sanitize_reasoning_output(&raw)?;
        serde_json::from_str(&json).map_err(|e| Error::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{CallKind, ScriptedModel};
    use crate::ResearchQuery;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct Probe {
        a: i64,
    }

    #[test]
    fn think_span_is_removed_before_the_first_brace() {
        let out = sanitize_reasoning_output(r#"<think>ignore me</think>{"a":1}"#).unwrap();
        assert_eq!(out, r#"{"a":1}"#);
    }

    #[test]
    fn think_spans_are_case_insensitive_non_greedy_and_multiline() {
        let raw = "<THINK>line one\n{\"no\": 1}\n</Think>prefix {\"a\":2}<think>x</think>";
        assert_eq!(sanitize_reasoning_output(raw).unwrap(), r#"{"a":2}"#);
    }

    #[test]
    fn output_without_a_brace_is_a_parse_error() {
        let err = sanitize_reasoning_output("<think>{hidden}</think>no json here").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[tokio::test]
    async fn text_mode_model_goes_through_generate_text_and_sanitizes() {
        let model = Arc::new(ScriptedModel::replying(r#"<think>hmm</think>{"a":7}"#));
        let gen = StructuredGenerator::new(model.clone());
        let profile = ModelProfile::resolve(crate::capability::REASONING_MODEL);
        let out: Probe = gen
            .generate(&profile, "p", SamplingParams::default())
            .await
            .unwrap();
        assert_eq!(out, Probe { a: 7 });
        assert_eq!(model.calls()[0].0, CallKind::Text);
        assert!(model.calls()[0].1.system.contains("raw JSON"));
    }

    #[tokio::test]
    async fn structured_model_uses_the_schema_call() {
        let model = Arc::new(ScriptedModel::replying(
            r#"{"query":"q","researchGoal":"g"}"#,
        ));
        let gen = StructuredGenerator::new(model.clone());
        let profile = ModelProfile::resolve("mistral-7b");
        let out: ResearchQuery = gen
            .generate(&profile, "p", SamplingParams::new(Some(0.7), Some(10)))
            .await
            .unwrap();
        assert_eq!(out, ResearchQuery::new("q", "g"));
        let (kind, req) = &model.calls()[0];
        assert_eq!(*kind, CallKind::Structured);
        assert_eq!(req.model, "mistral-7b");
        assert_eq!(req.params.max_tokens, Some(10));
    }

    #[tokio::test]
    async fn malformed_text_mode_json_is_a_parse_error() {
        let model = Arc::new(ScriptedModel::replying("{not json"));
        let gen = StructuredGenerator::new(model);
        let profile = ModelProfile::resolve(crate::capability::REASONING_MODEL);
        let err = gen
            .generate::<Probe>(&profile, "p", SamplingParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn schema_names_the_output_type() {
        let s = output_schema::<ResearchQuery>().unwrap();
        assert_eq!(s.name, "ResearchQuery");
        assert!(s.schema["properties"].get("researchGoal").is_some());
    }
}
