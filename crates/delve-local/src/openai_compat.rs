//! OpenAI-compatible chat-completions client (Featherless by default).

use crate::{env, env_or};
use delve_core::structured::sanitize_reasoning_output;
use delve_core::{
    Error, GenerationRequest, LanguageModel, ModelCatalog, ModelInfo, OutputSchema, Result,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.featherless.ai/v1";
const DEFAULT_TIMEOUT_MS: u64 = 300_000;

fn api_key_from_env() -> Option<String> {
    env_or("DELVE_FEATHERLESS_API_KEY", "FEATHERLESS_KEY")
}

fn base_url_from_env() -> Option<String> {
    env("DELVE_FEATHERLESS_BASE_URL")
}

#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiCompatClient {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = api_key_from_env().ok_or_else(|| {
            Error::NotConfigured(
                "missing DELVE_FEATHERLESS_API_KEY (or FEATHERLESS_KEY)".to_string(),
            )
        })?;
        let base_url = base_url_from_env().unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Ok(Self::new(client, base_url, api_key))
    }

    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }

    async fn chat(&self, req: &GenerationRequest, schema: Option<&OutputSchema>) -> Result<String> {
        let body = ChatCompletionsRequest {
            model: req.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: req.system.clone(),
                },
                Message {
                    role: "user".to_string(),
                    content: req.prompt.clone(),
                },
            ],
            max_tokens: req.params.max_tokens,
            temperature: req.params.temperature,
            response_format: schema.map(ResponseFormat::json_schema),
            stream: Some(false),
        };
        debug!(model = %req.model, structured = schema.is_some(), "chat.completions request");

        let resp = self
            .client
            .post(self.endpoint("chat/completions"))
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Llm(format!("chat.completions HTTP {status}")));
        }

        let parsed: ChatCompletionsResponse =
            resp.json().await.map_err(|e| Error::Llm(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Llm("chat.completions returned no content".to_string()))
    }

    /// `GET {base}/models`, keeping entries available on the current plan.
    pub async fn try_list_models(&self) -> Result<Vec<ModelInfo>> {
        let resp = self
            .client
            .get(self.endpoint("models"))
            .timeout(Duration::from_secs(30))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| Error::Provider(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Provider(format!("models HTTP {status}")));
        }
        let body: serde_json::Value =
            resp.json().await.map_err(|e| Error::Provider(e.to_string()))?;
        Ok(parse_models(body)
            .into_iter()
            .filter(|m| m.available_on_current_plan)
            .collect())
    }
}

/// Accepts `{ "data": [...] }` or a bare array; entries that fail to decode are skipped.
fn parse_models(body: serde_json::Value) -> Vec<ModelInfo> {
    let items = match body {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut obj) => match obj.remove("data") {
            Some(serde_json::Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect()
}

#[async_trait::async_trait]
impl LanguageModel for OpenAiCompatClient {
    async fn generate_structured(
        &self,
        req: &GenerationRequest,
        schema: &OutputSchema,
    ) -> Result<serde_json::Value> {
        let content = self.chat(req, Some(schema)).await?;
        match serde_json::from_str(content.trim()) {
            Ok(v) => Ok(v),
            // Some backends still wrap the object in prose or fences.
            Err(_) => {
                let json = sanitize_reasoning_output(&content)?;
                serde_json::from_str(&json).map_err(|e| Error::Parse(e.to_string()))
            }
        }
    }

    async fn generate_text(&self, req: &GenerationRequest) -> Result<String> {
        self.chat(req, None).await
    }
}

#[async_trait::async_trait]
impl ModelCatalog for OpenAiCompatClient {
    /// Empty on any failure.
    async fn list_available_models(&self) -> Result<Vec<ModelInfo>> {
        match self.try_list_models().await {
            Ok(models) => Ok(models),
            Err(e) => {
                warn!(error = %e, "model catalog unavailable");
                Ok(Vec::new())
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat,
}

impl ResponseFormat {
    fn json_schema(schema: &OutputSchema) -> Self {
        Self {
            kind: "json_schema",
            json_schema: JsonSchemaFormat {
                name: schema.name.clone(),
                schema: schema.schema.clone(),
                strict: true,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct JsonSchemaFormat {
    name: String,
    schema: serde_json::Value,
    strict: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
