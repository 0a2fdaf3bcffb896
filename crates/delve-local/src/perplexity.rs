use crate::{env, env_or};
use delve_core::{Error, Result, SearchHits, SearchProvider, SearchQuery};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

pub const MODEL: &str = "sonar-reasoning";
const DEFAULT_TIMEOUT_MS: u64 = 150_000;

pub(crate) fn perplexity_api_key_from_env() -> Option<String> {
    env_or("DELVE_PERPLEXITY_API_KEY", "PERPLEXITY_API_KEY")
}

/// Answers each query with one Perplexity completion; citations become the visited urls.
#[derive(Debug, Clone)]
pub struct PerplexitySearchProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl PerplexitySearchProvider {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = perplexity_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured(
                "missing DELVE_PERPLEXITY_API_KEY (or PERPLEXITY_API_KEY)".to_string(),
            )
        })?;
        Ok(Self {
            client,
            api_key,
            endpoint: Self::endpoint_from_env(),
        })
    }

    fn endpoint_from_env() -> String {
        // Docs: https://docs.perplexity.ai/api-reference/chat-completions-post
        env("DELVE_PERPLEXITY_ENDPOINT")
            .unwrap_or_else(|| "https://api.perplexity.ai/chat/completions".to_string())
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest<'a> {
    model: &'static str,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    citations: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[async_trait::async_trait]
impl SearchProvider for PerplexitySearchProvider {
    fn name(&self) -> &'static str {
        "perplexity"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchHits> {
        let t0 = Instant::now();
        let req = ChatCompletionsRequest {
            model: MODEL,
            messages: [Message {
                role: "user",
                content: &q.query,
            }],
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .timeout(Duration::from_millis(
                q.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
            ))
            .send()
            .await
            .map_err(|e| Error::Provider(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Provider(format!(
                "perplexity chat.completions HTTP {status}"
            )));
        }

        let parsed: ChatCompletionsResponse = resp
            .json()
            .await
            .map_err(|e| Error::Provider(e.to_string()))?;
        let answer = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Provider("perplexity returned no choices".to_string()))?;
        debug!(
            query = %q.query,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "perplexity search"
        );
        Ok(SearchHits {
            documents: vec![answer],
            urls: parsed.citations.unwrap_or_default(),
            provider: self.name().to_string(),
        })
    }
}
