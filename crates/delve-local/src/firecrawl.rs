use crate::{env, env_or};
use delve_core::{Error, Result, SearchHits, SearchProvider, SearchQuery};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::debug;

/// Firecrawl's own scrape timeout, forwarded in the request body.
pub const DEFAULT_TIMEOUT_MS: u64 = 150_000;

pub(crate) fn firecrawl_api_key_from_env() -> Option<String> {
    env_or("DELVE_FIRECRAWL_API_KEY", "FIRECRAWL_KEY")
}

#[derive(Debug, Clone)]
pub struct FirecrawlSearchProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl FirecrawlSearchProvider {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = firecrawl_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured("missing DELVE_FIRECRAWL_API_KEY (or FIRECRAWL_KEY)".to_string())
        })?;
        Ok(Self {
            client,
            api_key,
            endpoint: Self::endpoint_from_env(),
        })
    }

    fn endpoint_from_env() -> String {
        // Override for tests and proxies.
        env("DELVE_FIRECRAWL_ENDPOINT")
            .unwrap_or_else(|| "https://api.firecrawl.dev/v1/search".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct FirecrawlSearchResponse {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    data: Vec<FirecrawlItem>,
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct FirecrawlItem {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    markdown: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for FirecrawlSearchProvider {
    fn name(&self) -> &'static str {
        "firecrawl"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchHits> {
        let t0 = Instant::now();
        let timeout_ms = q.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
        let body = serde_json::json!({
            "query": q.query,
            "timeout": timeout_ms,
            "scrapeOptions": { "formats": ["markdown"] },
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            // Leave room for the response after Firecrawl's own deadline.
            .timeout(Duration::from_millis(timeout_ms + 10_000))
            .send()
            .await
            .map_err(|e| Error::Provider(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Provider(format!("firecrawl search HTTP {status}")));
        }

        let parsed: FirecrawlSearchResponse = resp
            .json()
            .await
            .map_err(|e| Error::Provider(e.to_string()))?;
        if !parsed.success {
            return Err(Error::Provider(
                "firecrawl search returned success=false".to_string(),
            ));
        }

        let mut documents = Vec::with_capacity(parsed.data.len());
        let mut urls = Vec::new();
        for item in parsed.data {
            documents.push(item.markdown.unwrap_or_default());
            if let Some(u) = item.url.filter(|u| !u.trim().is_empty()) {
                urls.push(u);
            }
        }
        debug!(
            query = %q.query,
            documents = documents.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "firecrawl search"
        );
        Ok(SearchHits {
            documents,
            urls,
            provider: self.name().to_string(),
        })
    }
}
