//! Search backend selection from the environment.

use crate::firecrawl::{firecrawl_api_key_from_env, FirecrawlSearchProvider};
use crate::perplexity::{perplexity_api_key_from_env, PerplexitySearchProvider};
use delve_core::{Error, Result, SearchProvider};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBackend {
    Perplexity,
    Firecrawl,
}

impl SearchBackend {
    /// Perplexity when its key is set, otherwise Firecrawl.
    pub fn from_env() -> Result<Self> {
        if perplexity_api_key_from_env().is_some() {
            Ok(Self::Perplexity)
        } else if firecrawl_api_key_from_env().is_some() {
            Ok(Self::Firecrawl)
        } else {
            Err(Error::NotConfigured(
                "no search backend: set DELVE_PERPLEXITY_API_KEY or DELVE_FIRECRAWL_API_KEY"
                    .to_string(),
            ))
        }
    }
}

pub fn search_provider_from_env(client: reqwest::Client) -> Result<Arc<dyn SearchProvider>> {
    let backend = SearchBackend::from_env()?;
    info!(?backend, "search backend selected");
    Ok(match backend {
        SearchBackend::Perplexity => Arc::new(PerplexitySearchProvider::from_env(client)?),
        SearchBackend::Firecrawl => Arc::new(FirecrawlSearchProvider::from_env(client)?),
    })
}
