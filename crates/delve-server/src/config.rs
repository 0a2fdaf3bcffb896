//! Environment-driven wiring of the research engine.

use anyhow::{Context, Result};
use delve_core::{ModelCatalog, ResearchEngine, SlotPolicy};
use delve_local::{http_client, search_provider_from_env, OpenAiCompatClient, TiktokenCounter};
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_BIND: &str = "0.0.0.0:3000";

/// Loads the dotenv file named by `DELVE_ENV_FILE`, if any. Existing process variables win.
pub fn load_env_file() -> Result<()> {
    let Some(path) = std::env::var_os("DELVE_ENV_FILE").filter(|p| !p.is_empty()) else {
        return Ok(());
    };
    dotenvy::from_path(&path)
        .with_context(|| format!("loading env file {}", path.to_string_lossy()))
}

/// `--bind`/`DELVE_BIND` first, then `PORT` on all interfaces, then the default.
pub fn resolve_bind(explicit: Option<String>) -> String {
    explicit
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            std::env::var("PORT")
                .ok()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .map(|p| format!("0.0.0.0:{p}"))
        })
        .unwrap_or_else(|| DEFAULT_BIND.to_string())
}

#[derive(Clone)]
pub struct Services {
    pub engine: ResearchEngine,
    pub catalog: Arc<dyn ModelCatalog>,
}

impl Services {
    pub fn from_env(slot_policy: SlotPolicy) -> Result<Self> {
        let client = http_client()?;
        let llm = Arc::new(
            OpenAiCompatClient::from_env(client.clone()).context("configuring model backend")?,
        );
        let search = search_provider_from_env(client).context("configuring search backend")?;
        let tokenizer = Arc::new(TiktokenCounter::o200k()?);
        info!(
            base_url = llm.base_url(),
            search = search.name(),
            ?slot_policy,
            "backends configured"
        );
        let engine =
            ResearchEngine::new(llm.clone(), search, tokenizer).with_slot_policy(slot_policy);
        Ok(Self {
            engine,
            catalog: llm,
        })
    }
}

/// Catalog entries with at least `min_context_length` tokens of context.
pub async fn list_models(
    catalog: &dyn ModelCatalog,
    min_context_length: u64,
) -> Result<Vec<delve_core::ModelInfo>> {
    let models = catalog.list_available_models().await?;
    Ok(models
        .into_iter()
        .filter(|m| m.context_length >= min_context_length)
        .collect())
}
