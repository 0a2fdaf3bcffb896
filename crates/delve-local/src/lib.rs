//! reqwest-backed collaborators for `delve-core`.

use delve_core::{Error, Result};
use std::time::Duration;

pub mod firecrawl;
pub mod openai_compat;
pub mod perplexity;
pub mod search;
pub mod tokenizer;

pub use firecrawl::FirecrawlSearchProvider;
pub use openai_compat::OpenAiCompatClient;
pub use perplexity::PerplexitySearchProvider;
pub use search::{search_provider_from_env, SearchBackend};
pub use tokenizer::TiktokenCounter;

/// Trimmed env value; blank counts as unset.
pub(crate) fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// `DELVE_*` name first, then the unprefixed name.
pub(crate) fn env_or(primary: &str, fallback: &str) -> Option<String> {
    env(primary).or_else(|| env(fallback))
}

/// Shared HTTP client. Per-request timeouts are set by each adapter.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("delve/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(20))
        .build()
        .map_err(|e| Error::NotConfigured(format!("http client: {e}")))
}

#[cfg(test)]
pub(crate) mod testenv {
    use std::net::SocketAddr;
    use std::sync::Mutex;

    // Env vars are process-global; serialize tests that mutate them.
    pub(crate) static ENV_LOCK: Mutex<()> = Mutex::new(());

    pub(crate) struct EnvGuard {
        k: &'static str,
        prev: Option<String>,
    }

    impl EnvGuard {
        pub(crate) fn set(k: &'static str, v: &str) -> Self {
            let prev = std::env::var(k).ok();
            std::env::set_var(k, v);
            Self { k, prev }
        }

        pub(crate) fn unset(k: &'static str) -> Self {
            let prev = std::env::var(k).ok();
            std::env::remove_var(k);
            Self { k, prev }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(v) = self.prev.take() {
                std::env::set_var(self.k, v);
            } else {
                std::env::remove_var(self.k);
            }
        }
    }

    /// Serve `app` on an ephemeral local port and return its base url.
    pub(crate) async fn serve(app: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }
}
