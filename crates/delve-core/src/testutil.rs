//! Scripted collaborators for unit tests.

use crate::{
    Error, GenerationRequest, LanguageModel, OutputSchema, Result, SearchHits, SearchProvider,
    SearchQuery, Tokenizer,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// One token per `chars_per_token` chars, rounded up.
pub(crate) struct CharTokenizer {
    chars_per_token: usize,
}

impl CharTokenizer {
    pub(crate) fn new(chars_per_token: usize) -> Self {
        Self { chars_per_token }
    }
}

impl Tokenizer for CharTokenizer {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallKind {
    Structured,
    Text,
}

type Handler = Box<dyn Fn(CallKind, &GenerationRequest) -> Result<String> + Send + Sync>;

/// Model whose replies come from a closure; structured replies are parsed as JSON.
pub(crate) struct ScriptedModel {
    handler: Handler,
    calls: Mutex<Vec<(CallKind, GenerationRequest)>>,
}

impl ScriptedModel {
    pub(crate) fn new(
        f: impl Fn(CallKind, &GenerationRequest) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(f),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn replying(body: &'static str) -> Self {
        Self::new(move |_, _| Ok(body.to_string()))
    }

    pub(crate) fn failing() -> Self {
        Self::new(|_, _| Err(Error::Llm("scripted failure".to_string())))
    }

    pub(crate) fn calls(&self) -> Vec<(CallKind, GenerationRequest)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.calls().into_iter().map(|(_, r)| r.prompt).collect()
    }

    fn record(&self, kind: CallKind, req: &GenerationRequest) {
        self.calls.lock().unwrap().push((kind, req.clone()));
    }
}

#[async_trait::async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate_structured(
        &self,
        req: &GenerationRequest,
        _schema: &OutputSchema,
    ) -> Result<serde_json::Value> {
        self.record(CallKind::Structured, req);
        let raw = (self.handler)(CallKind::Structured, req)?;
        serde_json::from_str(&raw).map_err(|e| Error::Parse(e.to_string()))
    }

    async fn generate_text(&self, req: &GenerationRequest) -> Result<String> {
        self.record(CallKind::Text, req);
        (self.handler)(CallKind::Text, req)
    }
}

type SearchHandler = Box<dyn Fn(&str) -> Result<SearchHits> + Send + Sync>;

/// Search provider that tracks how many calls overlap.
pub(crate) struct ScriptedSearch {
    handler: SearchHandler,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl ScriptedSearch {
    pub(crate) fn new(f: impl Fn(&str) -> Result<SearchHits> + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(f),
            delay: Duration::from_millis(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// One document and one url derived from the query text.
    pub(crate) fn echo() -> Self {
        Self::new(|q| {
            Ok(SearchHits {
                documents: vec![format!("document about {q}")],
                urls: vec![format!("https://example.com/{}", q.len())],
                provider: "scripted".to_string(),
            })
        })
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SearchProvider for ScriptedSearch {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchHits> {
        self.queries.lock().unwrap().push(q.query.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let out = (self.handler)(&q.query);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        out
    }
}
