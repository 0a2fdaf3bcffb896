//! Recursive breadth/depth research driver.
//!
//! A [`ResearchTask`] is one node of the research tree: a query plus the remaining breadth and
//! depth and everything learned on the way down. The orchestrator plans queries for a task, fans
//! them out as branches under a concurrency gate, and turns each branch into either a leaf result
//! or a child task with `ceil(breadth / 2)` and `depth - 1`.
//!
//! The gate is created per [`Orchestrator::research`] call. [`SlotPolicy`] decides whether a
//! branch keeps its permit while its subtree runs.

use crate::capability::{CapabilityPolicy, ModelProfile};
use crate::planner::QueryPlanner;
use crate::synthesizer::ResultSynthesizer;
use crate::{prompts, Error, ResearchQuery, ResearchResult, Result, SearchProvider, SearchQuery};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotPolicy {
    /// One gate for the whole tree; a branch gives up its permit before descending.
    #[default]
    ReleaseBeforeDescend,
    /// Each level gets its own gate of the same width and a parent keeps its permit until its
    /// subtree settles.
    HoldForSubtree,
}

impl std::str::FromStr for SlotPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "release" | "release_before_descend" => Ok(Self::ReleaseBeforeDescend),
            "hold" | "hold_for_subtree" => Ok(Self::HoldForSubtree),
            other => Err(Error::NotConfigured(format!(
                "unknown slot policy: {other} (allowed: release, hold)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResearchEvent {
    Learning(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub query: String,
    pub breadth: usize,
    pub depth: usize,
    pub learnings: Vec<String>,
    pub visited_urls: Vec<String>,
    pub model: String,
    pub concurrency: usize,
}

impl ResearchRequest {
    pub fn new(
        query: impl Into<String>,
        breadth: usize,
        depth: usize,
        model: impl Into<String>,
    ) -> Self {
        Self {
            query: query.into(),
            breadth,
            depth,
            learnings: Vec::new(),
            visited_urls: Vec::new(),
            model: model.into(),
            concurrency: 1,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchTask {
    pub query: String,
    pub breadth: usize,
    pub depth: usize,
    pub learnings: Vec<String>,
    pub visited_urls: Vec<String>,
}

impl From<&ResearchRequest> for ResearchTask {
    fn from(req: &ResearchRequest) -> Self {
        Self {
            query: req.query.clone(),
            breadth: req.breadth,
            depth: req.depth,
            learnings: req.learnings.clone(),
            visited_urls: req.visited_urls.clone(),
        }
    }
}

/// Gate state shared by every task of one invocation.
struct Gate {
    shared: Arc<Semaphore>,
    width: usize,
}

pub struct Orchestrator {
    planner: QueryPlanner,
    synthesizer: ResultSynthesizer,
    search: Arc<dyn SearchProvider>,
    capabilities: CapabilityPolicy,
    slot_policy: SlotPolicy,
    learnings_per_query: usize,
    progress: Option<mpsc::UnboundedSender<ResearchEvent>>,
}

impl Orchestrator {
    pub fn new(
        planner: QueryPlanner,
        synthesizer: ResultSynthesizer,
        search: Arc<dyn SearchProvider>,
    ) -> Self {
        Self {
            planner,
            synthesizer,
            search,
            capabilities: CapabilityPolicy::default(),
            slot_policy: SlotPolicy::default(),
            learnings_per_query: 3,
            progress: None,
        }
    }

    pub fn with_capabilities(mut self, capabilities: CapabilityPolicy) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_slot_policy(mut self, slot_policy: SlotPolicy) -> Self {
        self.slot_policy = slot_policy;
        self
    }

    pub fn with_learnings_per_query(mut self, n: usize) -> Self {
        self.learnings_per_query = n;
        self
    }

    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<ResearchEvent>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub async fn research(&self, req: &ResearchRequest) -> ResearchResult {
        let profile = self.capabilities.resolve(&req.model);
        let width = profile.effective_concurrency(req.concurrency);
        info!(
            model = %profile.id,
            requested = req.concurrency,
            width,
            breadth = req.breadth,
            depth = req.depth,
            "starting research"
        );
        let gate = Gate {
            shared: Arc::new(Semaphore::new(width)),
            width,
        };
        self.run(ResearchTask::from(req), &gate, &profile).await
    }

    fn run<'a>(
        &'a self,
        task: ResearchTask,
        gate: &'a Gate,
        profile: &'a ModelProfile,
    ) -> BoxFuture<'a, ResearchResult> {
        async move {
            if task.depth == 0 {
                return ResearchResult::new(task.learnings, task.visited_urls).dedup();
            }

            let queries = self
                .planner
                .plan(&task.query, &task.learnings, task.breadth, profile)
                .await;
            let level_gate = match self.slot_policy {
                SlotPolicy::ReleaseBeforeDescend => gate.shared.clone(),
                SlotPolicy::HoldForSubtree => Arc::new(Semaphore::new(gate.width)),
            };

            let task = &task;
            let branches = queries.into_iter().map(|q| {
                let level_gate = level_gate.clone();
                async move {
                    let query = q.query.clone();
                    let branch = self.run_branch(task, q, level_gate, gate, profile);
                    match AssertUnwindSafe(branch).catch_unwind().await {
                        Ok(Ok(r)) => r,
                        Ok(Err(e)) => {
                            warn!(query = %query, error = %e, "branch failed");
                            ResearchResult::default()
                        }
                        Err(_) => {
                            error!(query = %query, "branch panicked");
                            ResearchResult::default()
                        }
                    }
                }
            });
            ResearchResult::union(join_all(branches).await)
        }
        .boxed()
    }

    async fn run_branch(
        &self,
        parent: &ResearchTask,
        q: ResearchQuery,
        level_gate: Arc<Semaphore>,
        gate: &Gate,
        profile: &ModelProfile,
    ) -> Result<ResearchResult> {
        // The gate is never closed while the tree runs.
        let Ok(permit) = level_gate.acquire_owned().await else {
            return Ok(ResearchResult::default());
        };

        let search_query = SearchQuery::new(q.query.clone());
        let hits = match self.search.search(&search_query).await {
            Ok(h) => h,
            Err(e) => {
                warn!(
                    query = %q.query,
                    provider = self.search.name(),
                    error = %e,
                    "search failed, branch contributes nothing"
                );
                return Ok(ResearchResult::default());
            }
        };

        let next_breadth = parent.breadth.div_ceil(2);
        let next_depth = parent.depth.saturating_sub(1);
        let synthesis = self
            .synthesizer
            .synthesize(
                &q.query,
                &hits.documents,
                self.learnings_per_query,
                next_breadth,
                profile,
            )
            .await;
        self.emit_learnings(&synthesis.learnings);

        let mut learnings = parent.learnings.clone();
        learnings.extend(synthesis.learnings);
        let mut visited_urls = parent.visited_urls.clone();
        visited_urls.extend(hits.urls.into_iter().filter(|u| !u.trim().is_empty()));

        if next_depth == 0 {
            return Ok(ResearchResult::new(learnings, visited_urls));
        }

        info!(breadth = next_breadth, depth = next_depth, "researching deeper");
        let child = ResearchTask {
            query: prompts::next_level_query(&q.research_goal, &synthesis.follow_up_questions),
            breadth: next_breadth,
            depth: next_depth,
            learnings,
            visited_urls,
        };
        let held = match self.slot_policy {
            SlotPolicy::ReleaseBeforeDescend => {
                drop(permit);
                None
            }
            SlotPolicy::HoldForSubtree => Some(permit),
        };
        let result = self.run(child, gate, profile).await;
        drop(held);
        Ok(result)
    }

    fn emit_learnings(&self, learnings: &[String]) {
        let Some(tx) = &self.progress else {
            return;
        };
        for l in learnings {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(ResearchEvent::Learning(l.clone()));
        }
    }
}
