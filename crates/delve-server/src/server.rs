//! HTTP surface: streaming research, clarifying questions, model catalog.

use crate::config::Services;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use delve_core::{ResearchEngine, ResearchRequest, StreamLine};
use futures::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{error, info};

pub const DEFAULT_BREADTH: usize = 4;
pub const DEFAULT_DEPTH: usize = 2;
pub const DEFAULT_CONCURRENCY: usize = 1;
pub const DEFAULT_QUESTIONS: usize = 3;

pub struct AppState {
    pub services: Services,
    pub default_model: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/research", post(api_research))
        .route("/api/feedback", post(api_feedback))
        .route("/api/models", get(api_models))
        .route("/api/health", get(|| async { "OK" }))
        .with_state(state)
}

/// Runs the research tree and the report on a background task.
///
/// Each learning becomes a `LEARNING:` line as its branch completes; the stream ends with one
/// `REPORT:` line, or an `ERROR:` line if the task itself died.
pub fn research_stream(
    engine: ResearchEngine,
    req: ResearchRequest,
) -> mpsc::UnboundedReceiver<StreamLine> {
    let (line_tx, line_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let run = tokio::spawn(async move { engine.run(&req, Some(event_tx)).await });
        while let Some(event) = event_rx.recv().await {
            let _ = line_tx.send(StreamLine::from(event));
        }
        let last = match run.await {
            Ok(outcome) => StreamLine::Report(outcome.report),
            Err(e) => {
                error!(error = %e, "research task failed");
                StreamLine::Error(format!("Research failed - {e}"))
            }
        };
        let _ = line_tx.send(last);
    });
    line_rx
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchBody {
    pub query: String,
    #[serde(default)]
    pub breadth: Option<usize>,
    #[serde(default)]
    pub depth: Option<usize>,
    #[serde(default)]
    pub selected_model: Option<String>,
    #[serde(default)]
    pub concurrency: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackBody {
    pub query: String,
    #[serde(default)]
    pub selected_model: Option<String>,
}

fn model_or_default(selected: Option<String>, default_model: &str) -> String {
    selected
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| default_model.to_string())
}

async fn api_research(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResearchBody>,
) -> Result<Response, (StatusCode, String)> {
    let query = body.query.trim().to_string();
    if query.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "query is required".to_string()));
    }
    let model = model_or_default(body.selected_model, &state.default_model);
    let req = ResearchRequest::new(
        query,
        body.breadth.unwrap_or(DEFAULT_BREADTH),
        body.depth.unwrap_or(DEFAULT_DEPTH),
        model,
    )
    .with_concurrency(body.concurrency.unwrap_or(DEFAULT_CONCURRENCY));
    info!(
        model = %req.model,
        breadth = req.breadth,
        depth = req.depth,
        concurrency = req.concurrency,
        "research requested"
    );

    let lines = research_stream(state.services.engine.clone(), req);
    let stream = UnboundedReceiverStream::new(lines).map(|l| Ok::<String, Infallible>(l.encode()));
    let mut res = Response::new(Body::from_stream(stream));
    res.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    Ok(res)
}

async fn api_feedback(
    State(state): State<Arc<AppState>>,
    Json(body): Json<FeedbackBody>,
) -> Json<Vec<String>> {
    let model = model_or_default(body.selected_model, &state.default_model);
    let questions = state
        .services
        .engine
        .clarifying_questions(&body.query, DEFAULT_QUESTIONS, &model)
        .await;
    Json(questions)
}

async fn api_models(State(state): State<Arc<AppState>>) -> Response {
    match state.services.catalog.list_available_models().await {
        Ok(models) => Json(models).into_response(),
        Err(e) => {
            error!(error = %e, "listing models failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Failed to fetch models" })),
            )
                .into_response()
        }
    }
}

pub async fn serve(state: Arc<AppState>, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
