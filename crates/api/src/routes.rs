use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use extract::{prompt::DEFAULT_FOCUS, AuditReport, Extractor, GraphData};
use serde::Deserialize;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::error::ApiError;
use crate::metrics::{Metrics, MetricsSnapshot, Operation, TimedOperation};

pub struct AppState {
    pub extractor: Extractor,
    pub metrics: Arc<Metrics>,
}

#[derive(Deserialize)]
struct GenerateRequest {
    text: String,
    #[serde(default)]
    focus: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest {
    source_text: String,
    graph_data: GraphData,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptimizeRequest {
    source_text: String,
    current_graph: GraphData,
    suggestions: String,
}

/// API routes, plus the frontend bundle as fallback when `dist_dir` is given.
pub fn router(state: Arc<AppState>, dist_dir: Option<&Path>) -> Router {
    let app = Router::new()
        .route("/health", get(health))
        .route("/api/generate", post(generate_graph))
        .route("/api/verify", post(verify_graph))
        .route("/api/optimize", post(optimize_graph))
        .route("/api/metrics", get(get_metrics))
        .with_state(state);

    let app = match dist_dir {
        Some(dir) => app.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true)),
        None => app,
    };

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health() -> &'static str {
    "ok"
}

async fn generate_graph(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GraphData>, ApiError> {
    let timer = TimedOperation::start();
    let focus = req
        .focus
        .as_deref()
        .map(str::trim)
        .filter(|focus| !focus.is_empty())
        .unwrap_or(DEFAULT_FOCUS);

    let result = state.extractor.generate(&req.text, focus).await;
    graph_response(&state, Operation::Generate, timer, result)
}

async fn verify_graph(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<AuditReport>, ApiError> {
    let timer = TimedOperation::start();
    let result = state.extractor.verify(&req.source_text, &req.graph_data).await;

    state
        .metrics
        .record_request(Operation::Verify, timer.elapsed(), result.is_ok());
    Ok(Json(result?))
}

async fn optimize_graph(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OptimizeRequest>,
) -> Result<Json<GraphData>, ApiError> {
    let timer = TimedOperation::start();
    let result = state
        .extractor
        .optimize(&req.source_text, &req.current_graph, &req.suggestions)
        .await;
    graph_response(&state, Operation::Optimize, timer, result)
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

fn graph_response(
    state: &AppState,
    operation: Operation,
    timer: TimedOperation,
    result: Result<GraphData, extract::ExtractError>,
) -> Result<Json<GraphData>, ApiError> {
    state
        .metrics
        .record_request(operation, timer.elapsed(), result.is_ok());

    let graph = result?;
    state.metrics.record_graph(graph.nodes.len(), graph.edges.len());
    Ok(Json(graph))
}
