//! HTTP API endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use coldstore_core::manager::ManagerStats;
use coldstore_core::metrics::{CompressionAlert, CompressionReport, MetricSeries};
use coldstore_core::monitor::{AlgorithmMetrics, CompressionMetrics};
use coldstore_core::reporting::{
    Dashboard, ReportScheduler, Reporter, ScheduleStatus, StoredReport,
};
use coldstore_core::{ColdDataCandidate, CompressionManager};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Candidates returned by `/cold/candidates` when no limit is given
const DEFAULT_CANDIDATE_LIMIT: usize = 100;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<CompressionManager>,
    pub reporter: Arc<Reporter>,
    pub scheduler: Arc<ReportScheduler>,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health))
        .route("/stats", get(stats))

        // Metrics
        .route("/metrics", get(metrics))
        .route("/metrics/dashboard", get(dashboard))
        .route("/metrics/report", get(report))
        .route("/metrics/alerts", get(alerts))
        .route("/metrics/algorithms", get(algorithms))
        .route("/metrics/timeseries", get(time_series))

        // Cold data
        .route("/cold/candidates", get(cold_candidates))

        // Scheduled reports
        .route("/reports/schedules", get(schedules))
        .route("/reports/recent", get(recent_reports))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .with_state(state)
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TimeSeriesParams {
    metric: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateParams {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: coldstore_core::VERSION.to_string(),
    })
}

async fn stats(State(state): State<AppState>) -> Json<ManagerStats> {
    Json(state.manager.stats())
}

async fn metrics(State(state): State<AppState>) -> Json<CompressionMetrics> {
    Json(state.reporter.metrics())
}

async fn dashboard(State(state): State<AppState>) -> Json<Dashboard> {
    Json(state.reporter.dashboard())
}

async fn report(State(state): State<AppState>) -> Json<CompressionReport> {
    Json(state.reporter.report())
}

async fn alerts(State(state): State<AppState>) -> Json<Vec<CompressionAlert>> {
    Json(state.reporter.alerts())
}

async fn algorithms(State(state): State<AppState>) -> Json<BTreeMap<String, AlgorithmMetrics>> {
    Json(state.reporter.algorithms())
}

async fn time_series(
    State(state): State<AppState>,
    Query(params): Query<TimeSeriesParams>,
) -> Result<Json<MetricSeries>, ApiError> {
    let name = params
        .metric
        .filter(|m| !m.is_empty())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "metric parameter required"))?;

    state
        .reporter
        .time_series(&name)
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("metric not found: {}", name)))
}

async fn cold_candidates(
    State(state): State<AppState>,
    Query(params): Query<CandidateParams>,
) -> Json<Vec<ColdDataCandidate>> {
    let limit = params.limit.unwrap_or(DEFAULT_CANDIDATE_LIMIT);
    Json(state.manager.cold_data_candidates(limit))
}

async fn schedules(State(state): State<AppState>) -> Json<Vec<ScheduleStatus>> {
    Json(state.scheduler.schedules())
}

async fn recent_reports(State(state): State<AppState>) -> Json<Vec<StoredReport>> {
    Json(state.scheduler.recent_reports())
}
