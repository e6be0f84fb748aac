//! HTTP API routes

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use common::{AppError, ComponentHealth, HealthStatus, ServiceStatus, SuccessResponse};
use remote_rules::{
    parse_interval, RemoteInfo, ResponseDirective, SchedulerStatus, SourceConfig,
    SourceScheduler, SourceSummary,
};
use serde::{Deserialize, Serialize};

use crate::config::SERVICE_NAME;
use crate::error::app_error;

type ApiResult<T> = Result<Json<SuccessResponse<T>>, AppError>;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub remote: Arc<RemoteInfo>,
    pub scheduler: Arc<SourceScheduler>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(remote: Arc<RemoteInfo>, scheduler: Arc<SourceScheduler>) -> Self {
        Self {
            remote,
            scheduler,
            started_at: Instant::now(),
        }
    }
}

/// Create all API routes
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Source management
        .route(
            "/api/sources",
            get(list_sources).post(add_source).delete(remove_source),
        )
        .route("/api/sources/reload", post(reload_source))
        // Message evaluation
        .route("/api/evaluate", post(evaluate))
        .route("/api/scheduler/status", get(scheduler_status))
        .layer(axum::middleware::from_fn(common::logging::http_request_logger))
        .with_state(state)
}

// ============================================================================
// Request / response bodies
// ============================================================================

/// Refresh interval as seconds or as text such as "10m" or "2 hours"
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IntervalInput {
    Seconds(u64),
    Text(String),
}

impl IntervalInput {
    fn seconds(&self) -> remote_rules::Result<u64> {
        match self {
            IntervalInput::Seconds(secs) => Ok(*secs),
            IntervalInput::Text(text) => parse_interval(text),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddSourceRequest {
    pub url: String,
    pub pattern: Option<String>,
    pub interval: Option<IntervalInput>,
}

#[derive(Debug, Deserialize)]
pub struct SourceQuery {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReloadRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub url: String,
    pub started: bool,
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub text: String,
    #[serde(default)]
    pub addressed: bool,
    /// Nick used to render the final reply text
    pub sender: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DirectiveView {
    #[serde(flatten)]
    pub directive: ResponseDirective,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub matched: bool,
    pub directives: Vec<DirectiveView>,
}

fn require_url(url: Option<&str>) -> Result<&str, AppError> {
    match url.map(str::trim) {
        Some(url) if !url.is_empty() => Ok(url),
        _ => Err(AppError::invalid_field("url", "url is required")),
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    let mut checks = HashMap::new();

    let scheduler = if state.scheduler.is_running() {
        ComponentHealth::healthy()
    } else {
        ComponentHealth::with_status(ServiceStatus::Degraded, "scheduler not running")
    };
    checks.insert("scheduler".to_string(), scheduler);

    let store = match state.remote.list_sources().await {
        Ok(sources) => ComponentHealth::with_status(
            ServiceStatus::Healthy,
            format!("{} sources declared", sources.len()),
        ),
        Err(e) => ComponentHealth::with_status(ServiceStatus::Unhealthy, e.to_string()),
    };
    checks.insert("store".to_string(), store);

    let status = checks
        .values()
        .map(|c| c.status)
        .fold(ServiceStatus::Healthy, |acc, s| match (acc, s) {
            (ServiceStatus::Unhealthy, _) | (_, ServiceStatus::Unhealthy) => {
                ServiceStatus::Unhealthy
            },
            (ServiceStatus::Degraded, _) | (_, ServiceStatus::Degraded) => {
                ServiceStatus::Degraded
            },
            _ => ServiceStatus::Healthy,
        });

    Json(HealthStatus {
        status,
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now(),
        checks,
    })
}

async fn list_sources(State(state): State<AppState>) -> ApiResult<Vec<SourceSummary>> {
    let sources = state.remote.list_sources().await.map_err(app_error)?;
    Ok(Json(SuccessResponse::new(sources)))
}

async fn add_source(
    State(state): State<AppState>,
    Json(req): Json<AddSourceRequest>,
) -> ApiResult<SourceConfig> {
    let url = require_url(Some(req.url.as_str()))?;
    let interval = req
        .interval
        .as_ref()
        .map(IntervalInput::seconds)
        .transpose()
        .map_err(app_error)?;

    let config = state
        .remote
        .add_source(url, req.pattern.as_deref(), interval)
        .await
        .map_err(app_error)?;

    Ok(Json(SuccessResponse::new(config)))
}

async fn remove_source(
    State(state): State<AppState>,
    Query(query): Query<SourceQuery>,
) -> ApiResult<String> {
    let url = require_url(query.url.as_deref())?;
    state.remote.remove_source(url).await.map_err(app_error)?;
    Ok(Json(SuccessResponse::new(url.to_string())))
}

async fn reload_source(
    State(state): State<AppState>,
    Json(req): Json<ReloadRequest>,
) -> ApiResult<ReloadResponse> {
    let url = require_url(Some(req.url.as_str()))?;
    let outcome = state.remote.reload_source(url).await.map_err(app_error)?;

    Ok(Json(SuccessResponse::new(ReloadResponse {
        url: url.to_string(),
        started: outcome.started(),
    })))
}

async fn evaluate(
    State(state): State<AppState>,
    Json(req): Json<EvaluateRequest>,
) -> ApiResult<EvaluateResponse> {
    let evaluation = state.remote.evaluate(&req.text, req.addressed);

    let directives = evaluation
        .directives
        .into_iter()
        .map(|directive| DirectiveView {
            rendered: req.sender.as_deref().map(|s| directive.render(s)),
            directive,
        })
        .collect::<Vec<_>>();

    Ok(Json(SuccessResponse::new(EvaluateResponse {
        matched: !directives.is_empty(),
        directives,
    })))
}

async fn scheduler_status(State(state): State<AppState>) -> ApiResult<SchedulerStatus> {
    Ok(Json(SuccessResponse::new(state.scheduler.status().await)))
}
