//! HTTP API for health checks, Prometheus metrics and decision history

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use engine_lib::{
    health::{ComponentStatus, HealthRegistry},
    observability::EngineMetrics,
    pipeline::Orchestrator,
    AdapterKind, DecisionRecord, EngineError, HistorySummary, Observation,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Default number of records returned by the history listing
pub const DEFAULT_DECISION_LIMIT: usize = 50;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: EngineMetrics,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: EngineMetrics,
        orchestrator: Arc<Orchestrator>,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            orchestrator,
        }
    }
}

/// JSON error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapter: Option<AdapterKind>,
}

pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: ErrorBody {
                error: message.into(),
                kind: "not_found".to_string(),
                adapter: None,
            },
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let (status, kind) = match &err {
            EngineError::FeatureBuild { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "feature_build"),
            EngineError::ModelInference { .. } => (StatusCode::BAD_GATEWAY, "model_inference"),
            EngineError::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration"),
        };
        Self {
            status,
            body: ErrorBody {
                error: err.to_string(),
                kind: kind.to_string(),
                adapter: err.adapter(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Observation submitted for immediate processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub sequence_index: u64,
    pub observation: Observation,
}

#[derive(Debug, Deserialize)]
pub struct DecisionQuery {
    pub limit: Option<usize>,
}

/// Health check response - returns 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

async fn list_decisions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DecisionQuery>,
) -> Json<Vec<DecisionRecord>> {
    let limit = query.limit.unwrap_or(DEFAULT_DECISION_LIMIT);
    Json(state.orchestrator.history().latest(limit))
}

async fn critical_decisions(State(state): State<Arc<AppState>>) -> Json<Vec<DecisionRecord>> {
    Json(state.orchestrator.history().critical())
}

async fn get_decision(
    State(state): State<Arc<AppState>>,
    Path(sequence): Path<u64>,
) -> Result<Json<DecisionRecord>, ApiError> {
    state
        .orchestrator
        .history()
        .find(sequence)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No retained decision with sequence {}", sequence)))
}

async fn summary(State(state): State<Arc<AppState>>) -> Json<HistorySummary> {
    Json(state.orchestrator.history().summary())
}

async fn submit_observation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<DecisionRecord>, ApiError> {
    let record = state
        .orchestrator
        .process(request.observation, request.sequence_index)
        .await?;
    Ok(Json(record))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/decisions", get(list_decisions))
        .route("/api/v1/decisions/critical", get(critical_decisions))
        .route("/api/v1/decisions/:sequence", get(get_decision))
        .route("/api/v1/summary", get(summary))
        .route("/api/v1/observations", post(submit_observation))
        .with_state(state)
}

/// Start the API server; returns once shutdown is signalled
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    Ok(())
}
