//! Engine library for predictive maintenance decisions
//!
//! This crate provides the core functionality for:
//! - Feature building and the five model adapters (ONNX or heuristic)
//! - The maintenance policy engine
//! - A bounded, shared decision history
//! - Observation sources and the realtime orchestrator
//! - Health checks and observability

pub mod error;
pub mod health;
pub mod history;
pub mod ingestion;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod policy;
pub mod predictor;

pub use error::{AdapterKind, EngineError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use history::{HistorySummary, SharedHistory};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
pub use pipeline::{FailurePolicy, Orchestrator, OrchestratorConfig, RealtimeRunner, RunSummary};
pub use policy::{PolicyConfig, PolicyEngine};
