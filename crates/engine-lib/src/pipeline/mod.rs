//! Realtime processing pipeline
//!
//! [`Orchestrator`] turns one observation into one committed decision
//! record; [`RealtimeRunner`] drives it continuously from an
//! [`ObservationSource`](crate::ingestion::ObservationSource).

mod orchestrator;
mod runner;

pub use orchestrator::{Orchestrator, OrchestratorConfig, DEFAULT_INFERENCE_TIMEOUT};
pub use runner::{DecisionObserver, FailurePolicy, RealtimeRunner, RunSummary, StopReason};
