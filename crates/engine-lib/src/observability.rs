//! Observability infrastructure for the decision engine
//!
//! Provides:
//! - Prometheus metrics (inference latency, decisions by action, adapter errors,
//!   per-model inference counts, history size)
//! - Structured JSON logging with tracing

use crate::error::{AdapterKind, EngineError};
use crate::models::DecisionRecord;
use crate::predictor::ModelInfo;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    register_int_gauge_vec, Histogram, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for the model fan-out (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    inference_latency_seconds: Histogram,
    observations_processed: IntCounter,
    observations_skipped: IntCounter,
    decisions_total: IntCounterVec,
    inference_errors_total: IntCounterVec,
    model_inferences_total: IntCounterVec,
    slow_inferences_total: IntCounterVec,
    history_records: IntGauge,
    model_backend_info: IntGaugeVec,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            inference_latency_seconds: register_histogram!(
                "amos_inference_latency_seconds",
                "Time spent running the five model adapters for one observation",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register inference_latency_seconds"),

            observations_processed: register_int_counter!(
                "amos_observations_processed_total",
                "Observations that produced a decision record"
            )
            .expect("Failed to register observations_processed"),

            observations_skipped: register_int_counter!(
                "amos_observations_skipped_total",
                "Observations dropped after a processing failure"
            )
            .expect("Failed to register observations_skipped"),

            decisions_total: register_int_counter_vec!(
                "amos_decisions_total",
                "Maintenance decisions by action",
                &["action"]
            )
            .expect("Failed to register decisions_total"),

            inference_errors_total: register_int_counter_vec!(
                "amos_inference_errors_total",
                "Model adapter failures by adapter",
                &["adapter"]
            )
            .expect("Failed to register inference_errors_total"),

            model_inferences_total: register_int_counter_vec!(
                "amos_model_inferences_total",
                "ONNX model runs by adapter",
                &["adapter"]
            )
            .expect("Failed to register model_inferences_total"),

            slow_inferences_total: register_int_counter_vec!(
                "amos_slow_inferences_total",
                "ONNX model runs over the latency target by adapter",
                &["adapter"]
            )
            .expect("Failed to register slow_inferences_total"),

            history_records: register_int_gauge!(
                "amos_history_records",
                "Decision records currently retained in the history buffer"
            )
            .expect("Failed to register history_records"),

            model_backend_info: register_int_gauge_vec!(
                "amos_model_backend_info",
                "Backend serving each model adapter",
                &["adapter", "backend"]
            )
            .expect("Failed to register model_backend_info"),
        }
    }
}

/// Engine metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the same
/// underlying metrics.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new)
    }

    pub fn observe_inference_latency(&self, duration_secs: f64) {
        self.inner().inference_latency_seconds.observe(duration_secs);
    }

    /// Count a committed decision
    pub fn record_decision(&self, record: &DecisionRecord, history_len: usize) {
        let inner = self.inner();
        inner.observations_processed.inc();
        inner
            .decisions_total
            .with_label_values(&[record.decision.action.as_str()])
            .inc();
        inner.history_records.set(history_len as i64);
    }

    /// Count a failed observation, attributing it to the adapter if known
    pub fn record_failure(&self, err: &EngineError) {
        if let Some(adapter) = err.adapter() {
            self.inner()
                .inference_errors_total
                .with_label_values(&[adapter.as_str()])
                .inc();
        }
    }

    /// Count one ONNX model run
    pub fn record_model_inference(&self, adapter: AdapterKind, slow: bool) {
        let inner = self.inner();
        let labels = [adapter.as_str()];
        inner.model_inferences_total.with_label_values(&labels).inc();
        if slow {
            inner.slow_inferences_total.with_label_values(&labels).inc();
        }
    }

    pub fn inc_skipped(&self) {
        self.inner().observations_skipped.inc();
    }

    /// Publish which backend serves each adapter
    pub fn set_model_backends(&self, models: &[ModelInfo]) {
        let gauge = &self.inner().model_backend_info;
        gauge.reset();
        for model in models {
            gauge
                .with_label_values(&[model.kind.as_str(), model.backend.as_str()])
                .set(1);
        }
    }
}

/// Structured logger for engine events
#[derive(Clone)]
pub struct StructuredLogger {
    line_name: String,
}

impl StructuredLogger {
    pub fn new(line_name: impl Into<String>) -> Self {
        Self {
            line_name: line_name.into(),
        }
    }

    pub fn line_name(&self) -> &str {
        &self.line_name
    }

    pub fn log_startup(&self, version: &str, source: &str) {
        info!(
            event = "engine_started",
            line = %self.line_name,
            engine_version = %version,
            source = %source,
            "Maintenance engine started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "engine_shutdown",
            line = %self.line_name,
            reason = %reason,
            "Maintenance engine shutting down"
        );
    }

    pub fn log_model_loaded(&self, model: &ModelInfo) {
        info!(
            event = "model_loaded",
            line = %self.line_name,
            adapter = %model.kind,
            backend = model.backend.as_str(),
            checksum = model.checksum.as_deref().unwrap_or("-"),
            "Model adapter ready"
        );
    }

    /// One line per decision; critical decisions are raised to warn
    pub fn log_decision(&self, record: &DecisionRecord) {
        let decision = &record.decision;
        if record.is_critical() {
            warn!(
                event = "maintenance_decision",
                line = %self.line_name,
                sequence = record.sequence_index,
                udi = ?record.observation.udi,
                action = decision.action.as_str(),
                priority = record.priority,
                failure_mode = %decision.failure_mode,
                failure_probability = decision.failure_probability,
                remaining_life_min = decision.remaining_life_min,
                expected_cost = decision.expected_cost,
                scheduled_at = ?decision.scheduled_at,
                "Critical maintenance required"
            );
        } else {
            info!(
                event = "maintenance_decision",
                line = %self.line_name,
                sequence = record.sequence_index,
                udi = ?record.observation.udi,
                action = decision.action.as_str(),
                priority = record.priority,
                failure_mode = %decision.failure_mode,
                failure_probability = decision.failure_probability,
                remaining_life_min = decision.remaining_life_min,
                anomaly_score = decision.anomaly_score,
                expected_cost = decision.expected_cost,
                inference_us = record.inference_us,
                "Maintenance decision recorded"
            );
        }
    }

    pub fn log_inference_failure(&self, sequence_index: u64, err: &EngineError) {
        error!(
            event = "observation_failed",
            line = %self.line_name,
            sequence = sequence_index,
            adapter = err.adapter().map(|a| a.as_str()).unwrap_or("-"),
            error = %err,
            "Observation could not be processed"
        );
    }

    pub fn log_run_complete(
        &self,
        processed: u64,
        skipped: u64,
        last_sequence: Option<u64>,
        stop_reason: &str,
    ) {
        info!(
            event = "run_complete",
            line = %self.line_name,
            processed = processed,
            skipped = skipped,
            last_sequence = ?last_sequence,
            stop_reason = %stop_reason,
            "Continuous run finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::ModelBackend;

    #[test]
    fn test_engine_metrics_handles_share_registry() {
        let metrics = EngineMetrics::new();
        let other = metrics.clone();

        metrics.observe_inference_latency(0.002);
        metrics.inc_skipped();
        other.record_failure(&EngineError::inference(AdapterKind::Energy, "boom"));
        other.record_failure(&EngineError::config("not an adapter error"));
        metrics.set_model_backends(&[ModelInfo::new(AdapterKind::Anomaly, ModelBackend::Heuristic)]);

        let families = prometheus::gather();
        assert!(families.iter().any(|f| f.get_name() == "amos_inference_errors_total"));
        assert!(families.iter().any(|f| f.get_name() == "amos_model_backend_info"));
    }

    #[test]
    fn test_model_inference_counters() {
        let metrics = EngineMetrics::new();
        let inner = metrics.inner();
        let runs = inner.model_inferences_total.with_label_values(&["remaining_life"]).get();
        let slow = inner.slow_inferences_total.with_label_values(&["remaining_life"]).get();

        metrics.record_model_inference(AdapterKind::RemainingLife, false);
        metrics.record_model_inference(AdapterKind::RemainingLife, true);

        assert_eq!(
            inner.model_inferences_total.with_label_values(&["remaining_life"]).get(),
            runs + 2
        );
        assert_eq!(
            inner.slow_inferences_total.with_label_values(&["remaining_life"]).get(),
            slow + 1
        );
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("line-1");
        assert_eq!(logger.line_name(), "line-1");
    }
}
