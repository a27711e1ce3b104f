//! Continuous run loop
//!
//! Pulls observations from a source, hands each to the orchestrator with a
//! monotonically increasing sequence index and fans the resulting records
//! out to observers until the source is exhausted, shutdown is signalled
//! or a fatal error occurs.

use super::Orchestrator;
use crate::health::{components, HealthRegistry};
use crate::ingestion::ObservationSource;
use crate::models::DecisionRecord;
use crate::observability::{EngineMetrics, StructuredLogger};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::info;

/// What a failed observation does to the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the run on the first failed observation
    #[default]
    Abort,
    /// Log, count and continue; the sequence index is consumed
    Skip,
}

impl FromStr for FailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "skip" => Ok(FailurePolicy::Skip),
            other => anyhow::bail!("Unknown failure policy '{}' (expected abort or skip)", other),
        }
    }
}

/// Receives every committed decision record
pub trait DecisionObserver: Send + Sync {
    fn on_decision(&self, record: &DecisionRecord);
}

impl DecisionObserver for StructuredLogger {
    fn on_decision(&self, record: &DecisionRecord) {
        self.log_decision(record);
    }
}

impl DecisionObserver for mpsc::UnboundedSender<DecisionRecord> {
    fn on_decision(&self, record: &DecisionRecord) {
        // A dropped receiver only means nobody is listening anymore
        let _ = self.send(record.clone());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Exhausted,
    Shutdown,
    Aborted,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Exhausted => "exhausted",
            StopReason::Shutdown => "shutdown",
            StopReason::Aborted => "aborted",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub processed: u64,
    pub skipped: u64,
    pub last_sequence: Option<u64>,
    pub stop_reason: StopReason,
    /// Error that aborted the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.stop_reason != StopReason::Aborted
    }
}

pub struct RealtimeRunner {
    orchestrator: Arc<Orchestrator>,
    observers: Vec<Arc<dyn DecisionObserver>>,
    failure_policy: FailurePolicy,
    health: Option<HealthRegistry>,
    logger: StructuredLogger,
    metrics: EngineMetrics,
}

impl RealtimeRunner {
    pub fn new(orchestrator: Arc<Orchestrator>, logger: StructuredLogger) -> Self {
        Self {
            orchestrator,
            observers: Vec::new(),
            failure_policy: FailurePolicy::default(),
            health: None,
            logger,
            metrics: EngineMetrics::new(),
        }
    }

    pub fn observer(mut self, observer: Arc<dyn DecisionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Run until the source is exhausted, shutdown is received or an
    /// observation fails under [`FailurePolicy::Abort`]
    pub async fn run(
        &self,
        source: &mut dyn ObservationSource,
        mut shutdown: broadcast::Receiver<()>,
    ) -> RunSummary {
        info!(
            source = source.name(),
            failure_policy = ?self.failure_policy,
            "Starting continuous run"
        );
        self.mark_healthy(components::INGESTION).await;

        let mut next_sequence: u64 = 0;
        let mut processed: u64 = 0;
        let mut skipped: u64 = 0;
        let mut last_sequence = None;

        let (stop_reason, error) = loop {
            let next = tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    info!("Continuous run received shutdown signal");
                    break (StopReason::Shutdown, None);
                }

                next = source.next_observation() => next,
            };

            let observation = match next {
                Ok(Some(observation)) => observation,
                Ok(None) => break (StopReason::Exhausted, None),
                Err(e) => {
                    let message = format!("{:#}", e);
                    if let Some(health) = &self.health {
                        health.set_unhealthy(components::INGESTION, message.clone()).await;
                    }
                    break (StopReason::Aborted, Some(message));
                }
            };

            let sequence_index = next_sequence;
            next_sequence += 1;

            match self.orchestrator.process(observation, sequence_index).await {
                Ok(record) => {
                    processed += 1;
                    last_sequence = Some(sequence_index);
                    for observer in &self.observers {
                        observer.on_decision(&record);
                    }
                }
                Err(e) => {
                    self.logger.log_inference_failure(sequence_index, &e);
                    match self.failure_policy {
                        FailurePolicy::Abort => {
                            if let Some(health) = &self.health {
                                health.set_unhealthy(components::PIPELINE, e.to_string()).await;
                            }
                            break (StopReason::Aborted, Some(e.to_string()));
                        }
                        FailurePolicy::Skip => {
                            skipped += 1;
                            self.metrics.inc_skipped();
                            if let Some(health) = &self.health {
                                health
                                    .set_degraded(
                                        components::PIPELINE,
                                        format!("{} observations skipped", skipped),
                                    )
                                    .await;
                            }
                        }
                    }
                }
            }
        };

        self.logger
            .log_run_complete(processed, skipped, last_sequence, stop_reason.as_str());

        RunSummary {
            processed,
            skipped,
            last_sequence,
            stop_reason,
            error,
        }
    }

    async fn mark_healthy(&self, component: &str) {
        if let Some(health) = &self.health {
            health.set_healthy(component).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::ComponentStatus;
    use crate::history::SharedHistory;
    use crate::ingestion::MemorySource;
    use crate::models::{Observation, ProductType};
    use crate::pipeline::OrchestratorConfig;
    use crate::policy::{PolicyConfig, PolicyEngine};
    use crate::predictor::{FeatureExtractor, ModelSet};
    use async_trait::async_trait;
    use std::time::Duration;

    fn orchestrator() -> Arc<Orchestrator> {
        Arc::new(
            Orchestrator::new(
                ModelSet::heuristic(253.0),
                PolicyEngine::new(PolicyConfig::default()).unwrap(),
                FeatureExtractor::new(),
                SharedHistory::new(100).unwrap(),
                OrchestratorConfig::default(),
            )
            .unwrap(),
        )
    }

    fn observation(tool_wear: f64) -> Observation {
        Observation {
            product_type: Some(ProductType::Medium),
            air_temperature_k: Some(300.0),
            process_temperature_k: Some(310.0),
            rotational_speed_rpm: Some(1540.0),
            torque_nm: Some(40.0),
            tool_wear_min: Some(tool_wear),
            ..Default::default()
        }
    }

    fn broken() -> Observation {
        Observation {
            torque_nm: Some(f64::NAN),
            ..observation(10.0)
        }
    }

    struct FailingSource;

    #[async_trait]
    impl ObservationSource for FailingSource {
        async fn next_observation(&mut self) -> anyhow::Result<Option<Observation>> {
            anyhow::bail!("stream closed unexpectedly")
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn sequences(orch: &Orchestrator) -> Vec<u64> {
        orch.history().all().iter().map(|r| r.sequence_index).collect()
    }

    #[tokio::test]
    async fn test_run_until_exhausted() {
        let orch = orchestrator();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let runner = RealtimeRunner::new(orch.clone(), StructuredLogger::new("test"))
            .observer(Arc::new(tx));
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let mut source = MemorySource::new((0..5).map(|i| observation(i as f64 * 10.0)).collect());
        let summary = runner.run(&mut source, shutdown_rx).await;

        assert_eq!(summary.stop_reason, StopReason::Exhausted);
        assert_eq!(summary.processed, 5);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.last_sequence, Some(4));
        assert!(summary.is_success());
        assert_eq!(sequences(&orch), vec![0, 1, 2, 3, 4]);

        let mut emitted = Vec::new();
        while let Ok(record) = rx.try_recv() {
            emitted.push(record.sequence_index);
        }
        assert_eq!(emitted, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_abort_stops_on_first_failure() {
        let orch = orchestrator();
        let health = HealthRegistry::for_engine().await;
        let runner = RealtimeRunner::new(orch.clone(), StructuredLogger::new("test"))
            .health(health.clone());
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let mut source = MemorySource::new(vec![observation(10.0), broken(), observation(30.0)]);
        let summary = runner.run(&mut source, shutdown_rx).await;

        assert_eq!(summary.stop_reason, StopReason::Aborted);
        assert_eq!(summary.processed, 1);
        assert!(summary.error.as_deref().unwrap().contains("torque_nm"));
        assert!(!summary.is_success());
        assert_eq!(sequences(&orch), vec![0]);

        let pipeline = health.component(components::PIPELINE).await.unwrap();
        assert_eq!(pipeline.status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_skip_consumes_sequence_index() {
        let orch = orchestrator();
        let health = HealthRegistry::for_engine().await;
        let runner = RealtimeRunner::new(orch.clone(), StructuredLogger::new("test"))
            .failure_policy(FailurePolicy::Skip)
            .health(health.clone());
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let mut source = MemorySource::new(vec![observation(10.0), broken(), observation(30.0)]);
        let summary = runner.run(&mut source, shutdown_rx).await;

        assert_eq!(summary.stop_reason, StopReason::Exhausted);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.last_sequence, Some(2));
        assert_eq!(sequences(&orch), vec![0, 2]);

        let pipeline = health.component(components::PIPELINE).await.unwrap();
        assert_eq!(pipeline.status, ComponentStatus::Degraded);
    }

    #[tokio::test]
    async fn test_source_error_is_fatal() {
        let orch = orchestrator();
        let health = HealthRegistry::for_engine().await;
        let runner = RealtimeRunner::new(orch, StructuredLogger::new("test"))
            .failure_policy(FailurePolicy::Skip)
            .health(health.clone());
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let summary = runner.run(&mut FailingSource, shutdown_rx).await;

        assert_eq!(summary.stop_reason, StopReason::Aborted);
        assert_eq!(summary.processed, 0);
        assert!(summary.error.unwrap().contains("stream closed"));
        let ingestion = health.component(components::INGESTION).await.unwrap();
        assert_eq!(ingestion.status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_shutdown_stops_endless_source() {
        let orch = orchestrator();
        let runner = RealtimeRunner::new(orch.clone(), StructuredLogger::new("test"));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(async move {
            let mut source = MemorySource::new(vec![observation(10.0), observation(20.0)]).looping();
            runner.run(&mut source, shutdown_rx).await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(()).unwrap();
        let summary = handle.await.unwrap();

        assert_eq!(summary.stop_reason, StopReason::Shutdown);
        assert!(summary.is_success());
        assert_eq!(summary.last_sequence, summary.processed.checked_sub(1));
    }

    #[tokio::test]
    async fn test_pending_shutdown_processes_nothing() {
        let orch = orchestrator();
        let runner = RealtimeRunner::new(orch.clone(), StructuredLogger::new("test"));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        shutdown_tx.send(()).unwrap();

        let mut source = MemorySource::new(vec![observation(10.0)]);
        let summary = runner.run(&mut source, shutdown_rx).await;

        assert_eq!(summary.stop_reason, StopReason::Shutdown);
        assert_eq!(summary.processed, 0);
        assert!(orch.history().is_empty());
    }

    #[test]
    fn test_failure_policy_parsing() {
        assert_eq!("abort".parse::<FailurePolicy>().unwrap(), FailurePolicy::Abort);
        assert_eq!(" Skip ".parse::<FailurePolicy>().unwrap(), FailurePolicy::Skip);
        assert!("retry".parse::<FailurePolicy>().is_err());
        assert_eq!(FailurePolicy::default(), FailurePolicy::Abort);
    }
}
