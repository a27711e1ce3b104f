//! Realtime orchestrator
//!
//! Sequences one observation through feature building, the five model
//! adapters, the policy engine and the history buffer. Either all five
//! scores and a decision are recorded, or nothing is.

use crate::error::{AdapterKind, EngineError};
use crate::history::SharedHistory;
use crate::models::{DecisionRecord, FeatureView, ModelScores, Observation};
use crate::observability::EngineMetrics;
use crate::policy::{PolicyEngine, PolicyInput};
use crate::predictor::{output, FeatureExtractor, ModelSet};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default per-adapter inference timeout
pub const DEFAULT_INFERENCE_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on a single adapter call
    pub inference_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            inference_timeout: DEFAULT_INFERENCE_TIMEOUT,
        }
    }
}

pub struct Orchestrator {
    models: ModelSet,
    policy: PolicyEngine,
    features: FeatureExtractor,
    history: SharedHistory,
    config: OrchestratorConfig,
    metrics: EngineMetrics,
}

impl Orchestrator {
    pub fn new(
        models: ModelSet,
        policy: PolicyEngine,
        features: FeatureExtractor,
        history: SharedHistory,
        config: OrchestratorConfig,
    ) -> Result<Self, EngineError> {
        if config.inference_timeout.is_zero() {
            return Err(EngineError::config("inference timeout must be greater than zero"));
        }
        Ok(Self {
            models,
            policy,
            features,
            history,
            config,
            metrics: EngineMetrics::new(),
        })
    }

    pub fn history(&self) -> &SharedHistory {
        &self.history
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    pub fn models(&self) -> &ModelSet {
        &self.models
    }

    /// Score, decide and record one observation
    ///
    /// `sequence_index` is recorded as given; repeated or out-of-order
    /// indices are accepted.
    pub async fn process(
        &self,
        observation: Observation,
        sequence_index: u64,
    ) -> Result<DecisionRecord, EngineError> {
        let view = self.features.build(&observation)?;
        if !view.is_complete() {
            debug!(
                sequence = sequence_index,
                defaulted = ?view.defaulted,
                "Missing attributes defaulted to 0"
            );
        }

        let start = Instant::now();
        let scores = match self.score(Arc::new(view)).await {
            Ok(scores) => scores,
            Err(e) => {
                self.metrics.record_failure(&e);
                return Err(e);
            }
        };
        let elapsed = start.elapsed();
        self.metrics.observe_inference_latency(elapsed.as_secs_f64());

        let decision = self.policy.decide(&PolicyInput::from(&scores), Utc::now());
        let record = DecisionRecord {
            sequence_index,
            observation,
            scores,
            priority: PolicyEngine::priority_rank(&decision),
            decision,
            processed_at: Utc::now(),
            inference_us: elapsed.as_micros() as u64,
        };

        self.history.append(record.clone());
        self.metrics.record_decision(&record, self.history.len());
        Ok(record)
    }

    /// Run all five adapters concurrently and validate their outputs
    pub async fn score(&self, view: Arc<FeatureView>) -> Result<ModelScores, EngineError> {
        let anomaly = self.models.anomaly.clone();
        let failure = self.models.failure.clone();
        let failure_mode = self.models.failure_mode.clone();
        let remaining_life = self.models.remaining_life.clone();
        let energy = self.models.energy.clone();

        let (anomaly_score, failure_probability, mode, remaining_life_min, energy_estimate) = tokio::try_join!(
            self.invoke(AdapterKind::Anomaly, view.clone(), move |v| {
                output::validate_anomaly_score(anomaly.anomaly_score(v)?)
            }),
            self.invoke(AdapterKind::FailureProbability, view.clone(), move |v| {
                output::validate_probability(failure.failure_probability(v)?)
            }),
            self.invoke(AdapterKind::FailureMode, view.clone(), move |v| {
                output::validate_failure_mode(failure_mode.classify(v)?)
            }),
            self.invoke(AdapterKind::RemainingLife, view.clone(), move |v| {
                output::validate_remaining_life(remaining_life.remaining_life(v)?)
            }),
            self.invoke(AdapterKind::Energy, view, move |v| {
                output::validate_energy(energy.energy(v)?)
            }),
        )?;

        Ok(ModelScores {
            anomaly_score,
            anomaly_flag: self.policy.is_anomalous(anomaly_score),
            failure_probability,
            failure_flag: self.policy.is_failure(failure_probability),
            failure_mode: mode.label,
            failure_mode_confidence: mode.confidence(),
            failure_mode_probabilities: mode.probabilities,
            remaining_life_min,
            energy_estimate,
        })
    }

    /// One adapter call on the blocking pool, bounded by the inference timeout
    ///
    /// A timed-out call keeps running on its blocking thread; its result is
    /// discarded.
    async fn invoke<T, F>(
        &self,
        adapter: AdapterKind,
        view: Arc<FeatureView>,
        call: F,
    ) -> Result<T, EngineError>
    where
        T: Send + 'static,
        F: FnOnce(&FeatureView) -> anyhow::Result<T> + Send + 'static,
    {
        let task = tokio::task::spawn_blocking(move || call(&view));

        match tokio::time::timeout(self.config.inference_timeout, task).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(e))) => Err(EngineError::inference(adapter, format!("{:#}", e))),
            Ok(Err(join_err)) if join_err.is_panic() => {
                Err(EngineError::inference(adapter, "adapter panicked"))
            }
            Ok(Err(join_err)) => Err(EngineError::inference(adapter, join_err)),
            Err(_) => Err(EngineError::inference(
                adapter,
                format!(
                    "timed out after {}ms",
                    self.config.inference_timeout.as_millis()
                ),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FailureModeScore, MaintenanceAction, ProductType};
    use crate::policy::PolicyConfig;
    use crate::predictor::{AnomalyModel, EnergyModel, HeuristicModels, RemainingLifeModel};

    struct FailingRul;

    impl RemainingLifeModel for FailingRul {
        fn remaining_life(&self, _: &FeatureView) -> anyhow::Result<f64> {
            anyhow::bail!("rul model not loaded")
        }
    }

    struct SlowAnomaly;

    impl AnomalyModel for SlowAnomaly {
        fn anomaly_score(&self, _: &FeatureView) -> anyhow::Result<f64> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(0.1)
        }
    }

    struct NegativeEnergy;

    impl EnergyModel for NegativeEnergy {
        fn energy(&self, _: &FeatureView) -> anyhow::Result<f64> {
            Ok(-4.0)
        }
    }

    struct PanickingAnomaly;

    impl AnomalyModel for PanickingAnomaly {
        fn anomaly_score(&self, _: &FeatureView) -> anyhow::Result<f64> {
            panic!("corrupt weights")
        }
    }

    struct FixedMode(FailureModeScore);

    impl crate::predictor::FailureModeModel for FixedMode {
        fn classify(&self, _: &FeatureView) -> anyhow::Result<FailureModeScore> {
            Ok(self.0.clone())
        }
    }

    fn heuristic() -> Arc<HeuristicModels> {
        Arc::new(HeuristicModels::default())
    }

    fn orchestrator_with(models: ModelSet, capacity: usize) -> Orchestrator {
        Orchestrator::new(
            models,
            PolicyEngine::new(PolicyConfig::default()).unwrap(),
            FeatureExtractor::new(),
            SharedHistory::new(capacity).unwrap(),
            OrchestratorConfig {
                inference_timeout: Duration::from_millis(100),
            },
        )
        .unwrap()
    }

    fn orchestrator(capacity: usize) -> Orchestrator {
        orchestrator_with(ModelSet::heuristic(253.0), capacity)
    }

    fn observation(tool_wear: f64) -> Observation {
        Observation {
            product_type: Some(ProductType::Low),
            air_temperature_k: Some(300.0),
            process_temperature_k: Some(310.0),
            rotational_speed_rpm: Some(1540.0),
            torque_nm: Some(40.0),
            tool_wear_min: Some(tool_wear),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_process_appends_record() {
        let orch = orchestrator(10);
        let record = orch.process(observation(20.0), 0).await.unwrap();

        assert_eq!(record.sequence_index, 0);
        assert_eq!(record.decision.action, MaintenanceAction::Normal);
        assert_eq!(record.priority, 6);
        assert!(!record.scores.failure_flag);
        assert!((record.scores.remaining_life_min - 233.0).abs() < 1e-9);
        assert_eq!(orch.history().len(), 1);
        assert_eq!(orch.history().all()[0], record);
    }

    #[tokio::test]
    async fn test_worn_tool_is_critical() {
        let orch = orchestrator(10);
        let record = orch.process(observation(250.0), 3).await.unwrap();

        assert_eq!(record.decision.action, MaintenanceAction::CriticalImmediate);
        assert!(record.is_critical());
        assert!(record.scores.failure_flag);
        assert_eq!(orch.history().critical().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_fields_still_processed() {
        let orch = orchestrator(10);
        let partial = Observation {
            product_type: Some(ProductType::Medium),
            torque_nm: Some(40.0),
            ..Default::default()
        };
        tokio_test::assert_ok!(orch.process(partial, 0).await);
        assert_eq!(orch.history().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_adapter_commits_nothing() {
        let h = heuristic();
        let models = ModelSet::new(h.clone(), h.clone(), h.clone(), Arc::new(FailingRul), h);
        let orch = orchestrator_with(models, 10);

        let err = orch.process(observation(20.0), 0).await.unwrap_err();
        assert_eq!(err.adapter(), Some(AdapterKind::RemainingLife));
        assert!(err.to_string().contains("not loaded"));
        assert!(orch.history().is_empty());
    }

    #[tokio::test]
    async fn test_slow_adapter_times_out() {
        let h = heuristic();
        let models = ModelSet::new(Arc::new(SlowAnomaly), h.clone(), h.clone(), h.clone(), h);
        let orch = orchestrator_with(models, 10);

        let err = orch.process(observation(20.0), 0).await.unwrap_err();
        assert_eq!(err.adapter(), Some(AdapterKind::Anomaly));
        assert!(err.to_string().contains("timed out"));
        assert!(orch.history().is_empty());
    }

    #[tokio::test]
    async fn test_panicking_adapter_is_inference_error() {
        let h = heuristic();
        let models = ModelSet::new(Arc::new(PanickingAnomaly), h.clone(), h.clone(), h.clone(), h);
        let orch = orchestrator_with(models, 10);

        let err = orch.process(observation(20.0), 0).await.unwrap_err();
        assert_eq!(err.adapter(), Some(AdapterKind::Anomaly));
        assert!(err.to_string().contains("panicked"));
    }

    #[tokio::test]
    async fn test_malformed_output_rejected() {
        let h = heuristic();
        let models = ModelSet::new(h.clone(), h.clone(), h.clone(), h, Arc::new(NegativeEnergy));
        let orch = orchestrator_with(models, 10);

        let err = orch.process(observation(20.0), 0).await.unwrap_err();
        assert_eq!(err.adapter(), Some(AdapterKind::Energy));
        assert!(orch.history().is_empty());
    }

    #[tokio::test]
    async fn test_empty_mode_vector_rejected() {
        let h = heuristic();
        let mode = FixedMode(FailureModeScore {
            label: crate::models::FailureMode::Normal,
            probabilities: Vec::new(),
        });
        let models = ModelSet::new(h.clone(), h.clone(), Arc::new(mode), h.clone(), h);
        let orch = orchestrator_with(models, 10);

        let err = orch.process(observation(20.0), 0).await.unwrap_err();
        assert_eq!(err.adapter(), Some(AdapterKind::FailureMode));
    }

    #[tokio::test]
    async fn test_short_mode_vector_rejected() {
        let h = heuristic();
        let mode = FixedMode(FailureModeScore {
            label: crate::models::FailureMode::Normal,
            probabilities: vec![(crate::models::FailureMode::Normal, 1.0)],
        });
        let models = ModelSet::new(h.clone(), h.clone(), Arc::new(mode), h.clone(), h);
        let orch = orchestrator_with(models, 10);

        let err = orch.process(observation(20.0), 0).await.unwrap_err();
        assert_eq!(err.adapter(), Some(AdapterKind::FailureMode));
        assert!(orch.history().is_empty());
    }

    #[tokio::test]
    async fn test_feature_error_propagated() {
        let orch = orchestrator(10);
        let mut bad = observation(20.0);
        bad.torque_nm = Some(f64::INFINITY);

        let err = orch.process(bad, 0).await.unwrap_err();
        assert!(matches!(err, EngineError::FeatureBuild { field: "torque_nm", .. }));
        assert!(orch.history().is_empty());
    }

    #[tokio::test]
    async fn test_sequence_indices_recorded_as_given() {
        let orch = orchestrator(10);
        for seq in [5, 2, 2, 9] {
            orch.process(observation(20.0), seq).await.unwrap();
        }
        let seqs: Vec<u64> = orch.history().all().iter().map(|r| r.sequence_index).collect();
        assert_eq!(seqs, vec![5, 2, 2, 9]);
    }

    #[tokio::test]
    async fn test_history_bounded_fifo() {
        let orch = orchestrator(3);
        for seq in 0..4 {
            orch.process(observation(20.0), seq).await.unwrap();
        }
        let seqs: Vec<u64> = orch.history().all().iter().map(|r| r.sequence_index).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers() {
        let orch = Arc::new(orchestrator(1000));
        let mut handles = Vec::new();
        for worker in 0..8u64 {
            let orch = orch.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..10u64 {
                    orch.process(observation(20.0), worker * 100 + i).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(orch.history().len(), 80);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = Orchestrator::new(
            ModelSet::heuristic(253.0),
            PolicyEngine::new(PolicyConfig::default()).unwrap(),
            FeatureExtractor::new(),
            SharedHistory::new(10).unwrap(),
            OrchestratorConfig {
                inference_timeout: Duration::ZERO,
            },
        );
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }
}
