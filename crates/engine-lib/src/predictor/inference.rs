//! ONNX inference using tract
//!
//! Each trained model file is loaded into its own [`OnnxModel`] and served
//! through the adapter trait of its [`AdapterKind`].

use super::output;
use super::{AnomalyModel, EnergyModel, FailureModeModel, FailureModel, RemainingLifeModel};
use super::NUM_FEATURES;
use crate::error::AdapterKind;
use crate::models::{FailureModeScore, FeatureView};
use crate::observability::EngineMetrics;
use anyhow::{anyhow, bail, Context, Result};
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Inference latency above which a warning is logged
const MAX_INFERENCE_MS: u128 = 50;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// One optimized ONNX model bound to an adapter kind
pub struct OnnxModel {
    kind: AdapterKind,
    model: TractModel,
    metrics: EngineMetrics,
}

impl OnnxModel {
    /// Parse and optimize a model from bytes
    pub fn from_bytes(kind: AdapterKind, model_bytes: &[u8]) -> Result<Self> {
        let model = Self::load_model(model_bytes)
            .with_context(|| format!("Failed to load {} model", kind))?;
        Ok(Self {
            kind,
            model,
            metrics: EngineMetrics::new(),
        })
    }

    fn load_model(model_bytes: &[u8]) -> Result<TractModel> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?
            .with_input_fact(0, f32::fact([1, NUM_FEATURES]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;
        Ok(model)
    }

    /// Run the model and return its first f32 output, flattened
    ///
    /// Classifier exports usually emit an integer label tensor ahead of the
    /// probability tensor, so non-f32 outputs are skipped.
    fn run(&self, features: &FeatureView) -> Result<Vec<f32>> {
        let start = Instant::now();

        let row = features.to_input();
        let input = Tensor::from_shape::<f32>(&[1, NUM_FEATURES], &row[..])?;
        let result = self.model.run(tvec!(input.into()))?;
        let output = result
            .iter()
            .find(|t| t.datum_type() == f32::datum_type())
            .ok_or_else(|| anyhow!("{} model produced no f32 output", self.kind))?;
        let values: Vec<f32> = output.to_array_view::<f32>()?.iter().copied().collect();

        let elapsed = start.elapsed();
        let slow = elapsed.as_millis() > MAX_INFERENCE_MS;
        self.metrics.record_model_inference(self.kind, slow);

        if slow {
            warn!(
                adapter = %self.kind,
                elapsed_ms = elapsed.as_millis(),
                "Inference exceeded {}ms target",
                MAX_INFERENCE_MS
            );
        } else {
            debug!(adapter = %self.kind, elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        Ok(values)
    }

    fn expect_kind(&self, wanted: AdapterKind) -> Result<()> {
        if self.kind != wanted {
            bail!("{} model cannot serve {} requests", self.kind, wanted);
        }
        Ok(())
    }
}

impl AnomalyModel for OnnxModel {
    fn anomaly_score(&self, features: &FeatureView) -> Result<f64> {
        self.expect_kind(AdapterKind::Anomaly)?;
        output::first_value(&self.run(features)?)
    }
}

impl FailureModel for OnnxModel {
    fn failure_probability(&self, features: &FeatureView) -> Result<f64> {
        self.expect_kind(AdapterKind::FailureProbability)?;
        output::positive_class_probability(&self.run(features)?)
    }
}

impl FailureModeModel for OnnxModel {
    fn classify(&self, features: &FeatureView) -> Result<FailureModeScore> {
        self.expect_kind(AdapterKind::FailureMode)?;
        output::failure_mode_from_probabilities(&self.run(features)?)
    }
}

impl RemainingLifeModel for OnnxModel {
    fn remaining_life(&self, features: &FeatureView) -> Result<f64> {
        self.expect_kind(AdapterKind::RemainingLife)?;
        output::first_value(&self.run(features)?)
    }
}

impl EnergyModel for OnnxModel {
    fn energy(&self, features: &FeatureView) -> Result<f64> {
        self.expect_kind(AdapterKind::Energy)?;
        output::first_value(&self.run(features)?)
    }
}

/// Placeholder for an adapter whose model could not be loaded
///
/// Every call fails, so the orchestrator reports a `ModelInference` error
/// for the observation instead of scoring with a missing model.
#[derive(Debug, Clone)]
pub struct UnavailableModel {
    kind: AdapterKind,
    reason: String,
}

impl UnavailableModel {
    pub fn new(kind: AdapterKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    fn fail<T>(&self) -> Result<T> {
        bail!("{} model not loaded: {}", self.kind, self.reason)
    }
}

impl AnomalyModel for UnavailableModel {
    fn anomaly_score(&self, _: &FeatureView) -> Result<f64> {
        self.fail()
    }
}

impl FailureModel for UnavailableModel {
    fn failure_probability(&self, _: &FeatureView) -> Result<f64> {
        self.fail()
    }
}

impl FailureModeModel for UnavailableModel {
    fn classify(&self, _: &FeatureView) -> Result<FailureModeScore> {
        self.fail()
    }
}

impl RemainingLifeModel for UnavailableModel {
    fn remaining_life(&self, _: &FeatureView) -> Result<f64> {
        self.fail()
    }
}

impl EnergyModel for UnavailableModel {
    fn energy(&self, _: &FeatureView) -> Result<f64> {
        self.fail()
    }
}
