//! Predictive model adapters
//!
//! Each model kind sits behind its own trait so the orchestrator only sees
//! typed scores. Backends: tract ONNX models, a physics-rule heuristic
//! fallback, and an unavailable placeholder that fails every call.

mod features;
mod heuristic;
mod inference;
mod loader;
pub mod output;

pub use features::{FeatureExtractor, DEFAULT_MAX_TOOL_WEAR_MIN, NUM_FEATURES};
pub use heuristic::HeuristicModels;
pub use inference::{OnnxModel, UnavailableModel};
pub use loader::{load_models, ModelConfig};

use crate::error::AdapterKind;
use crate::models::{FailureModeScore, FeatureView};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Unsupervised outlier score, higher = more anomalous
pub trait AnomalyModel: Send + Sync {
    fn anomaly_score(&self, features: &FeatureView) -> Result<f64>;
}

/// Binary fault classifier, probability of machine failure
pub trait FailureModel: Send + Sync {
    fn failure_probability(&self, features: &FeatureView) -> Result<f64>;
}

/// Multiclass fault classifier over [`crate::models::FailureMode`]
pub trait FailureModeModel: Send + Sync {
    fn classify(&self, features: &FeatureView) -> Result<FailureModeScore>;
}

/// Remaining-useful-life regressor, minutes
pub trait RemainingLifeModel: Send + Sync {
    fn remaining_life(&self, features: &FeatureView) -> Result<f64>;
}

/// Energy regressor
pub trait EnergyModel: Send + Sync {
    fn energy(&self, features: &FeatureView) -> Result<f64>;
}

/// Which implementation backs an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    Onnx,
    Heuristic,
    Unavailable,
    Custom,
}

impl ModelBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelBackend::Onnx => "onnx",
            ModelBackend::Heuristic => "heuristic",
            ModelBackend::Unavailable => "unavailable",
            ModelBackend::Custom => "custom",
        }
    }
}

/// Provenance of a loaded adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub kind: AdapterKind,
    pub backend: ModelBackend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl ModelInfo {
    pub fn new(kind: AdapterKind, backend: ModelBackend) -> Self {
        Self {
            kind,
            backend,
            path: None,
            checksum: None,
        }
    }
}

/// The five adapters one orchestrator scores with
#[derive(Clone)]
pub struct ModelSet {
    pub anomaly: Arc<dyn AnomalyModel>,
    pub failure: Arc<dyn FailureModel>,
    pub failure_mode: Arc<dyn FailureModeModel>,
    pub remaining_life: Arc<dyn RemainingLifeModel>,
    pub energy: Arc<dyn EnergyModel>,
    info: Vec<ModelInfo>,
}

impl ModelSet {
    /// Assemble a set from caller-provided adapters
    pub fn new(
        anomaly: Arc<dyn AnomalyModel>,
        failure: Arc<dyn FailureModel>,
        failure_mode: Arc<dyn FailureModeModel>,
        remaining_life: Arc<dyn RemainingLifeModel>,
        energy: Arc<dyn EnergyModel>,
    ) -> Self {
        Self {
            anomaly,
            failure,
            failure_mode,
            remaining_life,
            energy,
            info: AdapterKind::ALL
                .iter()
                .map(|kind| ModelInfo::new(*kind, ModelBackend::Custom))
                .collect(),
        }
    }

    /// All five adapters backed by the heuristic fallback
    pub fn heuristic(max_tool_wear_min: f64) -> Self {
        let models = Arc::new(HeuristicModels::new(max_tool_wear_min));
        let mut set = Self::new(
            models.clone(),
            models.clone(),
            models.clone(),
            models.clone(),
            models,
        );
        set.info = AdapterKind::ALL
            .iter()
            .map(|kind| ModelInfo::new(*kind, ModelBackend::Heuristic))
            .collect();
        set
    }

    pub(crate) fn with_info(mut self, info: Vec<ModelInfo>) -> Self {
        self.info = info;
        self
    }

    pub fn info(&self) -> &[ModelInfo] {
        &self.info
    }
}

impl std::fmt::Debug for ModelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSet").field("info", &self.info).finish()
    }
}
