//! Error taxonomy of the decision engine

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The five predictive model adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    Anomaly,
    FailureProbability,
    FailureMode,
    RemainingLife,
    Energy,
}

impl AdapterKind {
    pub const ALL: [AdapterKind; 5] = [
        AdapterKind::Anomaly,
        AdapterKind::FailureProbability,
        AdapterKind::FailureMode,
        AdapterKind::RemainingLife,
        AdapterKind::Energy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterKind::Anomaly => "anomaly",
            AdapterKind::FailureProbability => "failure_probability",
            AdapterKind::FailureMode => "failure_mode",
            AdapterKind::RemainingLife => "remaining_life",
            AdapterKind::Energy => "energy",
        }
    }

    /// Model file expected in the model directory
    pub fn file_name(&self) -> &'static str {
        match self {
            AdapterKind::Anomaly => "anomaly.onnx",
            AdapterKind::FailureProbability => "failure.onnx",
            AdapterKind::FailureMode => "failure_mode.onnx",
            AdapterKind::RemainingLife => "rul.onnx",
            AdapterKind::Energy => "energy.onnx",
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the engine core
///
/// None of these are retried internally; the host decides whether a failed
/// observation is skipped or fatal.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An adapter failed, timed out or returned a malformed result
    #[error("{adapter} model inference failed: {reason}")]
    ModelInference { adapter: AdapterKind, reason: String },

    /// Missing or invalid threshold/cost parameter
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Observation field that cannot be defaulted safely
    #[error("cannot build feature view: field `{field}` {reason}")]
    FeatureBuild { field: &'static str, reason: String },
}

impl EngineError {
    pub fn inference(adapter: AdapterKind, err: impl fmt::Display) -> Self {
        EngineError::ModelInference {
            adapter,
            reason: err.to_string(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        EngineError::Configuration(message.into())
    }

    /// Adapter that failed, if this is an inference error
    pub fn adapter(&self) -> Option<AdapterKind> {
        match self {
            EngineError::ModelInference { adapter, .. } => Some(*adapter),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_error_names_adapter() {
        let err = EngineError::inference(AdapterKind::RemainingLife, "model not loaded");
        assert_eq!(err.adapter(), Some(AdapterKind::RemainingLife));
        assert_eq!(
            err.to_string(),
            "remaining_life model inference failed: model not loaded"
        );
    }

    #[test]
    fn test_feature_error_message() {
        let err = EngineError::FeatureBuild {
            field: "torque_nm",
            reason: "is not finite".to_string(),
        };
        assert!(err.to_string().contains("torque_nm"));
        assert!(err.adapter().is_none());
    }
}
