//! Feature view construction for model scoring
//!
//! Projects an observation onto the attributes the models were trained on:
//! raw sensor values plus the engineered temperature difference, power proxy
//! and normalised tool wear. Label columns never make it into the view.

use crate::error::EngineError;
use crate::models::{FeatureView, Observation, ProductType};

/// Number of model input features
pub const NUM_FEATURES: usize = 10;

/// Largest tool wear seen in the training data (minutes)
pub const DEFAULT_MAX_TOOL_WEAR_MIN: f64 = 253.0;

/// Builds feature views from observations
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    max_tool_wear_min: f64,
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self {
            max_tool_wear_min: DEFAULT_MAX_TOOL_WEAR_MIN,
        }
    }

    pub fn with_max_tool_wear(max_tool_wear_min: f64) -> Result<Self, EngineError> {
        if !max_tool_wear_min.is_finite() || max_tool_wear_min <= 0.0 {
            return Err(EngineError::config(format!(
                "max_tool_wear_min must be a positive number, got {}",
                max_tool_wear_min
            )));
        }
        Ok(Self { max_tool_wear_min })
    }

    pub fn max_tool_wear_min(&self) -> f64 {
        self.max_tool_wear_min
    }

    /// Build the scoring view for one observation
    ///
    /// Missing attributes default to 0 so warm-up rows still score. A value
    /// that is present but not finite, or a negative physical quantity, cannot
    /// be defaulted and fails with [`EngineError::FeatureBuild`].
    pub fn build(&self, observation: &Observation) -> Result<FeatureView, EngineError> {
        let mut defaulted = Vec::new();

        let air = attribute("air_temperature_k", observation.air_temperature_k, &mut defaulted)?;
        let process = attribute(
            "process_temperature_k",
            observation.process_temperature_k,
            &mut defaulted,
        )?;
        let rpm = attribute(
            "rotational_speed_rpm",
            observation.rotational_speed_rpm,
            &mut defaulted,
        )?;
        let torque = attribute("torque_nm", observation.torque_nm, &mut defaulted)?;
        let tool_wear = attribute("tool_wear_min", observation.tool_wear_min, &mut defaulted)?;

        if observation.product_type.is_none() {
            defaulted.push("product_type".to_string());
        }

        Ok(FeatureView {
            product_type: observation.product_type,
            air_temperature_k: air,
            process_temperature_k: process,
            rotational_speed_rpm: rpm,
            torque_nm: torque,
            tool_wear_min: tool_wear,
            temp_diff_k: process - air,
            power_proxy: rpm * torque,
            tool_wear_norm: tool_wear / self.max_tool_wear_min,
            defaulted,
        })
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn attribute(
    field: &'static str,
    value: Option<f64>,
    defaulted: &mut Vec<String>,
) -> Result<f64, EngineError> {
    match value {
        None => {
            defaulted.push(field.to_string());
            Ok(0.0)
        }
        Some(v) if !v.is_finite() => Err(EngineError::FeatureBuild {
            field,
            reason: format!("is not finite ({})", v),
        }),
        Some(v) if v < 0.0 => Err(EngineError::FeatureBuild {
            field,
            reason: format!("cannot be negative ({})", v),
        }),
        Some(v) => Ok(v),
    }
}

impl FeatureView {
    /// Model input row in training column order
    ///
    /// Product type is one-hot encoded with `H` as the dropped baseline, so a
    /// missing type encodes as all zeros.
    pub fn to_input(&self) -> [f32; NUM_FEATURES] {
        let (type_l, type_m) = match self.product_type {
            Some(ProductType::Low) => (1.0, 0.0),
            Some(ProductType::Medium) => (0.0, 1.0),
            Some(ProductType::High) | None => (0.0, 0.0),
        };
        [
            type_l,
            type_m,
            self.air_temperature_k as f32,
            self.process_temperature_k as f32,
            self.rotational_speed_rpm as f32,
            self.torque_nm as f32,
            self.tool_wear_min as f32,
            self.temp_diff_k as f32,
            self.power_proxy as f32,
            self.tool_wear_norm as f32,
        ]
    }

    pub fn is_complete(&self) -> bool {
        self.defaulted.is_empty()
    }
}
