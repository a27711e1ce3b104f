//! Policy configuration
//!
//! Thresholds and cost parameters consumed by the policy engine. Loaded
//! from the service configuration or built in code.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};

/// Scalar parameters of the maintenance policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Failure probability above which a unit is at risk
    pub failure_probability_threshold: f64,
    /// Anomaly score at or above which the anomaly flag is set
    pub anomaly_score_threshold: f64,
    /// Fixed cost of one maintenance intervention
    pub maintenance_cost: f64,
    /// Cost of an unplanned failure
    pub failure_cost: f64,
    /// Lost production per hour of downtime
    pub downtime_cost_per_hour: f64,
    /// Minutes subtracted from remaining life when scheduling
    pub rul_safety_margin_min: f64,
    /// Cost of an anomaly investigation
    pub investigation_cost: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            failure_probability_threshold: 0.35,
            anomaly_score_threshold: 0.6,
            maintenance_cost: 500.0,
            failure_cost: 5000.0,
            downtime_cost_per_hour: 1000.0,
            rul_safety_margin_min: 20.0,
            investigation_cost: 100.0,
        }
    }
}

impl PolicyConfig {
    /// Reject parameters that would make a decision meaningless
    pub fn validate(&self) -> Result<(), EngineError> {
        let threshold = self.failure_probability_threshold;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(EngineError::config(format!(
                "failure_probability_threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        // Anomaly scores are unbounded, so only the threshold's finiteness matters
        if !self.anomaly_score_threshold.is_finite() {
            return Err(EngineError::config(format!(
                "anomaly_score_threshold must be a finite number, got {}",
                self.anomaly_score_threshold
            )));
        }

        for (name, value) in [
            ("maintenance_cost", self.maintenance_cost),
            ("failure_cost", self.failure_cost),
            ("downtime_cost_per_hour", self.downtime_cost_per_hour),
            ("rul_safety_margin_min", self.rul_safety_margin_min),
            ("investigation_cost", self.investigation_cost),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::config(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }
}
