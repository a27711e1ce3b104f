//! Physics-rule fallback models
//!
//! Used when no trained model file is available for an adapter. The rules
//! follow the failure conditions of the milling dataset: tool wear beyond
//! replacement age, too small a temperature gap at low speed, mechanical
//! power outside its operating window, and wear times torque above the
//! strain limit of the product class.

use super::{AnomalyModel, EnergyModel, FailureModeModel, FailureModel, RemainingLifeModel};
use crate::models::{FailureMode, FailureModeScore, FeatureView, ProductType};
use anyhow::Result;

/// Failure probability floor from random failures
const BASE_FAILURE_RATE: f64 = 0.005;

/// Mechanical power window (W)
const MIN_POWER_W: f64 = 3500.0;
const MAX_POWER_W: f64 = 9000.0;

/// (mean, standard deviation) of healthy readings
const NOMINAL_AIR_K: (f64, f64) = (300.0, 2.0);
const NOMINAL_PROCESS_K: (f64, f64) = (310.0, 1.5);
const NOMINAL_RPM: (f64, f64) = (1539.0, 179.0);
const NOMINAL_TORQUE_NM: (f64, f64) = (40.0, 10.0);
const NOMINAL_WEAR_MIN: (f64, f64) = (108.0, 64.0);

/// Anomaly score of a perfectly nominal reading
const ANOMALY_BASELINE: f64 = 0.3;
const ANOMALY_PER_SIGMA: f64 = 0.1;

/// Energy proportionality constant (rpm * Nm)
const ENERGY_FACTOR: f64 = 1e-4;

/// Per-mode risk contributions for one feature view
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ModeRisks {
    twf: f64,
    hdf: f64,
    pwf: f64,
    osf: f64,
}

impl ModeRisks {
    fn combined(&self) -> f64 {
        let survival = [self.twf, self.hdf, self.pwf, self.osf, BASE_FAILURE_RATE]
            .iter()
            .fold(1.0, |acc, r| acc * (1.0 - r));
        (1.0 - survival).clamp(0.0, 1.0)
    }

    fn sum(&self) -> f64 {
        self.twf + self.hdf + self.pwf + self.osf
    }
}

/// Heuristic implementation of all five adapters
#[derive(Debug, Clone)]
pub struct HeuristicModels {
    max_tool_wear_min: f64,
}

impl HeuristicModels {
    pub fn new(max_tool_wear_min: f64) -> Self {
        Self { max_tool_wear_min }
    }

    fn risks(&self, f: &FeatureView) -> ModeRisks {
        let twf = if f.tool_wear_min >= 240.0 {
            0.9
        } else if f.tool_wear_min >= 200.0 {
            0.6
        } else if f.tool_wear_min >= 180.0 {
            0.15
        } else {
            0.0
        };

        let hdf = if f.temp_diff_k < 8.6 && f.rotational_speed_rpm < 1380.0 {
            0.85
        } else if f.temp_diff_k < 9.6 && f.rotational_speed_rpm < 1480.0 {
            0.3
        } else {
            0.0
        };

        let power_w = f.torque_nm * f.rotational_speed_rpm * std::f64::consts::TAU / 60.0;
        let pwf = if !(MIN_POWER_W..=MAX_POWER_W).contains(&power_w) {
            0.85
        } else if power_w < MIN_POWER_W * 1.1 || power_w > MAX_POWER_W * 0.9 {
            0.25
        } else {
            0.0
        };

        let strain_limit = match f.product_type {
            Some(ProductType::High) => 13000.0,
            Some(ProductType::Medium) => 12000.0,
            Some(ProductType::Low) | None => 11000.0,
        };
        let strain = f.tool_wear_min * f.torque_nm / strain_limit;
        let osf = if strain >= 1.0 {
            0.85
        } else if strain >= 0.9 {
            0.3
        } else {
            0.0
        };

        ModeRisks { twf, hdf, pwf, osf }
    }
}

impl Default for HeuristicModels {
    fn default() -> Self {
        Self::new(super::DEFAULT_MAX_TOOL_WEAR_MIN)
    }
}

fn z_score(value: f64, (mean, std): (f64, f64)) -> f64 {
    (value - mean) / std
}

impl AnomalyModel for HeuristicModels {
    fn anomaly_score(&self, f: &FeatureView) -> Result<f64> {
        let z = [
            z_score(f.air_temperature_k, NOMINAL_AIR_K),
            z_score(f.process_temperature_k, NOMINAL_PROCESS_K),
            z_score(f.rotational_speed_rpm, NOMINAL_RPM),
            z_score(f.torque_nm, NOMINAL_TORQUE_NM),
            z_score(f.tool_wear_min, NOMINAL_WEAR_MIN),
        ];
        let rms = (z.iter().map(|v| v * v).sum::<f64>() / z.len() as f64).sqrt();
        Ok(ANOMALY_BASELINE + ANOMALY_PER_SIGMA * rms)
    }
}

impl FailureModel for HeuristicModels {
    fn failure_probability(&self, f: &FeatureView) -> Result<f64> {
        Ok(self.risks(f).combined())
    }
}

impl FailureModeModel for HeuristicModels {
    fn classify(&self, f: &FeatureView) -> Result<FailureModeScore> {
        let risks = self.risks(f);
        let p = risks.combined();
        let total = risks.sum();

        let share = |r: f64| if total > 0.0 { r / total * p } else { 0.0 };
        let normal = if total > 0.0 { 1.0 - p } else { 1.0 };

        let probabilities: Vec<(FailureMode, f64)> = FailureMode::CLASS_ORDER
            .iter()
            .map(|mode| {
                let prob = match mode {
                    FailureMode::Hdf => share(risks.hdf),
                    FailureMode::Normal => normal,
                    FailureMode::Osf => share(risks.osf),
                    FailureMode::Pwf => share(risks.pwf),
                    FailureMode::Rnf => 0.0,
                    FailureMode::Twf => share(risks.twf),
                };
                (*mode, prob)
            })
            .collect();

        let label = probabilities
            .iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(mode, _)| *mode)
            .unwrap_or(FailureMode::Normal);

        Ok(FailureModeScore {
            label,
            probabilities,
        })
    }
}

impl RemainingLifeModel for HeuristicModels {
    fn remaining_life(&self, f: &FeatureView) -> Result<f64> {
        Ok(self.max_tool_wear_min - f.tool_wear_min)
    }
}

impl EnergyModel for HeuristicModels {
    fn energy(&self, f: &FeatureView) -> Result<f64> {
        Ok((ENERGY_FACTOR * f.rotational_speed_rpm * f.torque_nm).max(0.0))
    }
}
