//! Model output interpretation and validation
//!
//! Converts raw model output vectors into typed scores and rejects results a
//! healthy model cannot produce (non-finite values, probabilities outside
//! [0, 1], negative energy).

use crate::models::{FailureMode, FailureModeScore};
use anyhow::{bail, Result};

/// Slack allowed when a probability vector does not sum exactly to 1
const PROBABILITY_SUM_TOLERANCE: f64 = 1e-3;

/// First value of a regression or score output
pub fn first_value(raw: &[f32]) -> Result<f64> {
    match raw.first() {
        Some(v) => Ok(*v as f64),
        None => bail!("model produced an empty output"),
    }
}

/// Positive-class probability from a binary classifier output
///
/// Two values are read as `[p(no failure), p(failure)]`; a single value is
/// taken as the failure probability itself.
pub fn positive_class_probability(raw: &[f32]) -> Result<f64> {
    match raw.len() {
        0 => bail!("model produced an empty output"),
        1 => Ok(raw[0] as f64),
        2 => Ok(raw[1] as f64),
        n => bail!("binary classifier produced {} values, expected 1 or 2", n),
    }
}

/// Failure-mode label and probability vector from a multiclass output
pub fn failure_mode_from_probabilities(raw: &[f32]) -> Result<FailureModeScore> {
    if raw.len() != FailureMode::CLASS_ORDER.len() {
        bail!(
            "multiclass output has {} values, expected {}",
            raw.len(),
            FailureMode::CLASS_ORDER.len()
        );
    }

    let probabilities: Vec<(FailureMode, f64)> = FailureMode::CLASS_ORDER
        .iter()
        .zip(raw.iter())
        .map(|(mode, p)| (*mode, *p as f64))
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

pub fn validate_anomaly_score(score: f64) -> Result<f64> {
    if !score.is_finite() {
        bail!("anomaly score is not finite ({})", score);
    }
    Ok(score)
}

pub fn validate_probability(probability: f64) -> Result<f64> {
    if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
        bail!("failure probability {} is outside [0, 1]", probability);
    }
    Ok(probability)
}

pub fn validate_failure_mode(score: FailureModeScore) -> Result<FailureModeScore> {
    if score.probabilities.is_empty() {
        bail!("failure-mode probability vector is empty");
    }
    if score.probabilities.len() != FailureMode::CLASS_ORDER.len() {
        bail!(
            "failure-mode probability vector has {} entries, expected {}",
            score.probabilities.len(),
            FailureMode::CLASS_ORDER.len()
        );
    }
    for (idx, (mode, _)) in score.probabilities.iter().enumerate() {
        if score.probabilities[..idx].iter().any(|(seen, _)| seen == mode) {
            bail!("failure mode {} appears more than once", mode);
        }
    }
    for (mode, p) in &score.probabilities {
        if !p.is_finite() || !(0.0..=1.0).contains(p) {
            bail!("probability {} for {} is outside [0, 1]", p, mode);
        }
    }
    let sum: f64 = score.probabilities.iter().map(|(_, p)| p).sum();
    if (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
        bail!("failure-mode probabilities sum to {:.4}, expected 1", sum);
    }
    if !score.probabilities.iter().any(|(mode, _)| *mode == score.label) {
        bail!("predicted label {} is missing from the probability vector", score.label);
    }
    Ok(score)
}

pub fn validate_remaining_life(minutes: f64) -> Result<f64> {
    if !minutes.is_finite() {
        bail!("remaining-life estimate is not finite ({})", minutes);
    }
    Ok(minutes)
}

pub fn validate_energy(energy: f64) -> Result<f64> {
    if !energy.is_finite() || energy < 0.0 {
        bail!("energy estimate {} is not a non-negative number", energy);
    }
    Ok(energy)
}
