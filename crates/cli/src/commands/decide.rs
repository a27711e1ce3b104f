//! Offline policy evaluation

use anyhow::{Context, Result};
use chrono::Utc;
use engine_lib::{
    policy::{format_decision_summary, PolicyConfig, PolicyEngine, PolicyInput},
    FailureMode,
};
use serde::Serialize;

use crate::output::{print_json, OutputFormat};

/// Inputs for a one-off policy evaluation
#[derive(Debug, Clone)]
pub struct DecideArgs {
    pub failure_probability: f64,
    pub remaining_life_min: f64,
    pub failure_mode: Option<String>,
    pub anomaly_score: f64,
    pub anomaly_flag: bool,
}

#[derive(Serialize)]
struct DecideOutput<'a> {
    #[serde(flatten)]
    decision: &'a engine_lib::MaintenanceDecision,
    priority: u8,
}

/// Evaluate the maintenance policy with default configuration
pub fn decide(args: DecideArgs, format: OutputFormat) -> Result<()> {
    if !(0.0..=1.0).contains(&args.failure_probability) {
        anyhow::bail!("--probability must be within [0, 1]");
    }
    if !args.remaining_life_min.is_finite() {
        anyhow::bail!("--rul must be a finite number of minutes");
    }

    let engine = PolicyEngine::new(PolicyConfig::default())?;

    let failure_mode = match &args.failure_mode {
        Some(mode) => mode
            .parse::<FailureMode>()
            .map_err(anyhow::Error::msg)
            .context("Invalid --mode")?,
        None => FailureMode::Normal,
    };

    let input = PolicyInput {
        failure_probability: args.failure_probability,
        failure_mode,
        remaining_life_min: args.remaining_life_min,
        anomaly_score: args.anomaly_score,
        anomaly_flag: args.anomaly_flag || engine.is_anomalous(args.anomaly_score),
    };

    let decision = engine.decide(&input, Utc::now());

    match format {
        OutputFormat::Json => print_json(&DecideOutput {
            priority: PolicyEngine::priority_rank(&decision),
            decision: &decision,
        })?,
        OutputFormat::Table => println!("{}", format_decision_summary(&decision)),
    }

    Ok(())
}
