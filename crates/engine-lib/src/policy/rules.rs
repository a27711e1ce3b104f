//! Maintenance rules
//!
//! The policy is an ordered list of rules evaluated top to bottom; the first
//! rule whose predicate holds decides the action. Several predicates can be
//! true at once (a critical unit is usually also above the monitor
//! threshold), so the order in [`default_rules`] is part of the policy.

use super::config::PolicyConfig;
use crate::models::{FailureMode, MaintenanceAction};

/// Failure probability that forces an immediate stop
pub const CRITICAL_PROBABILITY: f64 = 0.7;
/// Remaining life (min) that forces an immediate stop
pub const CRITICAL_RUL_MIN: f64 = 30.0;
pub const URGENT_PROBABILITY: f64 = 0.5;
pub const URGENT_RUL_MIN: f64 = 60.0;
pub const SOON_RUL_MIN: f64 = 120.0;
/// Remaining life (min) that schedules maintenance regardless of probability
pub const LOW_RUL_MIN: f64 = 60.0;

/// Investigation is scheduled this far out (min)
pub const INVESTIGATION_DELAY_MIN: f64 = 120.0;

/// Model outputs the policy decides on
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyInput {
    pub failure_probability: f64,
    pub failure_mode: FailureMode,
    pub remaining_life_min: f64,
    pub anomaly_score: f64,
    pub anomaly_flag: bool,
}

/// When maintenance should happen, relative to the decision time
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Schedule {
    Now,
    AfterMinutes(f64),
    Unscheduled,
}

/// What a matching rule contributes to the decision
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    /// Unclamped; the engine bounds it to [0, 1]
    pub confidence: f64,
    pub schedule: Schedule,
    pub reasoning: String,
}

/// One entry of the ordered rule table
pub trait MaintenanceRule: Send + Sync {
    fn name(&self) -> &str;
    fn action(&self) -> MaintenanceAction;
    fn applies(&self, input: &PolicyInput, config: &PolicyConfig) -> bool;
    fn outcome(&self, input: &PolicyInput, config: &PolicyConfig) -> RuleOutcome;
}

fn pct(p: f64) -> String {
    format!("{:.2}%", p * 100.0)
}

/// Anomalous reading while the classifier sees no fault
pub struct AnomalyWithoutFaultRule;

impl MaintenanceRule for AnomalyWithoutFaultRule {
    fn name(&self) -> &str {
        "AnomalyWithoutFaultRule"
    }

    fn action(&self) -> MaintenanceAction {
        MaintenanceAction::Investigate
    }

    fn applies(&self, input: &PolicyInput, _config: &PolicyConfig) -> bool {
        input.anomaly_flag && input.failure_mode == FailureMode::Normal
    }

    fn outcome(&self, input: &PolicyInput, _config: &PolicyConfig) -> RuleOutcome {
        RuleOutcome {
            confidence: input.anomaly_score.min(0.95),
            schedule: Schedule::AfterMinutes(INVESTIGATION_DELAY_MIN),
            reasoning: format!(
                "Anomaly detected (score={:.2}) without failure prediction. \
                 Investigate sensor data and machine behavior.",
                input.anomaly_score
            ),
        }
    }
}

pub struct CriticalRule;

impl MaintenanceRule for CriticalRule {
    fn name(&self) -> &str {
        "CriticalRule"
    }

    fn action(&self) -> MaintenanceAction {
        MaintenanceAction::CriticalImmediate
    }

    fn applies(&self, input: &PolicyInput, _config: &PolicyConfig) -> bool {
        input.failure_probability > CRITICAL_PROBABILITY
            || input.remaining_life_min < CRITICAL_RUL_MIN
    }

    fn outcome(&self, input: &PolicyInput, _config: &PolicyConfig) -> RuleOutcome {
        RuleOutcome {
            confidence: input
                .failure_probability
                .max(1.0 - input.remaining_life_min / CRITICAL_RUL_MIN),
            schedule: Schedule::Now,
            reasoning: format!(
                "CRITICAL: High failure risk (P={}) or very low RUL ({:.0} min). \
                 Predicted failure mode: {}. Stop machine and perform maintenance NOW.",
                pct(input.failure_probability),
                input.remaining_life_min,
                input.failure_mode
            ),
        }
    }
}

pub struct UrgentRule;

impl MaintenanceRule for UrgentRule {
    fn name(&self) -> &str {
        "UrgentRule"
    }

    fn action(&self) -> MaintenanceAction {
        MaintenanceAction::ScheduleUrgent
    }

    fn applies(&self, input: &PolicyInput, _config: &PolicyConfig) -> bool {
        input.failure_probability > URGENT_PROBABILITY && input.remaining_life_min < URGENT_RUL_MIN
    }

    fn outcome(&self, input: &PolicyInput, config: &PolicyConfig) -> RuleOutcome {
        // Within the shift: at most 4h, at least 30 min out
        let delay = (input.remaining_life_min - config.rul_safety_margin_min).clamp(30.0, 240.0);
        RuleOutcome {
            confidence: input.failure_probability * 0.9,
            schedule: Schedule::AfterMinutes(delay),
            reasoning: format!(
                "URGENT: Elevated failure risk (P={}) with low RUL ({:.0} min). \
                 Predicted failure mode: {}. Schedule maintenance within this shift.",
                pct(input.failure_probability),
                input.remaining_life_min,
                input.failure_mode
            ),
        }
    }
}

/// Probability above threshold with remaining life running short
pub struct ScheduleSoonRule;

impl MaintenanceRule for ScheduleSoonRule {
    fn name(&self) -> &str {
        "ScheduleSoonRule"
    }

    fn action(&self) -> MaintenanceAction {
        MaintenanceAction::ScheduleSoon
    }

    fn applies(&self, input: &PolicyInput, config: &PolicyConfig) -> bool {
        input.failure_probability > config.failure_probability_threshold
            && input.remaining_life_min < SOON_RUL_MIN
    }

    fn outcome(&self, input: &PolicyInput, config: &PolicyConfig) -> RuleOutcome {
        let delay = (input.remaining_life_min - config.rul_safety_margin_min).max(60.0);
        RuleOutcome {
            confidence: input.failure_probability * 0.8,
            schedule: Schedule::AfterMinutes(delay),
            reasoning: format!(
                "WARNING: Moderate failure risk (P={}) with RUL={:.0} min. \
                 Predicted failure mode: {}. Plan maintenance within 1-2 days.",
                pct(input.failure_probability),
                input.remaining_life_min,
                input.failure_mode
            ),
        }
    }
}

pub struct MonitorRule;

impl MaintenanceRule for MonitorRule {
    fn name(&self) -> &str {
        "MonitorRule"
    }

    fn action(&self) -> MaintenanceAction {
        MaintenanceAction::Monitor
    }

    fn applies(&self, input: &PolicyInput, config: &PolicyConfig) -> bool {
        input.failure_probability > config.failure_probability_threshold
    }

    fn outcome(&self, input: &PolicyInput, _config: &PolicyConfig) -> RuleOutcome {
        RuleOutcome {
            confidence: 0.7,
            schedule: Schedule::Unscheduled,
            reasoning: format!(
                "MONITOR: Moderate failure risk (P={}) but adequate RUL ({:.0} min). \
                 Continue monitoring. Potential failure mode: {}.",
                pct(input.failure_probability),
                input.remaining_life_min,
                input.failure_mode
            ),
        }
    }
}

/// End of tool life approaching while failure probability stays low
pub struct LowRemainingLifeRule;

impl MaintenanceRule for LowRemainingLifeRule {
    fn name(&self) -> &str {
        "LowRemainingLifeRule"
    }

    fn action(&self) -> MaintenanceAction {
        MaintenanceAction::ScheduleSoon
    }

    fn applies(&self, input: &PolicyInput, _config: &PolicyConfig) -> bool {
        input.remaining_life_min < LOW_RUL_MIN
    }

    fn outcome(&self, input: &PolicyInput, config: &PolicyConfig) -> RuleOutcome {
        let delay = (input.remaining_life_min - config.rul_safety_margin_min).max(30.0);
        RuleOutcome {
            confidence: 0.6,
            schedule: Schedule::AfterMinutes(delay),
            reasoning: format!(
                "Low RUL ({:.0} min) approaching end of life. Schedule preventive \
                 maintenance even though failure probability is low (P={}).",
                input.remaining_life_min,
                pct(input.failure_probability)
            ),
        }
    }
}

/// Catch-all, always applies
pub struct NormalRule;

impl MaintenanceRule for NormalRule {
    fn name(&self) -> &str {
        "NormalRule"
    }

    fn action(&self) -> MaintenanceAction {
        MaintenanceAction::Normal
    }

    fn applies(&self, _input: &PolicyInput, _config: &PolicyConfig) -> bool {
        true
    }

    fn outcome(&self, input: &PolicyInput, _config: &PolicyConfig) -> RuleOutcome {
        RuleOutcome {
            confidence: 1.0 - input.failure_probability,
            schedule: Schedule::Unscheduled,
            reasoning: format!(
                "Normal operation. Low failure risk (P={}), RUL={:.0} min. \
                 Continue normal monitoring.",
                pct(input.failure_probability),
                input.remaining_life_min
            ),
        }
    }
}

/// Rule table in evaluation order
pub fn default_rules() -> Vec<Box<dyn MaintenanceRule>> {
    vec![
        Box::new(AnomalyWithoutFaultRule),
        Box::new(CriticalRule),
        Box::new(UrgentRule),
        Box::new(ScheduleSoonRule),
        Box::new(MonitorRule),
        Box::new(LowRemainingLifeRule),
        Box::new(NormalRule),
    ]
}
