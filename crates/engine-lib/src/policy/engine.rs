//! Maintenance policy engine
//!
//! Pure mapping from model outputs and the current time to a maintenance
//! decision. Holds no state besides its configuration and rule table.

use super::config::PolicyConfig;
use super::rules::{default_rules, MaintenanceRule, PolicyInput, RuleOutcome, Schedule};
use crate::error::EngineError;
use crate::models::{MaintenanceAction, MaintenanceDecision, ModelScores};
use chrono::{DateTime, Duration, Utc};
use tracing::trace;

/// Downtime (hours) of each maintenance action
fn downtime_hours(action: MaintenanceAction) -> Option<f64> {
    match action {
        MaintenanceAction::CriticalImmediate => Some(2.0),
        MaintenanceAction::ScheduleUrgent => Some(1.5),
        MaintenanceAction::ScheduleSoon => Some(1.0),
        _ => None,
    }
}

impl From<&ModelScores> for PolicyInput {
    fn from(scores: &ModelScores) -> Self {
        Self {
            failure_probability: scores.failure_probability,
            failure_mode: scores.failure_mode,
            remaining_life_min: scores.remaining_life_min,
            anomaly_score: scores.anomaly_score,
            anomaly_flag: scores.anomaly_flag,
        }
    }
}

pub struct PolicyEngine {
    config: PolicyConfig,
    rules: Vec<Box<dyn MaintenanceRule>>,
}

impl PolicyEngine {
    /// Create an engine with the standard rule table
    pub fn new(config: PolicyConfig) -> Result<Self, EngineError> {
        Self::with_rules(config, default_rules())
    }

    /// Create an engine with a caller-supplied rule table
    ///
    /// The last rule must always apply; an empty table is rejected.
    pub fn with_rules(
        config: PolicyConfig,
        rules: Vec<Box<dyn MaintenanceRule>>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        if rules.is_empty() {
            return Err(EngineError::config("policy rule table is empty"));
        }
        Ok(Self { config, rules })
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn is_anomalous(&self, anomaly_score: f64) -> bool {
        anomaly_score >= self.config.anomaly_score_threshold
    }

    pub fn is_failure(&self, failure_probability: f64) -> bool {
        failure_probability >= self.config.failure_probability_threshold
    }

    /// Decide the maintenance action for one set of model outputs
    pub fn decide(&self, input: &PolicyInput, now: DateTime<Utc>) -> MaintenanceDecision {
        let (action, outcome) = self
            .rules
            .iter()
            .find(|rule| rule.applies(input, &self.config))
            .map(|rule| {
                trace!(rule = rule.name(), "Policy rule matched");
                (rule.action(), rule.outcome(input, &self.config))
            })
            .unwrap_or_else(|| fallback(input));

        let RuleOutcome {
            confidence,
            schedule,
            reasoning,
        } = outcome;

        MaintenanceDecision {
            action,
            confidence: if confidence.is_finite() {
                confidence.clamp(0.0, 1.0)
            } else {
                0.0
            },
            expected_cost: self.expected_cost(action, input.failure_probability),
            scheduled_at: schedule_time(schedule, now),
            reasoning,
            failure_mode: input.failure_mode,
            failure_probability: input.failure_probability,
            remaining_life_min: input.remaining_life_min,
            anomaly_score: input.anomaly_score,
        }
    }

    /// Expected cost of following `action`
    ///
    /// Planned work pays the intervention plus its downtime; monitor and
    /// normal carry the risk of an unplanned failure instead.
    pub fn expected_cost(&self, action: MaintenanceAction, failure_probability: f64) -> f64 {
        let cost = match action {
            MaintenanceAction::Investigate => self.config.investigation_cost,
            MaintenanceAction::Monitor | MaintenanceAction::Normal => {
                failure_probability.clamp(0.0, 1.0) * self.config.failure_cost
            }
            other => {
                let hours = downtime_hours(other).unwrap_or_default();
                self.config.maintenance_cost + hours * self.config.downtime_cost_per_hour
            }
        };
        cost.max(0.0)
    }

    pub fn priority_rank(decision: &MaintenanceDecision) -> u8 {
        decision.action.priority()
    }
}

/// Used only when a custom rule table has no catch-all
fn fallback(input: &PolicyInput) -> (MaintenanceAction, RuleOutcome) {
    (
        MaintenanceAction::Normal,
        RuleOutcome {
            confidence: 1.0 - input.failure_probability,
            schedule: Schedule::Unscheduled,
            reasoning: "No policy rule matched.".to_string(),
        },
    )
}

fn schedule_time(schedule: Schedule, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match schedule {
        Schedule::Now => Some(now),
        Schedule::AfterMinutes(minutes) => {
            let millis = (minutes * 60_000.0).round();
            if millis.is_finite() {
                Some(now + Duration::milliseconds(millis as i64))
            } else {
                Some(now)
            }
        }
        Schedule::Unscheduled => None,
    }
}

/// Human-readable decision summary for operator output
pub fn format_decision_summary(decision: &MaintenanceDecision) -> String {
    let mut summary = format!(
        "[P{}] {}\n",
        decision.action.priority(),
        decision.action.as_str().to_uppercase().replace('_', " ")
    );
    summary.push_str(&format!("Failure Mode: {}\n", decision.failure_mode));
    summary.push_str(&format!(
        "Failure Probability: {:.1}%\n",
        decision.failure_probability * 100.0
    ));
    summary.push_str(&format!("RUL: {:.0} min\n", decision.remaining_life_min));
    summary.push_str(&format!("Confidence: {:.1}%\n", decision.confidence * 100.0));
    summary.push_str(&format!("Expected Cost: ${:.2}\n", decision.expected_cost));
    if let Some(at) = decision.scheduled_at {
        summary.push_str(&format!("Schedule: {}\n", at.format("%Y-%m-%d %H:%M")));
    }
    summary.push_str(&format!("\nReasoning: {}", decision.reasoning));
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FailureMode;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn engine() -> PolicyEngine {
        PolicyEngine::new(PolicyConfig::default()).unwrap()
    }

    fn input(p: f64, rul: f64, flag: bool, mode: FailureMode) -> PolicyInput {
        PolicyInput {
            failure_probability: p,
            failure_mode: mode,
            remaining_life_min: rul,
            anomaly_score: if flag { 0.75 } else { 0.3 },
            anomaly_flag: flag,
        }
    }

    #[test]
    fn test_high_probability_is_critical() {
        let d = engine().decide(&input(0.85, 100.0, false, FailureMode::Twf), now());
        assert_eq!(d.action, MaintenanceAction::CriticalImmediate);
        assert_eq!(PolicyEngine::priority_rank(&d), 1);
        assert_eq!(d.scheduled_at, Some(now()));
        assert_eq!(d.expected_cost, 2500.0);
        assert!((d.confidence - 0.85).abs() < 1e-12);
    }

    #[test]
    fn test_low_rul_is_critical_regardless_of_probability() {
        let d = engine().decide(&input(0.30, 20.0, false, FailureMode::Hdf), now());
        assert_eq!(d.action, MaintenanceAction::CriticalImmediate);
        assert_eq!(PolicyEngine::priority_rank(&d), 1);
    }

    #[test]
    fn test_healthy_unit_is_normal() {
        let d = engine().decide(&input(0.10, 200.0, false, FailureMode::Normal), now());
        assert_eq!(d.action, MaintenanceAction::Normal);
        assert_eq!(PolicyEngine::priority_rank(&d), 6);
        assert!(d.scheduled_at.is_none());
        assert!((d.expected_cost - 500.0).abs() < 1e-9);
        assert!((d.confidence - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_anomaly_without_fault_is_investigated() {
        let d = engine().decide(&input(0.20, 150.0, true, FailureMode::Normal), now());
        assert_eq!(d.action, MaintenanceAction::Investigate);
        assert_eq!(PolicyEngine::priority_rank(&d), 3);
        assert_eq!(d.scheduled_at, Some(now() + Duration::hours(2)));
        assert_eq!(d.expected_cost, 100.0);
        assert!((d.confidence - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_anomaly_check_precedes_critical() {
        // Both the anomaly rule and the critical rule match; anomaly wins
        let d = engine().decide(&input(0.9, 10.0, true, FailureMode::Normal), now());
        assert_eq!(d.action, MaintenanceAction::Investigate);
    }

    #[test]
    fn test_anomaly_with_fault_falls_through() {
        let d = engine().decide(&input(0.9, 100.0, true, FailureMode::Osf), now());
        assert_eq!(d.action, MaintenanceAction::CriticalImmediate);
    }

    #[test]
    fn test_urgent_and_soon() {
        let e = engine();
        let d = e.decide(&input(0.6, 50.0, false, FailureMode::Pwf), now());
        assert_eq!(d.action, MaintenanceAction::ScheduleUrgent);
        assert_eq!(d.scheduled_at, Some(now() + Duration::minutes(30)));
        assert_eq!(d.expected_cost, 2000.0);

        let d = e.decide(&input(0.4, 100.0, false, FailureMode::Twf), now());
        assert_eq!(d.action, MaintenanceAction::ScheduleSoon);
        assert_eq!(d.scheduled_at, Some(now() + Duration::minutes(80)));
        assert_eq!(d.expected_cost, 1500.0);
    }

    #[test]
    fn test_monitor_then_low_rul_fallback() {
        let e = engine();
        let d = e.decide(&input(0.4, 300.0, false, FailureMode::Twf), now());
        assert_eq!(d.action, MaintenanceAction::Monitor);
        assert!(d.scheduled_at.is_none());
        assert!((d.expected_cost - 2000.0).abs() < 1e-9);

        let d = e.decide(&input(0.1, 45.0, false, FailureMode::Normal), now());
        assert_eq!(d.action, MaintenanceAction::ScheduleSoon);
        assert_eq!(d.scheduled_at, Some(now() + Duration::minutes(30)));
        assert!((d.confidence - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_decision_is_deterministic() {
        let e = engine();
        let i = input(0.55, 58.0, false, FailureMode::Hdf);
        let a = e.decide(&i, now());
        let b = e.decide(&i, now());
        assert_eq!(a, b);
    }

    #[test]
    fn test_cost_and_confidence_bounds() {
        let e = engine();
        for p in [0.0, 0.2, 0.35, 0.36, 0.5, 0.51, 0.7, 0.71, 1.0] {
            for rul in [-500.0, -1.0, 0.0, 29.0, 30.0, 59.0, 60.0, 119.0, 120.0, 1e6] {
                for flag in [false, true] {
                    for mode in [FailureMode::Normal, FailureMode::Twf] {
                        let d = e.decide(&input(p, rul, flag, mode), now());
                        assert!(d.expected_cost >= 0.0, "cost for p={p} rul={rul}");
                        assert!((0.0..=1.0).contains(&d.confidence), "confidence for p={p} rul={rul}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_overdue_unit_confidence_clamped() {
        let d = engine().decide(&input(0.2, -60.0, false, FailureMode::Twf), now());
        assert_eq!(d.action, MaintenanceAction::CriticalImmediate);
        assert_eq!(d.confidence, 1.0);
    }

    #[test]
    fn test_flags_use_inclusive_thresholds() {
        let e = engine();
        assert!(e.is_anomalous(0.6));
        assert!(!e.is_anomalous(0.59));
        assert!(e.is_failure(0.35));
        assert!(!e.is_failure(0.34));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PolicyConfig {
            maintenance_cost: -5.0,
            ..Default::default()
        };
        assert!(matches!(
            PolicyEngine::new(config),
            Err(EngineError::Configuration(_))
        ));
        assert!(PolicyEngine::with_rules(PolicyConfig::default(), Vec::new()).is_err());
    }

    #[test]
    fn test_custom_rule_table_without_catch_all() {
        let e = PolicyEngine::with_rules(
            PolicyConfig::default(),
            vec![Box::new(super::super::rules::CriticalRule)],
        )
        .unwrap();
        let d = e.decide(&input(0.1, 500.0, false, FailureMode::Normal), now());
        assert_eq!(d.action, MaintenanceAction::Normal);
    }

    #[test]
    fn test_summary_format() {
        let d = engine().decide(&input(0.85, 100.0, false, FailureMode::Twf), now());
        let text = format_decision_summary(&d);
        assert!(text.starts_with("[P1] CRITICAL IMMEDIATE"));
        assert!(text.contains("Failure Probability: 85.0%"));
        assert!(text.contains("Expected Cost: $2500.00"));
        assert!(text.contains("Schedule: 2024-03-01 08:00"));
        assert!(text.contains("Reasoning: CRITICAL"));
    }
}
