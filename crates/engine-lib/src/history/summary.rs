//! Aggregates over the retained history

use crate::models::{DecisionRecord, FailureMode, MaintenanceAction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-action totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSummary {
    pub action: MaintenanceAction,
    pub priority: u8,
    pub count: usize,
    pub total_cost: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub records: usize,
    pub anomaly_count: usize,
    pub failure_alerts: usize,
    pub critical_count: usize,
    /// Mean remaining-life estimate (min), none when empty
    pub mean_remaining_life_min: Option<f64>,
    /// Expected cost of actionable decisions; monitor and normal add 0
    pub total_actionable_cost: f64,
    /// Actions present in the history, most urgent first
    pub by_action: Vec<ActionSummary>,
    pub failure_modes: BTreeMap<FailureMode, usize>,
    pub latest_sequence: Option<u64>,
}

impl HistorySummary {
    pub fn from_records<'a>(records: impl Iterator<Item = &'a DecisionRecord>) -> Self {
        let mut summary = HistorySummary::default();
        let mut by_action: BTreeMap<MaintenanceAction, ActionSummary> = BTreeMap::new();
        let mut rul_total = 0.0;

        for record in records {
            summary.records += 1;
            if record.scores.anomaly_flag {
                summary.anomaly_count += 1;
            }
            if record.scores.failure_flag {
                summary.failure_alerts += 1;
            }
            if record.is_critical() {
                summary.critical_count += 1;
            }
            rul_total += record.scores.remaining_life_min;

            let action = record.decision.action;
            if action.is_actionable() {
                summary.total_actionable_cost += record.decision.expected_cost;
            }

            let entry = by_action.entry(action).or_insert_with(|| ActionSummary {
                action,
                priority: action.priority(),
                count: 0,
                total_cost: 0.0,
            });
            entry.count += 1;
            entry.total_cost += record.decision.expected_cost;

            *summary
                .failure_modes
                .entry(record.scores.failure_mode)
                .or_insert(0) += 1;

            summary.latest_sequence = Some(record.sequence_index);
        }

        if summary.records > 0 {
            summary.mean_remaining_life_min = Some(rul_total / summary.records as f64);
        }
        summary.by_action = by_action.into_values().collect();
        summary
    }
}
