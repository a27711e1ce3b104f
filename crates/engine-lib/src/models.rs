//! Core data models for the maintenance engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Product quality class of the unit being machined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductType {
    #[serde(rename = "L")]
    Low,
    #[serde(rename = "M")]
    Medium,
    #[serde(rename = "H")]
    High,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Low => "L",
            ProductType::Medium => "M",
            ProductType::High => "H",
        }
    }
}

impl FromStr for ProductType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" => Ok(ProductType::Low),
            "M" => Ok(ProductType::Medium),
            "H" => Ok(ProductType::High),
            other => Err(format!("unknown product type '{}'", other)),
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Predicted (or labelled) failure mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FailureMode {
    /// No fault
    Normal,
    /// Tool wear failure
    Twf,
    /// Heat dissipation failure
    Hdf,
    /// Power failure
    Pwf,
    /// Overstrain failure
    Osf,
    /// Random failure
    Rnf,
}

impl FailureMode {
    /// Label order of a multiclass probability vector (classes sorted by label)
    pub const CLASS_ORDER: [FailureMode; 6] = [
        FailureMode::Hdf,
        FailureMode::Normal,
        FailureMode::Osf,
        FailureMode::Pwf,
        FailureMode::Rnf,
        FailureMode::Twf,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureMode::Normal => "NORMAL",
            FailureMode::Twf => "TWF",
            FailureMode::Hdf => "HDF",
            FailureMode::Pwf => "PWF",
            FailureMode::Osf => "OSF",
            FailureMode::Rnf => "RNF",
        }
    }

    pub fn is_fault(&self) -> bool {
        *self != FailureMode::Normal
    }
}

impl FromStr for FailureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NORMAL" | "NONE" => Ok(FailureMode::Normal),
            "TWF" => Ok(FailureMode::Twf),
            "HDF" => Ok(FailureMode::Hdf),
            "PWF" => Ok(FailureMode::Pwf),
            "OSF" => Ok(FailureMode::Osf),
            "RNF" => Ok(FailureMode::Rnf),
            other => Err(format!("unknown failure mode '{}'", other)),
        }
    }
}

impl fmt::Display for FailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label columns that travel with an observation but never reach a model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_failure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twf: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hdf: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pwf: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osf: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rnf: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_mode: Option<FailureMode>,
}

impl GroundTruth {
    pub fn is_empty(&self) -> bool {
        *self == GroundTruth::default()
    }
}

/// One sensor reading for one unit on the line
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udi: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_type: Option<ProductType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub air_temperature_k: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_temperature_k: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotational_speed_rpm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub torque_nm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_wear_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "GroundTruth::is_empty")]
    pub ground_truth: GroundTruth,
}

/// Scoring-ready projection of an observation
///
/// Built by [`crate::predictor::FeatureExtractor`]; labels are stripped and
/// missing attributes are zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureView {
    pub product_type: Option<ProductType>,
    pub air_temperature_k: f64,
    pub process_temperature_k: f64,
    pub rotational_speed_rpm: f64,
    pub torque_nm: f64,
    pub tool_wear_min: f64,
    pub temp_diff_k: f64,
    pub power_proxy: f64,
    pub tool_wear_norm: f64,
    /// Names of attributes that were missing and defaulted to 0
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub defaulted: Vec<String>,
}

/// Multiclass failure-mode classifier output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureModeScore {
    pub label: FailureMode,
    /// Probability per label, in [`FailureMode::CLASS_ORDER`]
    pub probabilities: Vec<(FailureMode, f64)>,
}

impl FailureModeScore {
    /// Highest class probability
    pub fn confidence(&self) -> f64 {
        self.probabilities
            .iter()
            .map(|(_, p)| *p)
            .fold(0.0, f64::max)
    }
}

/// Raw outputs of the five predictive models for one observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScores {
    pub anomaly_score: f64,
    pub anomaly_flag: bool,
    pub failure_probability: f64,
    pub failure_flag: bool,
    pub failure_mode: FailureMode,
    pub failure_mode_confidence: f64,
    pub failure_mode_probabilities: Vec<(FailureMode, f64)>,
    /// Minutes; negative when the unit is overdue
    pub remaining_life_min: f64,
    pub energy_estimate: f64,
}

/// Recommended maintenance response, declared from most to least urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceAction {
    CriticalImmediate,
    ScheduleUrgent,
    Investigate,
    ScheduleSoon,
    Monitor,
    Normal,
}

impl MaintenanceAction {
    pub const ALL: [MaintenanceAction; 6] = [
        MaintenanceAction::CriticalImmediate,
        MaintenanceAction::ScheduleUrgent,
        MaintenanceAction::Investigate,
        MaintenanceAction::ScheduleSoon,
        MaintenanceAction::Monitor,
        MaintenanceAction::Normal,
    ];

    /// Urgency rank, 1 = most urgent
    pub fn priority(&self) -> u8 {
        match self {
            MaintenanceAction::CriticalImmediate => 1,
            MaintenanceAction::ScheduleUrgent => 2,
            MaintenanceAction::Investigate => 3,
            MaintenanceAction::ScheduleSoon => 4,
            MaintenanceAction::Monitor => 5,
            MaintenanceAction::Normal => 6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceAction::CriticalImmediate => "critical_immediate",
            MaintenanceAction::ScheduleUrgent => "schedule_urgent",
            MaintenanceAction::Investigate => "investigate",
            MaintenanceAction::ScheduleSoon => "schedule_soon",
            MaintenanceAction::Monitor => "monitor",
            MaintenanceAction::Normal => "normal",
        }
    }

    /// Whether the action commits maintenance spend (monitor/normal only carry risk)
    pub fn is_actionable(&self) -> bool {
        !matches!(self, MaintenanceAction::Monitor | MaintenanceAction::Normal)
    }
}

impl FromStr for MaintenanceAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        MaintenanceAction::ALL
            .into_iter()
            .find(|a| a.as_str() == normalized)
            .ok_or_else(|| format!("unknown maintenance action '{}'", s))
    }
}

impl fmt::Display for MaintenanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority ranks at or below this value count as critical
pub const CRITICAL_PRIORITY: u8 = 2;

/// Output of the maintenance policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceDecision {
    pub action: MaintenanceAction,
    pub confidence: f64,
    pub expected_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    pub reasoning: String,
    pub failure_mode: FailureMode,
    pub failure_probability: f64,
    pub remaining_life_min: f64,
    pub anomaly_score: f64,
}

/// Auditable unit stored in the history buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub sequence_index: u64,
    pub observation: Observation,
    pub scores: ModelScores,
    pub decision: MaintenanceDecision,
    pub priority: u8,
    pub processed_at: DateTime<Utc>,
    /// Wall time spent in the model fan-out
    pub inference_us: u64,
}

impl DecisionRecord {
    pub fn is_critical(&self) -> bool {
        self.priority <= CRITICAL_PRIORITY
    }
}
