//! Maintenance policy
//!
//! Converts model scores into an action, cost, schedule and justification
//! through an ordered rule table.

pub mod config;
pub mod engine;
pub mod rules;

pub use config::PolicyConfig;
pub use engine::{format_decision_summary, PolicyEngine};
pub use rules::{default_rules, MaintenanceRule, PolicyInput, RuleOutcome, Schedule};
