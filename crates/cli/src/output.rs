//! Output formatting utilities

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use colored::{Color, Colorize};
use engine_lib::{ComponentStatus, MaintenanceAction};
use serde::Serialize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Pretty-print any response as JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Format a probability as percentage
pub fn format_probability(probability: f64) -> String {
    format!("{:.1}%", probability * 100.0)
}

/// Format minutes of remaining life; overdue tools show a negative value
pub fn format_minutes(minutes: f64) -> String {
    format!("{:.0} min", minutes)
}

/// Format currency
pub fn format_cost(amount: f64) -> String {
    format!("${:.2}", amount)
}

pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => ts.format("%Y-%m-%d %H:%M").to_string(),
        None => "-".to_string(),
    }
}

/// Color an action by urgency
pub fn color_action(action: MaintenanceAction) -> String {
    let label = action.as_str();
    match action {
        MaintenanceAction::CriticalImmediate => label.red().bold().to_string(),
        MaintenanceAction::ScheduleUrgent => label.red().to_string(),
        MaintenanceAction::Investigate => label.magenta().to_string(),
        MaintenanceAction::ScheduleSoon => label.yellow().to_string(),
        MaintenanceAction::Monitor => label.blue().to_string(),
        MaintenanceAction::Normal => label.green().to_string(),
    }
}

/// Color status based on value
pub fn color_status(status: ComponentStatus) -> String {
    let label = status.as_str();
    match status {
        ComponentStatus::Healthy => label.green().to_string(),
        ComponentStatus::Degraded => label.yellow().to_string(),
        ComponentStatus::Unhealthy => label.red().to_string(),
    }
}

/// Color for a failure probability, given the engine's failure flag
fn probability_color(probability: f64, flagged: bool) -> Color {
    if probability > 0.7 {
        Color::Red
    } else if flagged {
        Color::Yellow
    } else {
        Color::Green
    }
}

/// Color a failure probability; `flagged` is the failure flag the engine set
pub fn color_probability(probability: f64, flagged: bool) -> String {
    format_probability(probability)
        .color(probability_color(probability, flagged))
        .to_string()
}
