//! Decision history CLI commands

use anyhow::{Context, Result};
use colored::Colorize;
use engine_lib::{
    policy::format_decision_summary,
    DecisionRecord, HistorySummary, Observation,
};
use std::path::Path;
use tabled::Tabled;

use crate::client::{ApiClient, SubmitRequest};
use crate::output::{
    color_action, color_probability, format_cost, format_minutes, format_probability,
    format_timestamp, print_json, print_success, print_warning, OutputFormat,
};

/// Row for decisions table
#[derive(Tabled)]
struct DecisionRow {
    #[tabled(rename = "Seq")]
    sequence: u64,
    #[tabled(rename = "UDI")]
    udi: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "P")]
    priority: u8,
    #[tabled(rename = "Mode")]
    failure_mode: String,
    #[tabled(rename = "Fail Prob")]
    failure_probability: String,
    #[tabled(rename = "RUL")]
    remaining_life: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
    #[tabled(rename = "Cost")]
    cost: String,
    #[tabled(rename = "Scheduled")]
    scheduled: String,
}

impl From<&DecisionRecord> for DecisionRow {
    fn from(record: &DecisionRecord) -> Self {
        let decision = &record.decision;
        Self {
            sequence: record.sequence_index,
            udi: record
                .observation
                .udi
                .map(|u| u.to_string())
                .unwrap_or_else(|| "-".to_string()),
            action: color_action(decision.action),
            priority: record.priority,
            failure_mode: decision.failure_mode.to_string(),
            failure_probability: color_probability(
                decision.failure_probability,
                record.scores.failure_flag,
            ),
            remaining_life: format_minutes(decision.remaining_life_min),
            confidence: format_probability(decision.confidence),
            cost: format_cost(decision.expected_cost),
            scheduled: format_timestamp(decision.scheduled_at),
        }
    }
}

/// Row for the per-action summary table
#[derive(Tabled)]
struct ActionRow {
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Priority")]
    priority: u8,
    #[tabled(rename = "Count")]
    count: usize,
    #[tabled(rename = "Expected Cost")]
    cost: String,
}

fn print_records(records: &[DecisionRecord], empty_message: &str) {
    if records.is_empty() {
        print_warning(empty_message);
        return;
    }

    let rows: Vec<DecisionRow> = records.iter().map(DecisionRow::from).collect();
    let table = tabled::Table::new(rows)
        .with(tabled::settings::Style::rounded())
        .to_string();
    println!("{}", table);
    println!("\nTotal: {} decisions", records.len());
}

/// List the most recent decisions
pub async fn list_decisions(client: &ApiClient, limit: usize, format: OutputFormat) -> Result<()> {
    let records = client.decisions(limit).await?;

    match format {
        OutputFormat::Json => print_json(&records)?,
        OutputFormat::Table => print_records(&records, "No decisions recorded yet"),
    }

    Ok(())
}

/// List critical decisions, most urgent first
pub async fn list_critical(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let records = client.critical().await?;

    match format {
        OutputFormat::Json => print_json(&records)?,
        OutputFormat::Table => print_records(&records, "No critical decisions retained"),
    }

    Ok(())
}

/// Show one decision in full
pub async fn show_decision(client: &ApiClient, sequence: u64, format: OutputFormat) -> Result<()> {
    let record = client.decision(sequence).await?;

    match format {
        OutputFormat::Json => print_json(&record)?,
        OutputFormat::Table => print_record_detail(&record),
    }

    Ok(())
}

fn print_record_detail(record: &DecisionRecord) {
    println!("{}", format!("Decision #{}", record.sequence_index).bold());
    println!("{}", "=".repeat(60));
    if let Some(product_id) = &record.observation.product_id {
        println!("Product:      {}", product_id.cyan());
    }
    println!("Processed:    {}", format_timestamp(Some(record.processed_at)));
    println!("Inference:    {} us", record.inference_us);
    println!(
        "Anomaly:      {:.3}{}",
        record.scores.anomaly_score,
        if record.scores.anomaly_flag { " (flagged)" } else { "" }
    );
    println!("Energy:       {:.3}", record.scores.energy_estimate);
    println!();
    println!("{}", format_decision_summary(&record.decision));
}

/// Show aggregates over the retained history
pub async fn show_summary(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let summary = client.summary().await?;

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Table => print_summary(&summary),
    }

    Ok(())
}

fn print_summary(summary: &HistorySummary) {
    println!("{}", "Decision History".bold());
    println!("{}", "=".repeat(60));

    if summary.records == 0 {
        print_warning("No decisions recorded yet");
        return;
    }

    println!("Records:          {}", summary.records);
    println!("Anomalies:        {}", summary.anomaly_count);
    println!("Failure alerts:   {}", summary.failure_alerts);
    println!("Critical:         {}", summary.critical_count.to_string().red());
    if let Some(rul) = summary.mean_remaining_life_min {
        println!("Mean RUL:         {}", format_minutes(rul));
    }
    println!("Actionable cost:  {}", format_cost(summary.total_actionable_cost));
    if let Some(seq) = summary.latest_sequence {
        println!("Latest sequence:  {}", seq);
    }
    println!();

    let rows: Vec<ActionRow> = summary
        .by_action
        .iter()
        .map(|a| ActionRow {
            action: color_action(a.action),
            priority: a.priority,
            count: a.count,
            cost: format_cost(a.total_cost),
        })
        .collect();
    let table = tabled::Table::new(rows)
        .with(tabled::settings::Style::rounded())
        .to_string();
    println!("{}", table);

    if !summary.failure_modes.is_empty() {
        let modes: Vec<String> = summary
            .failure_modes
            .iter()
            .map(|(mode, count)| format!("{}={}", mode, count))
            .collect();
        println!("\nFailure modes: {}", modes.join(", "));
    }
}

/// Submit an observation file for immediate processing
pub async fn submit_observation(
    client: &ApiClient,
    file: &Path,
    sequence: u64,
    format: OutputFormat,
) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let observation: Observation = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a valid observation", file.display()))?;

    let request = SubmitRequest {
        sequence_index: sequence,
        observation,
    };
    let record = client.submit(&request).await?;

    match format {
        OutputFormat::Json => print_json(&record)?,
        OutputFormat::Table => {
            print_success(&format!("Observation recorded as #{}", record.sequence_index));
            println!();
            println!("{}", format_decision_summary(&record.decision));
        }
    }

    Ok(())
}
