//! AMOS CLI
//!
//! A command-line tool for querying maintenance decisions, checking engine
//! health and evaluating the maintenance policy offline.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{decide, decisions, health};
use std::path::PathBuf;

/// AMOS predictive maintenance CLI
#[derive(Parser)]
#[command(name = "amos")]
#[command(author, version, about = "CLI for the AMOS predictive maintenance engine", long_about = None)]
pub struct Cli {
    /// Engine API URL (falls back to ~/.config/amos/config.json, then http://localhost:8080)
    #[arg(long, env = "AMOS_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the most recent decisions
    Decisions {
        /// Number of decisions to show
        #[arg(long, short, default_value_t = 50)]
        limit: usize,
    },

    /// List critical decisions, most urgent first
    Critical,

    /// Show one decision in full
    Show {
        /// Sequence index of the decision
        sequence: u64,
    },

    /// Summarize the retained decision history
    Summary,

    /// Show engine health
    Health,

    /// Submit an observation (JSON file) for immediate processing
    Submit {
        /// Path to a JSON observation
        file: PathBuf,

        /// Sequence index to record the decision under
        #[arg(long)]
        sequence: u64,
    },

    /// Evaluate the maintenance policy locally with default configuration
    Decide {
        /// Failure probability in [0, 1]
        #[arg(long)]
        probability: f64,

        /// Remaining useful life in minutes
        #[arg(long, allow_negative_numbers = true)]
        rul: f64,

        /// Predicted failure mode (NORMAL, TWF, HDF, PWF, OSF, RNF)
        #[arg(long)]
        mode: Option<String>,

        /// Anomaly score
        #[arg(long, default_value_t = 0.0)]
        anomaly_score: f64,

        /// Treat the observation as anomalous regardless of the score
        #[arg(long)]
        anomaly_flag: bool,
    },
}

fn connect(api_url: Option<String>) -> Result<client::ApiClient> {
    let api_url = config::resolve_api_url(api_url)?;
    client::ApiClient::new(&api_url)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Execute command
    match cli.command {
        Commands::Decisions { limit } => {
            decisions::list_decisions(&connect(cli.api_url)?, limit, cli.format).await?;
        }
        Commands::Critical => {
            decisions::list_critical(&connect(cli.api_url)?, cli.format).await?;
        }
        Commands::Show { sequence } => {
            decisions::show_decision(&connect(cli.api_url)?, sequence, cli.format).await?;
        }
        Commands::Summary => {
            decisions::show_summary(&connect(cli.api_url)?, cli.format).await?;
        }
        Commands::Health => {
            health::show_health(&connect(cli.api_url)?, cli.format).await?;
        }
        Commands::Submit { file, sequence } => {
            decisions::submit_observation(&connect(cli.api_url)?, &file, sequence, cli.format)
                .await?;
        }
        Commands::Decide {
            probability,
            rul,
            mode,
            anomaly_score,
            anomaly_flag,
        } => {
            let args = decide::DecideArgs {
                failure_probability: probability,
                remaining_life_min: rul,
                failure_mode: mode,
                anomaly_score,
                anomaly_flag,
            };
            decide::decide(args, cli.format)?;
        }
    }

    Ok(())
}
