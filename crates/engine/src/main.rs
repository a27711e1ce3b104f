//! AMOS engine - predictive maintenance decision service
//!
//! Loads the five model adapters, replays or reads an observation stream,
//! decides a maintenance action per observation and serves health, metrics
//! and decision history over HTTP.

use amos_engine::{api, config::EngineConfig};
use anyhow::{Context, Result};
use engine_lib::{
    health::{components, HealthRegistry},
    history::SharedHistory,
    ingestion::{CsvReplaySource, JsonLinesSource, ObservationSource},
    observability::{EngineMetrics, StructuredLogger},
    pipeline::{Orchestrator, RealtimeRunner, RunSummary},
    policy::PolicyEngine,
    predictor::{load_models, FeatureExtractor, ModelBackend, ModelSet},
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting amos-engine");

    let config = EngineConfig::load().context("Invalid engine configuration")?;
    info!(line_name = %config.line_name, "Engine configured");

    let logger = StructuredLogger::new(&config.line_name);
    let health_registry = HealthRegistry::for_engine().await;
    let metrics = EngineMetrics::new();

    let models = load_models(&config.models, config.features.max_tool_wear_min)
        .context("Failed to load models")?;
    report_models(&models, &logger, &metrics, &health_registry).await;

    let orchestrator = Arc::new(Orchestrator::new(
        models,
        PolicyEngine::new(config.policy.clone())?,
        FeatureExtractor::with_max_tool_wear(config.features.max_tool_wear_min)?,
        SharedHistory::new(config.history_capacity)?,
        config.orchestrator_config(),
    )?);

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics.clone(),
        orchestrator.clone(),
    ));
    let api_handle = tokio::spawn(api::serve(
        config.api_port,
        app_state,
        shutdown_tx.subscribe(),
    ));

    let source = open_source(&config)?;
    let source_name = source
        .as_ref()
        .map(|s| s.name().to_string())
        .unwrap_or_else(|| "none".to_string());
    logger.log_startup(ENGINE_VERSION, &source_name);

    let mut run_handle: Option<JoinHandle<RunSummary>> = source.map(|mut source| {
        let runner = RealtimeRunner::new(orchestrator.clone(), logger.clone())
            .observer(Arc::new(logger.clone()))
            .failure_policy(config.on_inference_error)
            .health(health_registry.clone());
        let shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move { runner.run(source.as_mut(), shutdown).await })
    });
    if run_handle.is_none() {
        info!("No observation stream configured; serving API only");
    }

    // Mark engine as ready after initialization
    health_registry.set_ready(true).await;

    let finished = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            None
        }
        summary = wait_for_run(&mut run_handle) => Some(summary.context("Continuous run panicked")?),
    };

    match finished {
        Some(summary) if !summary.is_success() => {
            error!(
                processed = summary.processed,
                error = summary.error.as_deref().unwrap_or("-"),
                "Continuous run aborted"
            );
            logger.log_shutdown("continuous run aborted");
            let _ = shutdown_tx.send(());
            let _ = api_handle.await;
            anyhow::bail!(
                "Continuous run aborted: {}",
                summary.error.unwrap_or_default()
            );
        }
        Some(summary) => {
            info!(
                processed = summary.processed,
                skipped = summary.skipped,
                "Observation stream finished; serving history until shutdown"
            );
            tokio::signal::ctrl_c().await?;
        }
        None => {
            let _ = shutdown_tx.send(());
            if let Some(handle) = run_handle.take() {
                if let Err(e) = handle.await {
                    warn!(error = %e, "Continuous run did not stop cleanly");
                }
            }
        }
    }

    logger.log_shutdown("SIGINT received");
    let _ = shutdown_tx.send(());
    match api_handle.await {
        Ok(Err(e)) => warn!(error = %e, "API server stopped with error"),
        Err(e) => warn!(error = %e, "API server task failed"),
        Ok(Ok(())) => {}
    }

    info!("Shutting down");
    Ok(())
}

async fn wait_for_run(
    handle: &mut Option<JoinHandle<RunSummary>>,
) -> Result<RunSummary, tokio::task::JoinError> {
    match handle.as_mut() {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

fn open_source(config: &EngineConfig) -> Result<Option<Box<dyn ObservationSource>>> {
    if config.stream.stdin {
        return Ok(Some(Box::new(JsonLinesSource::stdin())));
    }
    match &config.stream.path {
        Some(path) => {
            let source = CsvReplaySource::load(path, config.replay_config())
                .with_context(|| format!("Failed to open stream {}", path.display()))?;
            info!(path = %path.display(), rows = source.len(), "Replaying observation stream");
            Ok(Some(Box::new(source)))
        }
        None => Ok(None),
    }
}

async fn report_models(
    models: &ModelSet,
    logger: &StructuredLogger,
    metrics: &EngineMetrics,
    health: &HealthRegistry,
) {
    for info in models.info() {
        logger.log_model_loaded(info);
    }
    metrics.set_model_backends(models.info());

    let unavailable: Vec<&str> = models
        .info()
        .iter()
        .filter(|m| m.backend == ModelBackend::Unavailable)
        .map(|m| m.kind.as_str())
        .collect();
    let heuristic: Vec<&str> = models
        .info()
        .iter()
        .filter(|m| m.backend == ModelBackend::Heuristic)
        .map(|m| m.kind.as_str())
        .collect();

    if !unavailable.is_empty() {
        health
            .set_unhealthy(
                components::MODELS,
                format!("models not loaded: {}", unavailable.join(", ")),
            )
            .await;
    } else if !heuristic.is_empty() {
        health
            .set_degraded(
                components::MODELS,
                format!("heuristic fallback: {}", heuristic.join(", ")),
            )
            .await;
    }
}
