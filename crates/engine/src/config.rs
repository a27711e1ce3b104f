//! Engine configuration
//!
//! Layered with the `config` crate: an optional TOML file (`AMOS_CONFIG`,
//! default `amos.toml`) under `AMOS_*` environment variables, where `__`
//! separates nested keys (`AMOS_POLICY__FAILURE_COST=7500`).

use anyhow::{Context, Result};
use engine_lib::{
    history::DEFAULT_HISTORY_CAPACITY,
    ingestion::{ReplayConfig, DEFAULT_REPLAY_PACE},
    pipeline::{FailurePolicy, OrchestratorConfig, DEFAULT_INFERENCE_TIMEOUT},
    policy::PolicyConfig,
    predictor::{FeatureExtractor, ModelConfig, DEFAULT_MAX_TOOL_WEAR_MIN},
    EngineError,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "amos.toml";
const ENV_PREFIX: &str = "AMOS";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Production line this engine instance serves
    pub line_name: String,

    /// API server port for health, metrics and history
    pub api_port: u16,

    pub history_capacity: usize,

    pub inference_timeout_ms: u64,

    /// What a failed observation does to the continuous run
    pub on_inference_error: FailurePolicy,

    pub stream: StreamConfig,
    pub models: ModelConfig,
    pub features: FeatureConfig,
    pub policy: PolicyConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            line_name: default_line_name(),
            api_port: 8080,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            inference_timeout_ms: DEFAULT_INFERENCE_TIMEOUT.as_millis() as u64,
            on_inference_error: FailurePolicy::default(),
            stream: StreamConfig::default(),
            models: ModelConfig::default(),
            features: FeatureConfig::default(),
            policy: PolicyConfig::default(),
        }
    }
}

/// Observation stream feeding the continuous run
///
/// With neither `path` nor `stdin` set the engine only serves the API.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// CSV file to replay
    pub path: Option<PathBuf>,
    /// Read JSON-lines observations from stdin
    pub stdin: bool,
    pub sleep_ms: u64,
    pub loop_forever: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            path: None,
            stdin: false,
            sleep_ms: DEFAULT_REPLAY_PACE.as_millis() as u64,
            loop_forever: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub max_tool_wear_min: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            max_tool_wear_min: DEFAULT_MAX_TOOL_WEAR_MIN,
        }
    }
}

fn default_line_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "line-1".to_string())
}

impl EngineConfig {
    /// Load configuration from the config file and environment
    pub fn load() -> Result<Self> {
        let (path, required) = match std::env::var("AMOS_CONFIG") {
            Ok(path) => (PathBuf::from(path), true),
            Err(_) => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        Self::from_sources(Some((&path, required)), None)
    }

    /// Build from an optional file and an explicit environment map
    ///
    /// `env` of `None` reads the process environment.
    pub fn from_sources(
        file: Option<(&Path, bool)>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some((path, required)) = file {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(required),
            );
        }

        let environment = config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(env.map(|vars| vars.into_iter().collect()));

        let config: EngineConfig = builder
            .add_source(environment)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.history_capacity == 0 {
            return Err(EngineError::config("history_capacity must be greater than zero"));
        }
        if self.inference_timeout_ms == 0 {
            return Err(EngineError::config("inference_timeout_ms must be greater than zero"));
        }
        if self.stream.stdin && self.stream.path.is_some() {
            return Err(EngineError::config(
                "stream.path and stream.stdin are mutually exclusive",
            ));
        }
        FeatureExtractor::with_max_tool_wear(self.features.max_tool_wear_min)?;
        self.policy.validate()
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            inference_timeout: self.inference_timeout(),
        }
    }

    pub fn replay_config(&self) -> ReplayConfig {
        ReplayConfig {
            pace: Duration::from_millis(self.stream.sleep_ms),
            loop_forever: self.stream.loop_forever,
        }
    }
}
