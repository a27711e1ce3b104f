//! CSV replay source
//!
//! Replays a recorded dataset as a live stream. The header row decides which
//! column feeds which observation field; both the dataset's own column names
//! (`Air temperature [K]`, `Tool wear [min]`, ...) and snake_case names are
//! recognised. Rows that fail to parse are skipped at load time.

use super::ObservationSource;
use crate::models::{FailureMode, GroundTruth, Observation, ProductType};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default pause between replayed observations
pub const DEFAULT_REPLAY_PACE: Duration = Duration::from_millis(500);

/// Replay pacing and looping
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Sleep between observations (zero = as fast as possible)
    pub pace: Duration,
    /// Restart from the first row after the last one
    pub loop_forever: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            pace: DEFAULT_REPLAY_PACE,
            loop_forever: true,
        }
    }
}

/// Split a CSV line, honouring double-quoted fields
fn csv_split(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

/// Column index of every recognised field
#[derive(Debug, Default)]
struct ColumnMap {
    udi: Option<usize>,
    product_id: Option<usize>,
    product_type: Option<usize>,
    air_temperature: Option<usize>,
    process_temperature: Option<usize>,
    rotational_speed: Option<usize>,
    torque: Option<usize>,
    tool_wear: Option<usize>,
    observed_at: Option<usize>,
    machine_failure: Option<usize>,
    twf: Option<usize>,
    hdf: Option<usize>,
    pwf: Option<usize>,
    osf: Option<usize>,
    rnf: Option<usize>,
    failure_mode: Option<usize>,
}

impl ColumnMap {
    fn from_header(header: &str) -> Self {
        let mut map = Self::default();

        for (idx, column) in csv_split(header).iter().enumerate() {
            let name = column.trim().trim_start_matches('\u{feff}').to_lowercase();
            let slot = match name.as_str() {
                "udi" => &mut map.udi,
                "product id" | "product_id" => &mut map.product_id,
                "type" | "product_type" => &mut map.product_type,
                "air temperature [k]" | "air_temperature_k" => &mut map.air_temperature,
                "process temperature [k]" | "process_temperature_k" => {
                    &mut map.process_temperature
                }
                "rotational speed [rpm]" | "rotational_speed_rpm" => &mut map.rotational_speed,
                "torque [nm]" | "torque_nm" => &mut map.torque,
                "tool wear [min]" | "tool_wear_min" => &mut map.tool_wear,
                "timestamp" | "observed_at" => &mut map.observed_at,
                "machine failure" | "machine_failure" => &mut map.machine_failure,
                "twf" => &mut map.twf,
                "hdf" => &mut map.hdf,
                "pwf" => &mut map.pwf,
                "osf" => &mut map.osf,
                "rnf" => &mut map.rnf,
                "failuremode" | "failure_mode" => &mut map.failure_mode,
                _ => continue,
            };
            *slot = Some(idx);
        }

        map
    }

    /// At least one sensor column must be present
    fn has_sensor_columns(&self) -> bool {
        [
            self.air_temperature,
            self.process_temperature,
            self.rotational_speed,
            self.torque,
            self.tool_wear,
        ]
        .iter()
        .any(Option::is_some)
    }

    fn parse_row(&self, fields: &[String]) -> Result<Observation> {
        let cell = |idx: Option<usize>| -> Option<&str> {
            idx.and_then(|i| fields.get(i))
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
        };
        let number = |idx: Option<usize>, name: &str| -> Result<Option<f64>> {
            cell(idx)
                .map(|s| {
                    s.parse::<f64>()
                        .with_context(|| format!("invalid {} '{}'", name, s))
                })
                .transpose()
        };
        let flag = |idx: Option<usize>, name: &str| -> Result<Option<bool>> {
            cell(idx).map(|s| parse_flag(s, name)).transpose()
        };

        let product_type = cell(self.product_type)
            .map(|s| s.parse::<ProductType>())
            .transpose()
            .map_err(anyhow::Error::msg)?;

        let observed_at = cell(self.observed_at)
            .map(|s| {
                DateTime::parse_from_rfc3339(s)
                    .map(|t| t.with_timezone(&Utc))
                    .with_context(|| format!("invalid timestamp '{}'", s))
            })
            .transpose()?;

        let mut ground_truth = GroundTruth {
            machine_failure: flag(self.machine_failure, "Machine failure")?,
            twf: flag(self.twf, "TWF")?,
            hdf: flag(self.hdf, "HDF")?,
            pwf: flag(self.pwf, "PWF")?,
            osf: flag(self.osf, "OSF")?,
            rnf: flag(self.rnf, "RNF")?,
            failure_mode: cell(self.failure_mode)
                .map(|s| s.parse::<FailureMode>())
                .transpose()
                .map_err(anyhow::Error::msg)?,
        };
        if ground_truth.failure_mode.is_none() {
            ground_truth.failure_mode = ground_truth.inferred_failure_mode();
        }

        Ok(Observation {
            udi: cell(self.udi)
                .map(|s| s.parse::<u64>().with_context(|| format!("invalid UDI '{}'", s)))
                .transpose()?,
            product_id: cell(self.product_id).map(str::to_string),
            product_type,
            air_temperature_k: number(self.air_temperature, "air temperature")?,
            process_temperature_k: number(self.process_temperature, "process temperature")?,
            rotational_speed_rpm: number(self.rotational_speed, "rotational speed")?,
            torque_nm: number(self.torque, "torque")?,
            tool_wear_min: number(self.tool_wear, "tool wear")?,
            observed_at,
            ground_truth,
        })
    }
}

fn parse_flag(value: &str, name: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" | "yes" => Ok(true),
        "0" | "0.0" | "false" | "no" => Ok(false),
        other => bail!("invalid {} flag '{}'", name, other),
    }
}

impl GroundTruth {
    /// Single failure-mode label derived from the per-mode flags
    ///
    /// A failed unit takes the first active flag in TWF, HDF, PWF, OSF, RNF
    /// order; a failure with no active flag is labelled normal.
    pub fn inferred_failure_mode(&self) -> Option<FailureMode> {
        let failed = self.machine_failure?;
        if !failed {
            return Some(FailureMode::Normal);
        }
        let flags = [
            (self.twf, FailureMode::Twf),
            (self.hdf, FailureMode::Hdf),
            (self.pwf, FailureMode::Pwf),
            (self.osf, FailureMode::Osf),
            (self.rnf, FailureMode::Rnf),
        ];
        Some(
            flags
                .iter()
                .find(|(flag, _)| *flag == Some(true))
                .map(|(_, mode)| *mode)
                .unwrap_or(FailureMode::Normal),
        )
    }
}

/// Paced replay of a recorded CSV dataset
pub struct CsvReplaySource {
    name: String,
    rows: Vec<Observation>,
    config: ReplayConfig,
    position: usize,
    emitted: u64,
}

impl CsvReplaySource {
    /// Load and parse a CSV file
    pub fn load(path: impl AsRef<Path>, config: ReplayConfig) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read(path)
            .with_context(|| format!("Failed to read replay file {:?}", path))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "csv".to_string());
        Self::parse_bytes(name, &content, config)
    }

    /// Parse raw CSV bytes, skipping lines that are not valid UTF-8
    pub fn parse_bytes(
        name: impl Into<String>,
        content: &[u8],
        config: ReplayConfig,
    ) -> Result<Self> {
        let name = name.into();
        let source = name.clone();
        let lines = content
            .split(|b| *b == b'\n')
            .enumerate()
            .filter_map(move |(idx, raw)| match std::str::from_utf8(raw) {
                Ok(line) => Some(line.strip_suffix('\r').unwrap_or(line)),
                Err(e) => {
                    warn!(source = %source, line = idx + 1, error = %e, "Skipping line that is not valid UTF-8");
                    None
                }
            });
        Self::from_lines(name, lines, config)
    }

    /// Parse CSV content already in memory
    pub fn parse(name: impl Into<String>, content: &str, config: ReplayConfig) -> Result<Self> {
        Self::from_lines(name.into(), content.lines(), config)
    }

    fn from_lines<'a>(
        name: String,
        lines: impl Iterator<Item = &'a str>,
        config: ReplayConfig,
    ) -> Result<Self> {
        let mut lines = lines.filter(|l| !l.trim().is_empty());

        let header = match lines.next() {
            Some(header) => header,
            None => bail!("replay file '{}' is empty", name),
        };
        let columns = ColumnMap::from_header(header);
        if !columns.has_sensor_columns() {
            bail!("replay file '{}' has no recognised sensor columns", name);
        }

        let mut rows = Vec::new();
        let mut skipped = 0usize;
        for (row, line) in lines.enumerate() {
            match columns.parse_row(&csv_split(line)) {
                Ok(observation) => rows.push(observation),
                Err(e) => {
                    skipped += 1;
                    warn!(source = %name, row = row + 1, error = %e, "Skipping unparseable row");
                }
            }
        }

        if rows.is_empty() {
            bail!("replay file '{}' contains no usable rows", name);
        }

        info!(
            source = %name,
            rows = rows.len(),
            skipped,
            loop_forever = config.loop_forever,
            "Replay source loaded"
        );

        Ok(Self {
            name,
            rows,
            config,
            position: 0,
            emitted: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl ObservationSource for CsvReplaySource {
    async fn next_observation(&mut self) -> Result<Option<Observation>> {
        if self.position >= self.rows.len() {
            if !self.config.loop_forever {
                return Ok(None);
            }
            debug!(source = %self.name, "Replay restarting from first row");
            self.position = 0;
        }

        if self.emitted > 0 && !self.config.pace.is_zero() {
            tokio::time::sleep(self.config.pace).await;
        }

        let mut observation = self.rows[self.position].clone();
        self.position += 1;
        self.emitted += 1;

        if observation.observed_at.is_none() {
            observation.observed_at = Some(Utc::now());
        }
        Ok(Some(observation))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
