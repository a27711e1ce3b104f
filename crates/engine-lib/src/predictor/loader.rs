//! Model directory loading
//!
//! Resolves one backend per adapter kind: a verified ONNX file when present,
//! otherwise the heuristic fallback or an unavailable placeholder.

use super::{
    AnomalyModel, EnergyModel, FailureModeModel, FailureModel, HeuristicModels, ModelBackend,
    ModelInfo, ModelSet, OnnxModel, RemainingLifeModel, UnavailableModel,
};
use crate::error::AdapterKind;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Model loading configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory holding `anomaly.onnx`, `failure.onnx`, ... (none = no files)
    pub dir: Option<PathBuf>,
    /// Substitute the heuristic model for a missing file
    pub fallback_to_heuristics: bool,
    /// Check `<file>.sha256` when it exists
    pub verify_checksums: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: None,
            fallback_to_heuristics: true,
            verify_checksums: true,
        }
    }
}

/// One resolved adapter, usable as any of the five traits
#[derive(Clone)]
struct Resolved {
    onnx: Option<Arc<OnnxModel>>,
    unavailable: Option<Arc<UnavailableModel>>,
    info: ModelInfo,
}

/// Coerce a resolved entry into the trait object for its kind
macro_rules! as_adapter {
    ($entry:expr, $heuristic:expr, $trait:ident) => {{
        let adapter: Arc<dyn $trait> = match ($entry.onnx, $entry.unavailable) {
            (Some(model), _) => model,
            (None, Some(model)) => model,
            (None, None) => $heuristic.clone(),
        };
        adapter
    }};
}

/// Load all five adapters according to `config`
///
/// Fails when a present model file cannot be parsed or does not match its
/// checksum. A missing file is never fatal here: it becomes the heuristic
/// fallback or an adapter that fails every call.
pub fn load_models(config: &ModelConfig, max_tool_wear_min: f64) -> Result<ModelSet> {
    let heuristic = Arc::new(HeuristicModels::new(max_tool_wear_min));

    let mut resolved = Vec::with_capacity(AdapterKind::ALL.len());
    for kind in AdapterKind::ALL {
        let entry = resolve(kind, config)?;
        info!(
            adapter = %kind,
            backend = entry.info.backend.as_str(),
            path = ?entry.info.path,
            "Model adapter resolved"
        );
        resolved.push(entry);
    }

    let info = resolved.iter().map(|r| r.info.clone()).collect();
    let pick = |kind: AdapterKind| {
        resolved
            .iter()
            .find(|r| r.info.kind == kind)
            .cloned()
            .context("adapter not resolved")
    };

    let anomaly = pick(AdapterKind::Anomaly)?;
    let failure = pick(AdapterKind::FailureProbability)?;
    let failure_mode = pick(AdapterKind::FailureMode)?;
    let remaining_life = pick(AdapterKind::RemainingLife)?;
    let energy = pick(AdapterKind::Energy)?;

    let set = ModelSet::new(
        as_adapter!(anomaly, heuristic, AnomalyModel),
        as_adapter!(failure, heuristic, FailureModel),
        as_adapter!(failure_mode, heuristic, FailureModeModel),
        as_adapter!(remaining_life, heuristic, RemainingLifeModel),
        as_adapter!(energy, heuristic, EnergyModel),
    );
    Ok(set.with_info(info))
}

fn resolve(kind: AdapterKind, config: &ModelConfig) -> Result<Resolved> {
    let path = config.dir.as_ref().map(|dir| dir.join(kind.file_name()));

    match path {
        Some(path) if path.exists() => {
            let bytes = fs::read(&path)
                .with_context(|| format!("Failed to read model file {:?}", path))?;
            let checksum = compute_checksum(&bytes);

            if config.verify_checksums {
                verify_checksum(&path, &checksum)?;
            }

            let model = OnnxModel::from_bytes(kind, &bytes)
                .with_context(|| format!("Failed to load model file {:?}", path))?;

            Ok(Resolved {
                onnx: Some(Arc::new(model)),
                unavailable: None,
                info: ModelInfo {
                    kind,
                    backend: ModelBackend::Onnx,
                    path: Some(path),
                    checksum: Some(checksum),
                },
            })
        }
        missing => {
            let reason = match &missing {
                Some(path) => format!("{:?} not found", path),
                None => "no model directory configured".to_string(),
            };

            if config.fallback_to_heuristics {
                Ok(Resolved {
                    onnx: None,
                    unavailable: None,
                    info: ModelInfo::new(kind, ModelBackend::Heuristic),
                })
            } else {
                warn!(adapter = %kind, reason = %reason, "Model unavailable and fallback disabled");
                Ok(Resolved {
                    onnx: None,
                    unavailable: Some(Arc::new(UnavailableModel::new(kind, reason))),
                    info: ModelInfo {
                        kind,
                        backend: ModelBackend::Unavailable,
                        path: missing,
                        checksum: None,
                    },
                })
            }
        }
    }
}

/// Compare against `<file>.sha256` when it exists
fn verify_checksum(model_path: &Path, computed: &str) -> Result<()> {
    let mut sidecar = model_path.as_os_str().to_owned();
    sidecar.push(".sha256");
    let sidecar = PathBuf::from(sidecar);

    if !sidecar.exists() {
        return Ok(());
    }

    let contents = fs::read_to_string(&sidecar)
        .with_context(|| format!("Failed to read checksum file {:?}", sidecar))?;
    // sha256sum format: "<hex>  <file name>"
    let expected = contents
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    if expected != computed {
        bail!(
            "Checksum mismatch for {:?}: expected {}, got {}",
            model_path,
            expected,
            computed
        );
    }
    Ok(())
}

/// Hex SHA-256 of a model file
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Observation;
    use crate::predictor::FeatureExtractor;
    use tempfile::TempDir;

    #[test]
    fn test_no_directory_uses_heuristics() {
        let set = load_models(&ModelConfig::default(), 253.0).unwrap();
        assert_eq!(set.info().len(), 5);
        assert!(set.info().iter().all(|i| i.backend == ModelBackend::Heuristic));

        let view = FeatureExtractor::new().build(&Observation::default()).unwrap();
        assert!(set.remaining_life.remaining_life(&view).is_ok());
    }

    #[test]
    fn test_missing_files_without_fallback_are_unavailable() {
        let dir = TempDir::new().unwrap();
        let config = ModelConfig {
            dir: Some(dir.path().to_path_buf()),
            fallback_to_heuristics: false,
            verify_checksums: true,
        };

        let set = load_models(&config, 253.0).unwrap();
        assert!(set.info().iter().all(|i| i.backend == ModelBackend::Unavailable));

        let view = FeatureExtractor::new().build(&Observation::default()).unwrap();
        assert!(set.anomaly.anomaly_score(&view).is_err());
    }

    #[test]
    fn test_checksum_mismatch_fails_startup() {
        let dir = TempDir::new().unwrap();
        let model_path = dir.path().join("rul.onnx");
        fs::write(&model_path, b"model bytes").unwrap();
        fs::write(dir.path().join("rul.onnx.sha256"), "deadbeef  rul.onnx\n").unwrap();

        let config = ModelConfig {
            dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let err = load_models(&config, 253.0).unwrap_err();
        assert!(format!("{:#}", err).contains("Checksum mismatch"));
    }

    #[test]
    fn test_corrupt_model_file_fails_startup() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("energy.onnx"), b"not a protobuf").unwrap();

        let config = ModelConfig {
            dir: Some(dir.path().to_path_buf()),
            verify_checksums: false,
            ..Default::default()
        };
        assert!(load_models(&config, 253.0).is_err());
    }

    #[test]
    fn test_matching_checksum_passes_verification() {
        let dir = TempDir::new().unwrap();
        let model_path = dir.path().join("anomaly.onnx");
        let data = b"weights";
        fs::write(&model_path, data).unwrap();
        fs::write(dir.path().join("anomaly.onnx.sha256"), compute_checksum(data)).unwrap();

        assert!(verify_checksum(&model_path, &compute_checksum(data)).is_ok());
    }

    #[test]
    fn test_checksum_is_stable() {
        assert_eq!(compute_checksum(b"abc"), compute_checksum(b"abc"));
        assert_ne!(compute_checksum(b"abc"), compute_checksum(b"abd"));
        assert_eq!(compute_checksum(b"").len(), 64);
    }
}
