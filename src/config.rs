use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::accumulator::{InterestFilter, DEFAULT_INTEREST_CLASSES};
use crate::reducer::RenameRule;
use crate::sampler::{FrameSampler, DEFAULT_STRIDE};
use crate::scan::{VideoScanner, DEFAULT_PROGRESS_EVERY};

const DEFAULT_BACKEND: &str = "scripted";
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct BlueprintConfigFile {
    sampling: Option<SamplingConfigFile>,
    filter: Option<FilterConfigFile>,
    rename: Option<BTreeMap<String, String>>,
    detector: Option<DetectorConfigFile>,
    progress_every: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SamplingConfigFile {
    stride: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FilterConfigFile {
    classes: Option<Vec<String>>,
    min_confidence: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    script_path: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct BlueprintConfig {
    pub stride: u64,
    pub interest_classes: Vec<String>,
    pub min_confidence: f32,
    pub rename: Vec<(String, String)>,
    pub detector: DetectorSettings,
    pub progress_every: u64,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub script_path: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

impl BlueprintConfig {
    /// Load from `ARCPLAN_CONFIG` (JSON, or TOML for `.toml` files), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ARCPLAN_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a specific file, ignoring `ARCPLAN_CONFIG` but still honouring
    /// the other environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut cfg = Self::from_file(read_config_file(path)?);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: BlueprintConfigFile) -> Self {
        let stride = file
            .sampling
            .and_then(|sampling| sampling.stride)
            .unwrap_or(DEFAULT_STRIDE);
        let interest_classes = file
            .filter
            .as_ref()
            .and_then(|filter| filter.classes.clone())
            .unwrap_or_else(|| {
                DEFAULT_INTEREST_CLASSES
                    .iter()
                    .map(|c| c.to_string())
                    .collect()
            });
        let min_confidence = file
            .filter
            .and_then(|filter| filter.min_confidence)
            .unwrap_or(0.0);
        let rename = match file.rename {
            Some(map) => map.into_iter().collect(),
            None => RenameRule::default()
                .mappings()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        };
        let detector = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            backend: detector
                .backend
                .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            model_path: detector.model_path,
            script_path: detector.script_path,
            input_width: detector.input_width.unwrap_or(DEFAULT_INPUT_SIZE),
            input_height: detector.input_height.unwrap_or(DEFAULT_INPUT_SIZE),
            confidence_threshold: detector
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            iou_threshold: detector.iou_threshold.unwrap_or(DEFAULT_IOU_THRESHOLD),
        };
        Self {
            stride,
            interest_classes,
            min_confidence,
            rename,
            detector,
            progress_every: file.progress_every.unwrap_or(DEFAULT_PROGRESS_EVERY),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(stride) = std::env::var("ARCPLAN_STRIDE") {
            self.stride = stride
                .trim()
                .parse()
                .map_err(|_| anyhow!("ARCPLAN_STRIDE must be a positive integer"))?;
        }
        if let Ok(classes) = std::env::var("ARCPLAN_INTEREST") {
            let parsed = split_csv(&classes);
            if !parsed.is_empty() {
                self.interest_classes = parsed;
            }
        }
        if let Ok(confidence) = std::env::var("ARCPLAN_MIN_CONFIDENCE") {
            self.min_confidence = confidence
                .trim()
                .parse()
                .map_err(|_| anyhow!("ARCPLAN_MIN_CONFIDENCE must be a number in [0, 1]"))?;
        }
        if let Ok(backend) = std::env::var("ARCPLAN_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend.trim().to_string();
            }
        }
        if let Ok(path) = std::env::var("ARCPLAN_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detector.model_path = Some(PathBuf::from(path));
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.stride == 0 {
            return Err(anyhow!("sampling stride must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(anyhow!("min_confidence must be within [0, 1]"));
        }
        for threshold in [
            self.detector.confidence_threshold,
            self.detector.iou_threshold,
        ] {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(anyhow!("detector thresholds must be within [0, 1]"));
            }
        }
        if self.detector.input_width == 0 || self.detector.input_height == 0 {
            return Err(anyhow!("detector input size must be non-zero"));
        }
        self.interest_classes = self
            .interest_classes
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if self.interest_classes.is_empty() {
            return Err(anyhow!("interest filter must list at least one class"));
        }
        // Surfaces duplicate or empty rename labels.
        self.rename_rule()?;
        Ok(())
    }

    pub fn interest_filter(&self) -> Result<InterestFilter> {
        InterestFilter::new(self.interest_classes.iter().cloned())
    }

    pub fn rename_rule(&self) -> Result<RenameRule> {
        RenameRule::new(self.rename.iter().cloned())
    }

    /// Build the scanner this configuration describes.
    pub fn scanner(&self) -> Result<VideoScanner> {
        Ok(VideoScanner::new(
            FrameSampler::new(self.stride)?,
            self.interest_filter()?,
            self.rename_rule()?,
        )
        .with_min_confidence(self.min_confidence)
        .with_progress_every(self.progress_every))
    }
}

impl Default for BlueprintConfig {
    fn default() -> Self {
        Self::from_file(BlueprintConfigFile::default())
    }
}

fn read_config_file(path: &Path) -> Result<BlueprintConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
