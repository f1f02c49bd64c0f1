use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::{BoxFormat, COCO_CLASS_NAMES, DEFAULT_MODEL_INPUT, DEFAULT_VEHICLE_LABELS};
use crate::evaluate::DEFAULT_OVERLAP_THRESHOLD;
use crate::store::{FileSnapshotStore, SnapshotStore, SqliteSnapshotStore};

const DEFAULT_SNAPSHOT_PATH: &str = "regions.json";

#[derive(Debug, Deserialize, Default)]
struct OccupancyConfigFile {
    overlap_threshold: Option<f64>,
    detection: Option<DetectionConfigFile>,
    store: Option<StoreConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    vehicle_only: Option<bool>,
    vehicle_labels: Option<Vec<String>>,
    class_names: Option<Vec<String>>,
    model_input_width: Option<u32>,
    model_input_height: Option<u32>,
    box_format: Option<BoxFormat>,
    min_confidence: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct StoreConfigFile {
    kind: Option<StoreKind>,
    path: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    #[default]
    File,
    Sqlite,
}

impl std::str::FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "file" | "json" => Ok(StoreKind::File),
            "sqlite" => Ok(StoreKind::Sqlite),
            other => Err(anyhow!("unknown store kind '{}' (expected file|sqlite)", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OccupancyConfig {
    pub overlap_threshold: f64,
    pub vehicle_only: bool,
    pub vehicle_labels: Vec<String>,
    pub class_names: Vec<String>,
    pub model_input_width: u32,
    pub model_input_height: u32,
    pub box_format: BoxFormat,
    pub min_confidence: f64,
    pub store: StoreSettings,
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub kind: StoreKind,
    pub path: PathBuf,
}

impl OccupancyConfig {
    /// Defaults, then the file named by `PARKING_CONFIG`, then `PARKING_*` env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PARKING_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: OccupancyConfigFile) -> Self {
        let detection = file.detection.unwrap_or_default();
        let store = file.store.unwrap_or_default();
        Self {
            overlap_threshold: file.overlap_threshold.unwrap_or(DEFAULT_OVERLAP_THRESHOLD),
            vehicle_only: detection.vehicle_only.unwrap_or(true),
            vehicle_labels: detection.vehicle_labels.unwrap_or_else(|| {
                DEFAULT_VEHICLE_LABELS
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            }),
            class_names: detection
                .class_names
                .unwrap_or_else(|| COCO_CLASS_NAMES.iter().map(|s| s.to_string()).collect()),
            model_input_width: detection.model_input_width.unwrap_or(DEFAULT_MODEL_INPUT.0),
            model_input_height: detection.model_input_height.unwrap_or(DEFAULT_MODEL_INPUT.1),
            box_format: detection.box_format.unwrap_or_default(),
            min_confidence: detection.min_confidence.unwrap_or(0.0),
            store: StoreSettings {
                kind: store.kind.unwrap_or_default(),
                path: store
                    .path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_PATH)),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(threshold) = std::env::var("PARKING_OVERLAP_THRESHOLD") {
            self.overlap_threshold = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("PARKING_OVERLAP_THRESHOLD must be a number"))?;
        }
        if let Ok(vehicle_only) = std::env::var("PARKING_VEHICLE_ONLY") {
            self.vehicle_only = parse_bool(&vehicle_only)
                .ok_or_else(|| anyhow!("PARKING_VEHICLE_ONLY must be true or false"))?;
        }
        if let Ok(labels) = std::env::var("PARKING_VEHICLE_LABELS") {
            let parsed = split_csv(&labels);
            if !parsed.is_empty() {
                self.vehicle_labels = parsed;
            }
        }
        if let Ok(size) = std::env::var("PARKING_MODEL_INPUT") {
            let (w, h) = parse_size(&size)
                .ok_or_else(|| anyhow!("PARKING_MODEL_INPUT must look like 640x640"))?;
            self.model_input_width = w;
            self.model_input_height = h;
        }
        if let Ok(min_confidence) = std::env::var("PARKING_MIN_CONFIDENCE") {
            self.min_confidence = min_confidence
                .trim()
                .parse()
                .map_err(|_| anyhow!("PARKING_MIN_CONFIDENCE must be a number"))?;
        }
        if let Ok(path) = std::env::var("PARKING_SNAPSHOT_PATH") {
            if !path.trim().is_empty() {
                self.store.path = PathBuf::from(path);
            }
        }
        if let Ok(kind) = std::env::var("PARKING_STORE") {
            self.store.kind = kind.parse()?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if !(self.overlap_threshold > 0.0 && self.overlap_threshold <= 1.0) {
            return Err(anyhow!(
                "overlap threshold must be in (0, 1], got {}",
                self.overlap_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(anyhow!(
                "min confidence must be in [0, 1], got {}",
                self.min_confidence
            ));
        }
        if self.model_input_width == 0 || self.model_input_height == 0 {
            return Err(anyhow!("model input size must be non-zero"));
        }
        if self.class_names.is_empty() {
            return Err(anyhow!("class name table must not be empty"));
        }
        self.vehicle_labels = self
            .vehicle_labels
            .iter()
            .map(|label| label.trim().to_lowercase())
            .filter(|label| !label.is_empty())
            .collect();
        Ok(())
    }

    /// Open the configured snapshot store.
    pub fn open_store(&self) -> Result<Box<dyn SnapshotStore>> {
        match self.store.kind {
            StoreKind::File => Ok(Box::new(FileSnapshotStore::new(self.store.path.clone()))),
            StoreKind::Sqlite => {
                let path = self
                    .store
                    .path
                    .to_str()
                    .ok_or_else(|| anyhow!("sqlite store path must be valid UTF-8"))?;
                Ok(Box::new(SqliteSnapshotStore::open(path)?))
            }
        }
    }
}

impl Default for OccupancyConfig {
    fn default() -> Self {
        Self::from_file(OccupancyConfigFile::default())
    }
}

fn read_config_file(path: &Path) -> Result<OccupancyConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
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

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_size(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.trim().split_once(['x', 'X'])?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}
