//! Configuration management for wiseplate
//!
//! Config stored at: ~/.config/wiseplate/config.json

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use wiseplate_types::{ConfigError, FoodCategory, OutputFormat, Result, StatisticsSourceKind};
use wiseplate_vision::DetectorConfig;

/// Plate detector decoding settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSettings {
    /// Letterbox side length
    #[serde(default = "default_input_size")]
    pub input_size: u32,

    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,
}

fn default_input_size() -> u32 {
    640
}

fn default_confidence_threshold() -> f32 {
    0.25
}

fn default_iou_threshold() -> f32 {
    0.45
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            input_size: default_input_size(),
            confidence_threshold: default_confidence_threshold(),
            iou_threshold: default_iou_threshold(),
        }
    }
}

impl DetectionSettings {
    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            input_size: self.input_size,
            confidence_threshold: self.confidence_threshold,
            iou_threshold: self.iou_threshold,
            ..DetectorConfig::default()
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the model files (and optional models.toml)
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Tray image directory
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Output tree root
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Record store directory override
    #[serde(default)]
    pub store_dir: Option<PathBuf>,

    /// Category label for each plate detector class index
    #[serde(default = "default_plate_class_names")]
    pub plate_class_names: Vec<String>,

    #[serde(default)]
    pub detection: DetectionSettings,

    #[serde(default = "default_classifier_input_size")]
    pub classifier_input_size: u32,

    /// Statistics printed after a run
    #[serde(default)]
    pub statistics_source: StatisticsSourceKind,

    /// Delete the input directory after a run
    #[serde(default)]
    pub remove_input_after_run: bool,

    /// Default output format (json, table)
    #[serde(default = "default_output_format")]
    pub output_format: OutputFormat,
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("images")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_plate_class_names() -> Vec<String> {
    FoodCategory::ALL
        .iter()
        .map(|c| c.label().to_string())
        .collect()
}

fn default_classifier_input_size() -> u32 {
    224
}

fn default_output_format() -> OutputFormat {
    OutputFormat::Table
}

impl Default for Config {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            store_dir: None,
            plate_class_names: default_plate_class_names(),
            detection: DetectionSettings::default(),
            classifier_input_size: default_classifier_input_size(),
            statistics_source: StatisticsSourceKind::default(),
            remove_input_after_run: false,
            output_format: default_output_format(),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NotFound)?
            .join("wiseplate");
        Ok(config_dir)
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Get the record store directory path
    pub fn store_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.store_dir {
            return Ok(dir.clone());
        }

        let store_dir = dirs::data_dir()
            .ok_or(ConfigError::NotFound)?
            .join("wiseplate");
        Ok(store_dir)
    }

    /// Load config from file, or create default
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let threshold_ok = |v: f32| (0.0..=1.0).contains(&v);
        if !threshold_ok(self.detection.confidence_threshold) {
            return Err(ConfigError::InvalidValue(format!(
                "detection.confidence_threshold must be within 0..1, got {}",
                self.detection.confidence_threshold
            ))
            .into());
        }
        if !threshold_ok(self.detection.iou_threshold) {
            return Err(ConfigError::InvalidValue(format!(
                "detection.iou_threshold must be within 0..1, got {}",
                self.detection.iou_threshold
            ))
            .into());
        }
        if self.detection.input_size == 0 || self.classifier_input_size == 0 {
            return Err(ConfigError::InvalidValue("input sizes must be positive".to_string()).into());
        }
        Ok(())
    }

    /// Set a value by key (as used by `wiseplate config --set key=value`)
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = |what: &str| ConfigError::InvalidValue(format!("{}: {}", what, value));
        match key {
            "models_dir" => self.models_dir = PathBuf::from(value),
            "input_dir" => self.input_dir = PathBuf::from(value),
            "output_dir" => self.output_dir = PathBuf::from(value),
            "store_dir" => {
                self.store_dir = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            "plate_class_names" => {
                self.plate_class_names = value.split(',').map(|s| s.trim().to_string()).collect();
            }
            "detection.input_size" => {
                self.detection.input_size = value.parse().map_err(|_| invalid(key))?;
            }
            "detection.confidence_threshold" => {
                self.detection.confidence_threshold = value.parse().map_err(|_| invalid(key))?;
            }
            "detection.iou_threshold" => {
                self.detection.iou_threshold = value.parse().map_err(|_| invalid(key))?;
            }
            "classifier_input_size" => {
                self.classifier_input_size = value.parse().map_err(|_| invalid(key))?;
            }
            "statistics_source" => {
                self.statistics_source = match value {
                    "tree" => StatisticsSourceKind::Tree,
                    "store" => StatisticsSourceKind::Store,
                    _ => return Err(invalid(key).into()),
                };
            }
            "remove_input_after_run" => {
                self.remove_input_after_run = value.parse().map_err(|_| invalid(key))?;
            }
            "output_format" => {
                self.output_format = match value {
                    "table" => OutputFormat::Table,
                    "json" => OutputFormat::Json,
                    _ => return Err(invalid(key).into()),
                };
            }
            _ => {
                return Err(ConfigError::InvalidValue(format!("unknown key: {}", key)).into());
            }
        }
        self.validate()
    }
}

impl std::fmt::Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Wiseplate Configuration")?;
        writeln!(f, "=======================")?;
        writeln!(f)?;
        writeln!(f, "Models dir:         {}", self.models_dir.display())?;
        writeln!(f, "Input dir:          {}", self.input_dir.display())?;
        writeln!(f, "Output dir:         {}", self.output_dir.display())?;
        writeln!(
            f,
            "Store dir:          {}",
            self.store_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "(error)".to_string())
        )?;
        writeln!(f, "Plate classes:      {}", self.plate_class_names.join(", "))?;
        writeln!(
            f,
            "Detection:          input {} / conf {} / iou {}",
            self.detection.input_size,
            self.detection.confidence_threshold,
            self.detection.iou_threshold
        )?;
        writeln!(f, "Classifier input:   {}", self.classifier_input_size)?;
        writeln!(f, "Statistics source:  {}", self.statistics_source)?;
        writeln!(f, "Remove input:       {}", self.remove_input_after_run)?;
        writeln!(f, "Output format:      {}", self.output_format)?;

        if let Ok(path) = Self::config_path() {
            writeln!(f)?;
            writeln!(f, "Config file:        {}", path.display())?;
        }

        Ok(())
    }
}
