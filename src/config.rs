//! Configuration file support.
//!
//! Two documents live here: the application configuration (preferences plus
//! an optional label set), persisted in the platform config directory, and
//! the standalone label document that can be exported and imported.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::color_utils::{format_hex, parse_hex};
use crate::constants::{
    BOUNDARY_ID, DEFAULT_ALPHA, DEFAULT_MASK_EXTENSION, DEFAULT_MAX_HISTORY, DEFAULT_PEN_SIZE,
    DEFAULT_SCALE,
};
use crate::model::{LabelId, LabelInfo, LabelPalette, PaletteError};

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Version of the configuration file format
    pub version: u32,

    /// User preferences
    #[serde(default)]
    pub preferences: UserPreferences,

    /// Label set; `None` selects the built-in labels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<LabelDocument>,
}

/// User preferences section of the config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    /// Pen diameter in mask pixels; 0 paints single pixels
    #[serde(default = "default_pen_size")]
    pub pen_size: u32,

    /// Opacity of the color overlay in previews
    #[serde(default = "default_alpha")]
    pub alpha: f32,

    /// View scale factor
    #[serde(default = "default_scale")]
    pub scale: f64,

    /// Fold watershed lines into neighboring regions after refinement
    #[serde(default = "default_remove_border")]
    pub remove_border: bool,

    /// Snapshots kept per session
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Extension of written mask files
    #[serde(default = "default_mask_extension")]
    pub mask_extension: String,

    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_pen_size() -> u32 {
    DEFAULT_PEN_SIZE
}

fn default_alpha() -> f32 {
    DEFAULT_ALPHA
}

fn default_scale() -> f64 {
    DEFAULT_SCALE
}

fn default_remove_border() -> bool {
    true
}

fn default_max_history() -> usize {
    DEFAULT_MAX_HISTORY
}

fn default_mask_extension() -> String {
    DEFAULT_MASK_EXTENSION.to_string()
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            pen_size: default_pen_size(),
            alpha: default_alpha(),
            scale: default_scale(),
            remove_border: default_remove_border(),
            max_history: default_max_history(),
            mask_extension: default_mask_extension(),
            log_level: LogLevel::default(),
        }
    }
}

/// One label as stored in a label document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelRecord {
    pub name: String,
    pub category: String,
    /// Kept wide so out-of-range ids are reported instead of failing to parse
    pub id: i64,
    pub category_id: i32,
    /// `#rrggbb`
    pub color_hex: String,
}

impl From<&LabelInfo> for LabelRecord {
    fn from(label: &LabelInfo) -> Self {
        Self {
            name: label.name.clone(),
            category: label.category.clone(),
            id: i64::from(label.id),
            category_id: label.category_id,
            color_hex: format_hex(label.color),
        }
    }
}

impl LabelRecord {
    fn to_label(&self) -> Result<LabelInfo, ConfigError> {
        let id = LabelId::try_from(self.id)
            .ok()
            .filter(|&id| id != BOUNDARY_ID)
            .ok_or(PaletteError::IdOutOfRange { id: self.id })?;
        let color = parse_hex(&self.color_hex).ok_or_else(|| ConfigError::InvalidColor {
            label: self.name.clone(),
            value: self.color_hex.clone(),
        })?;
        Ok(LabelInfo::new(
            id,
            &self.name,
            &self.category,
            self.category_id,
            color,
        ))
    }
}

/// Label configuration document: `{ "labels": [ ... ] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelDocument {
    pub labels: Vec<LabelRecord>,
}

impl LabelDocument {
    /// Serialize a palette, labels in name order.
    pub fn from_palette(palette: &LabelPalette) -> Self {
        Self {
            labels: palette.labels().map(LabelRecord::from).collect(),
        }
    }

    /// Build a fresh palette from the document.
    ///
    /// The first invalid record aborts the conversion; nothing is returned
    /// half-built, so a caller's current palette stays as it was.
    pub fn to_palette(&self) -> Result<LabelPalette, ConfigError> {
        let labels = self
            .labels
            .iter()
            .map(LabelRecord::to_label)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LabelPalette::from_labels(labels)?)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a document from disk.
    pub fn read_from(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let doc = Self::from_json(&json)?;
        log::info!("Read {} label(s) from {:?}", doc.labels.len(), path);
        Ok(doc)
    }

    /// Write the document to disk, creating parent directories.
    pub fn write_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        log::info!("Wrote {} label(s) to {:?}", self.labels.len(), path);
        Ok(())
    }
}

impl AppConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            preferences: UserPreferences::default(),
            labels: None,
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        // Validate version compatibility
        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        Ok(config)
    }

    /// The configured palette, or the built-in labels when none is set.
    pub fn palette(&self) -> Result<LabelPalette, ConfigError> {
        match &self.labels {
            Some(doc) => doc.to_palette(),
            None => Ok(LabelPalette::default_labels()),
        }
    }

    /// Get the default filename for the config file.
    pub fn default_filename() -> &'static str {
        "labelmask-config.json"
    }

    /// Get the default config file path for auto-load/save.
    pub fn default_path() -> Option<PathBuf> {
        // Try to use XDG config directory, fall back to home directory
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("labelmask").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home_dir| {
                home_dir
                    .join(".config")
                    .join("labelmask")
                    .join(Self::default_filename())
            })
        }
    }

    /// Load configuration from a file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to a file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = self.to_json()?;
        std::fs::write(path, json)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Try to load configuration from the default path.
    /// Returns None if the file doesn't exist or can't be read.
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return None;
        }

        match Self::load_from(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Failed to load config file {:?}: {}", path, e);
                None
            }
        }
    }

    /// Save configuration to the default path.
    pub fn save_to_default_path(&self) -> Result<(), ConfigError> {
        let path = Self::default_path().ok_or_else(|| {
            ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine config directory",
            ))
        })?;
        self.save_to(&path)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration or label documents.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A label color is not a `#rrggbb` string
    #[error("Label '{label}' has invalid color '{value}'")]
    InvalidColor { label: String, value: String },

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// The labels do not form a valid palette
    #[error("Invalid label set: {0}")]
    Palette(#[from] PaletteError),

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
