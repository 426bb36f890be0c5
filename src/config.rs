//! Configuration file support for the well annotator.
//!
//! Holds user preferences and the label vocabulary, so different experiment
//! types can ship their own set of well-quality labels.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::{Label, LabelCode, LabelVocabulary, default_labels};
use crate::store::AutoSaveManager;

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
    pub fn to_level_filter(&self) -> log::LevelFilter {
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

/// Annotator configuration, stored as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatorConfig {
    /// Version of the configuration file format
    pub version: u32,

    /// Application name (for identification)
    #[serde(default = "default_app_name")]
    pub app_name: String,

    #[serde(default)]
    pub preferences: UserPreferences,

    /// Label vocabulary offered to the annotator
    #[serde(default = "default_label_configs")]
    pub labels: Vec<LabelConfig>,

    /// Code the classifier promotes wells to
    #[serde(default = "default_good_label")]
    pub good_label: LabelCode,
}

fn default_app_name() -> String {
    "well-annotator".to_string()
}

fn default_label_configs() -> Vec<LabelConfig> {
    default_labels().iter().map(LabelConfig::from).collect()
}

fn default_good_label() -> LabelCode {
    1
}

/// User preferences section of the config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreferences {
    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Frames sampled from each video
    #[serde(default = "default_frames_to_read")]
    pub frames_to_read: usize,

    /// Only discover pre-stimulus recordings
    #[serde(default = "default_prestim_only")]
    pub prestim_only: bool,

    /// Minimum seconds between autosaves, 0 disables autosave
    #[serde(default = "default_autosave_interval")]
    pub autosave_interval_secs: u64,

    /// Seconds without edits before an autosave may happen
    #[serde(default = "default_autosave_debounce")]
    pub autosave_debounce_secs: u64,

    /// Pending edits that force an autosave without waiting for a pause, 0 for no limit
    #[serde(default = "default_autosave_edit_limit")]
    pub autosave_edit_limit: usize,
}

fn default_frames_to_read() -> usize {
    crate::constants::DEFAULT_FRAMES_TO_READ
}

fn default_prestim_only() -> bool {
    true
}

fn default_autosave_interval() -> u64 {
    60
}

fn default_autosave_debounce() -> u64 {
    5
}

fn default_autosave_edit_limit() -> usize {
    AutoSaveManager::DEFAULT_EDIT_LIMIT
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            frames_to_read: default_frames_to_read(),
            prestim_only: default_prestim_only(),
            autosave_interval_secs: default_autosave_interval(),
            autosave_debounce_secs: default_autosave_debounce(),
            autosave_edit_limit: default_autosave_edit_limit(),
        }
    }
}

/// Label configuration for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    /// Code written to the store
    pub code: LabelCode,
    /// Display name of the label
    pub name: String,
    /// RGB color of the label's indicator
    pub color: [u8; 3],
}

impl From<&Label> for LabelConfig {
    fn from(label: &Label) -> Self {
        Self {
            code: label.code,
            name: label.name.clone(),
            color: label.color,
        }
    }
}

impl From<&LabelConfig> for Label {
    fn from(config: &LabelConfig) -> Self {
        Label::new(config.code, &config.name, config.color)
    }
}

impl AnnotatorConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            app_name: default_app_name(),
            preferences: UserPreferences::default(),
            labels: default_label_configs(),
            good_label: default_good_label(),
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        config.vocabulary()?;

        Ok(config)
    }

    /// The validated label vocabulary.
    pub fn vocabulary(&self) -> Result<LabelVocabulary, ConfigError> {
        let labels = self.labels.iter().map(Label::from).collect();
        LabelVocabulary::new(labels, self.good_label).map_err(ConfigError::InvalidLabels)
    }

    /// Autosave policy from the preferences.
    pub fn autosave(&self) -> AutoSaveManager {
        let prefs = &self.preferences;
        if prefs.autosave_interval_secs == 0 {
            return AutoSaveManager::disabled();
        }
        AutoSaveManager::new()
            .with_save_interval(Duration::from_secs(prefs.autosave_interval_secs))
            .with_debounce_delay(Duration::from_secs(prefs.autosave_debounce_secs))
            .with_edit_limit(prefs.autosave_edit_limit)
    }

    /// Get the default filename for the config file.
    pub fn default_filename() -> &'static str {
        "well-annotator-config.json"
    }

    /// Get the default config file path for auto-load/save.
    pub fn default_path() -> Option<PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("well-annotator").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home_dir| {
                home_dir
                    .join(".config")
                    .join("well-annotator")
                    .join(Self::default_filename())
            })
        }
    }

    /// Try to load configuration from a file.
    /// Returns None if the file doesn't exist or can't be used.
    pub fn load_from(path: &Path) -> Option<Self> {
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return None;
        }

        match std::fs::read_to_string(path) {
            Ok(json) => match Self::from_json(&json) {
                Ok(config) => {
                    log::info!("Loaded configuration from {:?}", path);
                    Some(config)
                }
                Err(e) => {
                    log::warn!("Failed to parse config file {:?}: {}", path, e);
                    None
                }
            },
            Err(e) => {
                log::warn!("Failed to read config file {:?}: {}", path, e);
                None
            }
        }
    }

    /// Load from `path` (or the default location), falling back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::default_path(),
        };
        path.and_then(|p| Self::load_from(&p)).unwrap_or_default()
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
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    #[error("Invalid label vocabulary: {0}")]
    InvalidLabels(String),

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
