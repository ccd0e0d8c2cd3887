use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::model::{Temperature, Vendor};
use crate::APP_NAME;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no platform config directory available")]
    NoConfigDir,
    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Every section falls back to its defaults, so a partial file merges over them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub discord: DiscordConfig,
    pub foldingathome: FahConfig,
    pub temperature: TemperatureConfig,
    pub hardware: HardwareConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub client_id: String,
    pub large_image: String,
    pub buttons: Vec<Button>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub url: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            client_id: "1457701520673079501".to_string(),
            large_image: "folding-at-home-logo".to_string(),
            buttons: vec![
                Button {
                    label: "Start Folding".to_string(),
                    url: "https://foldingathome.org/start-folding/".to_string(),
                },
                Button {
                    label: "GitHub".to_string(),
                    url: "https://github.com/Bandokii/FAHRPC".to_string(),
                },
            ],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FahConfig {
    pub web_url: String,
    pub stats_url: String,
    /// Seconds between ticks.
    pub update_interval: u64,
    /// Seconds a successful stats fetch is reused.
    pub stats_cache_ttl: u64,
    pub control_timeout_ms: u64,
    pub stats_timeout_ms: u64,
    /// How pages are loaded. Both Folding@home pages are built by JavaScript.
    pub renderer: Renderer,
    /// Chrome or Chromium binary; searched on `PATH` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_path: Option<String>,
}

/// Page loading strategy for the control and stats pages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Renderer {
    /// Headless Chromium; sees the page after its scripts ran.
    #[default]
    Browser,
    /// Plain HTTP GET; only for servers that deliver finished markup.
    Http,
}

impl Default for FahConfig {
    fn default() -> Self {
        Self {
            web_url: "http://localhost:7396/".to_string(),
            stats_url: "https://v8-5.foldingathome.org/stats".to_string(),
            update_interval: 15,
            stats_cache_ttl: 300,
            control_timeout_ms: 8_000,
            stats_timeout_ms: 10_000,
            renderer: Renderer::Browser,
            browser_path: None,
        }
    }
}

impl FahConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval)
    }

    pub fn stats_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.stats_cache_ttl)
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_millis(self.control_timeout_ms)
    }

    pub fn stats_timeout(&self) -> Duration {
        Duration::from_millis(self.stats_timeout_ms)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub low: u32,
    pub medium: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemperatureLabels {
    pub low: String,
    pub medium: String,
    pub high: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemperatureLevel {
    Low,
    Medium,
    High,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemperatureConfig {
    pub thresholds: Thresholds,
    pub labels: TemperatureLabels,
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds { low: 65, medium: 75 },
            labels: TemperatureLabels {
                low: "cool".to_string(),
                medium: "warm".to_string(),
                high: "hot".to_string(),
            },
        }
    }
}

impl TemperatureConfig {
    pub fn classify(&self, temperature: Temperature) -> Option<TemperatureLevel> {
        let t = temperature.celsius()?;
        Some(if t < self.thresholds.low {
            TemperatureLevel::Low
        } else if t < self.thresholds.medium {
            TemperatureLevel::Medium
        } else {
            TemperatureLevel::High
        })
    }

    pub fn label(&self, level: TemperatureLevel) -> &str {
        match level {
            TemperatureLevel::Low => &self.labels.low,
            TemperatureLevel::Medium => &self.labels.medium,
            TemperatureLevel::High => &self.labels.high,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub nvidia: VendorConfig,
    pub amd: VendorConfig,
}

impl HardwareConfig {
    pub fn vendor(&self, vendor: Vendor) -> &VendorConfig {
        match vendor {
            Vendor::Nvidia => &self.nvidia,
            Vendor::Amd => &self.amd,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VendorConfig {
    pub enabled: bool,
    /// Marketing prefix removed from device names. Unset means the vendor default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strip_prefix: Option<String>,
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strip_prefix: None,
        }
    }
}

impl VendorConfig {
    pub fn strip_prefix(&self, vendor: Vendor) -> &str {
        match (&self.strip_prefix, vendor) {
            (Some(prefix), _) => prefix,
            (None, Vendor::Nvidia) => "NVIDIA GeForce ",
            (None, Vendor::Amd) => "AMD Radeon ",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    pub file_enabled: bool,
    pub file_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_enabled: true,
            file_name: format!("{APP_NAME}.log"),
        }
    }
}

/// How the active configuration was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    /// No file existed; defaults were written.
    Created,
    /// The file could not be parsed; defaults are in use and the file is untouched.
    Fallback { error: String },
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub path: PathBuf,
    pub source: ConfigSource,
}

impl Config {
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(base.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for the log file: next to the config file.
    pub fn data_dir(config_path: &Path) -> PathBuf {
        config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Strict load: the file must exist and parse.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&s).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the file, writing defaults if it is missing and falling back to
    /// defaults if it cannot be parsed. The result is always validated.
    pub fn load_or_init(path: &Path) -> Result<LoadedConfig, ConfigError> {
        let (config, source) = if !path.exists() {
            let config = Config::default();
            config.save_to(path)?;
            (config, ConfigSource::Created)
        } else {
            match Config::load_from(path) {
                Ok(config) => (config, ConfigSource::File),
                Err(err @ ConfigError::Parse { .. }) => (
                    Config::default(),
                    ConfigSource::Fallback {
                        error: err.to_string(),
                    },
                ),
                Err(err) => return Err(err),
            }
        };
        config.validate()?;
        Ok(LoadedConfig {
            config,
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let s = toml::to_string_pretty(self)?;
        std::fs::write(path, s).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Collects every problem rather than stopping at the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        let id = self.discord.client_id.trim();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            errors.push(format!(
                "discord.client_id must be a numeric application id, got {:?}",
                self.discord.client_id
            ));
        }
        if self.discord.large_image.trim().is_empty() {
            errors.push("discord.large_image must not be empty".to_string());
        }
        if self.discord.buttons.len() > 2 {
            errors.push(format!(
                "discord.buttons allows at most 2 entries, got {}",
                self.discord.buttons.len()
            ));
        }
        for (i, button) in self.discord.buttons.iter().enumerate() {
            let label = button.label.trim();
            if label.is_empty() || label.chars().count() > 32 {
                errors.push(format!("discord.buttons[{i}].label must be 1-32 characters"));
            }
            if !is_http_url(&button.url) {
                errors.push(format!("discord.buttons[{i}].url must be an http(s) URL"));
            }
        }

        if !is_http_url(&self.foldingathome.web_url) {
            errors.push(format!(
                "foldingathome.web_url must be an http(s) URL, got {:?}",
                self.foldingathome.web_url
            ));
        }
        if !is_http_url(&self.foldingathome.stats_url) {
            errors.push(format!(
                "foldingathome.stats_url must be an http(s) URL, got {:?}",
                self.foldingathome.stats_url
            ));
        }
        if self.foldingathome.update_interval == 0 {
            errors.push("foldingathome.update_interval must be at least 1 second".to_string());
        }
        if self.foldingathome.control_timeout_ms == 0 || self.foldingathome.stats_timeout_ms == 0 {
            errors.push("foldingathome request timeouts must be positive".to_string());
        }

        let t = self.temperature.thresholds;
        if t.low >= t.medium {
            errors.push(format!(
                "temperature.thresholds.low ({}) must be below medium ({})",
                t.low, t.medium
            ));
        }

        if self.logging.file_enabled && self.logging.file_name.trim().is_empty() {
            errors.push("logging.file_name must not be empty when file logging is on".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

/// Expand a leading `~` in a user supplied path.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

fn is_http_url(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some_and(|host| !host.is_empty())
        }
        Err(_) => false,
    }
}
