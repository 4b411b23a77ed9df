use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use habit_sync::models::VolumeUnit;
use habit_sync::store::RollbackPolicy;

/// Default daily water goal, in fluid ounces.
const DEFAULT_WATER_GOAL_OZ: f64 = 64.0;
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Remote store connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL (e.g., "http://localhost:8080")
    pub url: Option<String>,
    /// API key sent as a bearer token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Whose records are read and written
    pub owner_id: ConfigValue<Option<String>>,
    /// Unit used for display and for `water add` without `--unit`
    pub volume_unit: ConfigValue<VolumeUnit>,
    /// Daily water goal in `volume_unit`
    pub water_goal: ConfigValue<f64>,
    /// How a failed delete is undone
    pub rollback: ConfigValue<RollbackPolicy>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    pub server: ServerConfig,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    owner_id: Option<String>,
    volume_unit: Option<VolumeUnit>,
    water_goal: Option<f64>,
    rollback: Option<RollbackPolicy>,
    server: Option<ServerConfig>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut owner_id = ConfigValue::new(None, ConfigSource::Default);
        let mut volume_unit = ConfigValue::new(VolumeUnit::default(), ConfigSource::Default);
        let mut water_goal = ConfigValue::new(DEFAULT_WATER_GOAL_OZ, ConfigSource::Default);
        let mut rollback = ConfigValue::new(RollbackPolicy::default(), ConfigSource::Default);
        let mut config_file = None;
        let mut server = ServerConfig::default();

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(owner) = file_config.owner_id {
                owner_id = ConfigValue::new(Some(owner), ConfigSource::File);
            }
            if let Some(unit) = file_config.volume_unit {
                volume_unit = ConfigValue::new(unit, ConfigSource::File);
            }
            if let Some(goal) = file_config.water_goal {
                water_goal = ConfigValue::new(goal, ConfigSource::File);
            }
            if let Some(policy) = file_config.rollback {
                rollback = ConfigValue::new(policy, ConfigSource::File);
            }
            if let Some(server_config) = file_config.server {
                server = server_config;
            }
        }

        // Apply environment variable overrides
        if let Ok(owner) = std::env::var("HABIT_OWNER_ID") {
            owner_id = ConfigValue::new(Some(owner), ConfigSource::Environment);
        }
        if let Ok(unit) = std::env::var("HABIT_VOLUME_UNIT") {
            let unit = unit
                .parse()
                .map_err(|e: String| ConfigError::InvalidEnv("HABIT_VOLUME_UNIT", e))?;
            volume_unit = ConfigValue::new(unit, ConfigSource::Environment);
        }
        if let Ok(goal) = std::env::var("HABIT_WATER_GOAL") {
            let goal = goal.parse().map_err(|e: std::num::ParseFloatError| {
                ConfigError::InvalidEnv("HABIT_WATER_GOAL", e.to_string())
            })?;
            water_goal = ConfigValue::new(goal, ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("HABIT_SERVER_URL") {
            server.url = Some(url);
        }
        if let Ok(key) = std::env::var("HABIT_API_KEY") {
            server.api_key = Some(key);
        }

        Ok(Self {
            owner_id,
            volume_unit,
            water_goal,
            rollback,
            config_file,
            server,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/habit/
    /// - macOS: ~/Library/Application Support/habit/
    /// - Windows: %APPDATA%/habit/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("habit")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidEnv(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidEnv(var, e) => {
                write!(f, "Invalid value in {}: {}", var, e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
