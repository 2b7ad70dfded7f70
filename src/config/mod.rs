//! Configuration module
//!
//! Handles loading and saving Art Attack configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::protocol::{DEFAULT_MAX_FRAME_SIZE, DEFAULT_PORT};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Network settings
    #[serde(default)]
    pub network: NetworkConfig,

    /// Match settings
    #[serde(default)]
    pub game: GameSettings,
}

/// General configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
    /// Explicit tracing filter, e.g. "artattack=trace"
    pub log_filter: Option<String>,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Port to listen on or connect to
    #[serde(default = "default_port")]
    pub port: u16,
    /// Interface the host binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Connection timeout in ms
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// How often a waiting host checks for a stop request (ms)
    #[serde(default = "default_accept_poll")]
    pub accept_poll_ms: u64,
    /// How often a connected worker checks for a stop request (ms)
    #[serde(default = "default_io_poll")]
    pub io_poll_ms: u64,
    /// Largest frame accepted or sent
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_accept_poll() -> u64 {
    200
}

fn default_io_poll() -> u64 {
    20
}

fn default_max_frame_size() -> usize {
    DEFAULT_MAX_FRAME_SIZE
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            connect_timeout_ms: default_connect_timeout(),
            accept_poll_ms: default_accept_poll(),
            io_poll_ms: default_io_poll(),
            max_frame_size: default_max_frame_size(),
        }
    }
}

/// Match configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSettings {
    /// Painting both players copy (host's choice wins)
    #[serde(default = "default_painting")]
    pub painting: String,
    /// Length of a match in seconds
    #[serde(default = "default_time_limit")]
    pub time_limit_secs: u32,
    /// Countdown before play begins
    #[serde(default = "default_countdown")]
    pub countdown_secs: u32,
    /// Interval between POS broadcasts (ms)
    #[serde(default = "default_position_sync")]
    pub position_sync_ms: u64,
    /// Simulation updates per second
    #[serde(default = "default_tick_rate")]
    pub tick_rate: u32,
}

fn default_painting() -> String {
    "desert-island".to_string()
}

fn default_time_limit() -> u32 {
    120
}

fn default_countdown() -> u32 {
    3
}

fn default_position_sync() -> u64 {
    500
}

fn default_tick_rate() -> u32 {
    30
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            painting: default_painting(),
            time_limit_secs: default_time_limit(),
            countdown_secs: default_countdown(),
            position_sync_ms: default_position_sync(),
            tick_rate: default_tick_rate(),
        }
    }
}

impl GameSettings {
    /// Time between simulation updates
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate.max(1)))
    }

    pub fn position_sync_interval(&self) -> f32 {
        self.position_sync_ms as f32 / 1000.0
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("artattack/config.toml")),
            Some(PathBuf::from("./artattack.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                tracing::debug!("Loading config from {}", path.display());
                return Self::load(path);
            }
        }

        // Return default config if no file found
        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// The configuration as TOML text
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Tracing filter directive for this configuration
    pub fn log_filter(&self) -> String {
        match &self.general.log_filter {
            Some(filter) => filter.clone(),
            None if self.general.verbose => "debug".to_string(),
            None => "info".to_string(),
        }
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> ConfigResult<String> {
    let config = Config {
        general: GeneralConfig {
            verbose: false,
            log_filter: Some("artattack=debug".to_string()),
        },
        game: GameSettings {
            painting: "sunset".to_string(),
            time_limit_secs: 90,
            ..Default::default()
        },
        ..Default::default()
    };

    config.to_toml()
}
