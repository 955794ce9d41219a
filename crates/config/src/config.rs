//! Core configuration structures and loading logic

use crate::types::{Bitrate, Preset, Profile, Resolution, Tune};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
    /// Value outside its allowed range
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid config value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Watch-loop configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchConfig {
    /// Seconds between size checks while waiting for a new file to settle
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
    /// Give up waiting for stability after this many checks
    #[serde(default = "default_settle_max_checks")]
    pub settle_max_checks: u32,
    /// Capacity of the bounded event queue between watcher and worker
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_settle_secs() -> u64 {
    2
}

fn default_settle_max_checks() -> u32 {
    150
}

fn default_queue_capacity() -> usize {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            settle_secs: default_settle_secs(),
            settle_max_checks: default_settle_max_checks(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Encoding targets, fixed for the lifetime of the process
///
/// Everything here is optional or defaulted; a plan is derived from these
/// plus the probed source metadata for each file individually.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncodeTargets {
    /// Cap output at this resolution ("720p" or "1280x720"); never upscales
    pub resolution: Option<Resolution>,
    /// x264 speed preset
    #[serde(default)]
    pub preset: Preset,
    /// Constant-rate-factor quality (0-51, lower is higher fidelity)
    #[serde(default = "default_crf")]
    pub crf: u8,
    /// H.264 profile
    #[serde(default)]
    pub profile: Profile,
    /// Optional content tuning hint
    pub tune: Option<Tune>,
    /// Explicit max-bitrate override; derived from output height if absent
    pub maxrate: Option<Bitrate>,
    /// Explicit rate-control buffer override; 2x maxrate if absent
    pub bufsize: Option<Bitrate>,
}

fn default_crf() -> u8 {
    23
}

impl Default for EncodeTargets {
    fn default() -> Self {
        Self {
            resolution: None,
            preset: Preset::default(),
            crf: default_crf(),
            profile: Profile::default(),
            tune: None,
            maxrate: None,
            bufsize: None,
        }
    }
}

/// Status endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusConfig {
    /// Serve the local status endpoint (default false)
    #[serde(default)]
    pub enabled: bool,
    /// Port for the status endpoint
    #[serde(default = "default_status_port")]
    pub port: u16,
}

fn default_status_port() -> u16 {
    7878
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_status_port(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub encoding: EncodeTargets,
    #[serde(default)]
    pub status: StatusConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Parses the file and fills missing optional fields with defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - MKV2MP4_SETTLE_SECS -> watch.settle_secs
    /// - MKV2MP4_QUEUE_CAPACITY -> watch.queue_capacity
    /// - MKV2MP4_PRESET -> encoding.preset
    /// - MKV2MP4_CRF -> encoding.crf
    /// - MKV2MP4_STATUS_ENABLED -> status.enabled
    /// - MKV2MP4_STATUS_PORT -> status.port
    pub fn apply_env_overrides(&mut self) {
        // MKV2MP4_SETTLE_SECS
        if let Ok(val) = env::var("MKV2MP4_SETTLE_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                self.watch.settle_secs = secs;
            }
        }

        // MKV2MP4_QUEUE_CAPACITY
        if let Ok(val) = env::var("MKV2MP4_QUEUE_CAPACITY") {
            if let Ok(capacity) = val.parse::<usize>() {
                self.watch.queue_capacity = capacity;
            }
        }

        // MKV2MP4_PRESET
        if let Ok(val) = env::var("MKV2MP4_PRESET") {
            if let Ok(preset) = val.parse::<Preset>() {
                self.encoding.preset = preset;
            }
        }

        // MKV2MP4_CRF
        if let Ok(val) = env::var("MKV2MP4_CRF") {
            if let Ok(crf) = val.parse::<u8>() {
                self.encoding.crf = crf;
            }
        }

        // MKV2MP4_STATUS_ENABLED
        if let Ok(val) = env::var("MKV2MP4_STATUS_ENABLED") {
            // Accept "true", "1", "yes" as true; "false", "0", "no" as false
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" => self.status.enabled = true,
                "false" | "0" | "no" => self.status.enabled = false,
                _ => {} // Invalid value, keep existing
            }
        }

        // MKV2MP4_STATUS_PORT
        if let Ok(val) = env::var("MKV2MP4_STATUS_PORT") {
            if let Ok(port) = val.parse::<u16>() {
                self.status.port = port;
            }
        }
    }

    /// Range checks that cannot be expressed in the type system
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.encoding.crf > 51 {
            return Err(ConfigError::Invalid(format!(
                "crf must be between 0 and 51, got {}",
                self.encoding.crf
            )));
        }
        if self.watch.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.watch.settle_max_checks == 0 {
            return Err(ConfigError::Invalid(
                "settle_max_checks must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from file, apply environment overrides, validate
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}
