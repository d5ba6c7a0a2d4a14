//! Configuration for the proctoring core.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lowest accepted strike limit.
pub const MIN_WARNINGS: u32 = 1;

/// Highest accepted strike limit.
pub const MAX_WARNINGS: u32 = 10;

/// Detection sensitivity tier chosen per job/role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Sensitivity {
    Low,
    #[default]
    Medium,
    High,
}

impl Sensitivity {
    /// Parse a tier name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Sensitivity::Low),
            "medium" => Some(Sensitivity::Medium),
            "high" => Some(Sensitivity::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sensitivity::Low => write!(f, "Low"),
            Sensitivity::Medium => write!(f, "Medium"),
            Sensitivity::High => write!(f, "High"),
        }
    }
}

/// Main configuration for a proctored session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Strikes allowed before the session is terminated
    pub max_warnings: u32,

    /// Vision debounce tier
    pub sensitivity: Sensitivity,

    /// How long a fullscreen exit may last before it counts as a strike
    pub grace_ms: u64,

    /// Delay before silently re-requesting fullscreen after an exit
    pub reentry_delay_ms: u64,

    /// How long the "session locked" message stays up before the controller is told
    pub termination_delay_ms: u64,

    /// Minimum spacing between two counted strikes
    pub rate_limit_ms: u64,

    /// Path for the key-value store and ledger exports
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("proctor-sentinel");

        Self {
            max_warnings: 3,
            sensitivity: Sensitivity::Medium,
            grace_ms: 1500,
            reentry_delay_ms: 300,
            termination_delay_ms: 3000,
            rate_limit_ms: 2000,
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config.validated())
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("proctor-sentinel")
            .join("config.json")
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Clamp values that come from job settings into their accepted ranges.
    pub fn validated(mut self) -> Self {
        self.max_warnings = self.max_warnings.clamp(MIN_WARNINGS, MAX_WARNINGS);
        self
    }

    /// Path of the durable key-value store.
    pub fn store_path(&self) -> PathBuf {
        self.data_path.join("store.json")
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
