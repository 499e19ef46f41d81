//! Configuration structures for the ladder engine.
//!
//! Supports TOML deserialization with defaults sized for a small
//! machine-control program.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default bound on jump transitions executed within one scan cycle.
pub const DEFAULT_MAX_JUMPS_PER_CYCLE: u32 = 99_999;

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Period of the scan loop.
    #[serde(with = "humantime_serde")]
    pub cycle_time: Duration,

    /// Overrun above the period tolerated before it is logged as an error.
    #[serde(with = "humantime_serde")]
    pub max_overrun: Duration,

    /// Jump transitions allowed in one cycle before the engine is stopped.
    pub max_jumps_per_cycle: u32,

    /// Capacities of the engine tables and of the in-memory variable store.
    pub sizes: TableSizes,

    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cycle_time: Duration::from_millis(10),
            max_overrun: Duration::from_millis(5),
            max_jumps_per_cycle: DEFAULT_MAX_JUMPS_PER_CYCLE,
            sizes: TableSizes::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Fixed capacities, allocated once at engine init.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSizes {
    /// Rung table size (shared by all sections).
    pub rungs: usize,
    /// Section table size.
    pub sections: usize,
    /// Counter blocks.
    pub counters: usize,
    /// Multi-mode timer blocks.
    pub timers: usize,
    /// Compare/Operate expression slots.
    pub arithm_exprs: usize,
    /// Memory bits (%B).
    pub bits: usize,
    /// Memory words (%W).
    pub words: usize,
    /// Physical inputs (%I).
    pub phys_inputs: usize,
    /// Physical outputs (%Q).
    pub phys_outputs: usize,
    /// Step activity bits (%X).
    pub steps: usize,
}

impl Default for TableSizes {
    fn default() -> Self {
        Self {
            rungs: 100,
            sections: 10,
            counters: 50,
            timers: 50,
            arithm_exprs: 100,
            bits: 500,
            words: 100,
            phys_inputs: 50,
            phys_outputs: 50,
            steps: 100,
        }
    }
}

/// Metrics and diagnostics configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Size of the cycle-duration ring buffer.
    pub histogram_size: usize,

    /// Capacity of the fault event log.
    pub fault_log_size: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            histogram_size: 1_000,
            fault_log_size: 64,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
