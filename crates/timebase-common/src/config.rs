//! Configuration structures for the time-sync daemon.
//!
//! Supports TOML deserialization with sensible defaults for development
//! and explicit values for deployment on the robot.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level time-sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimesyncConfig {
    /// Time-broadcast publisher settings.
    pub broadcast: BroadcastConfig,

    /// Message-bus collaborator settings.
    pub bus: BusConfig,

    /// Serial device bring-up settings (optional).
    pub serial: SerialConfig,

    /// Pacing metrics settings.
    pub metrics: MetricsConfig,
}

impl Default for TimesyncConfig {
    fn default() -> Self {
        Self {
            broadcast: BroadcastConfig::default(),
            bus: BusConfig::default(),
            serial: SerialConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Time-broadcast publisher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Well-known channel the time samples are published on.
    pub channel: String,

    /// Inter-sample interval (default 1 s = 1 Hz).
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Maximum cycles to run (0 = run until shutdown).
    pub max_cycles: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            channel: String::from("MBOT_TIMESYNC"),
            interval: Duration::from_secs(1),
            max_cycles: 0,
        }
    }
}

/// Supported message-bus transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BusDriver {
    /// In-memory bus for testing and bench runs.
    #[default]
    Simulated,
    /// LCM UDP-multicast transport (external collaborator).
    Lcm,
}

/// Message-bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Which transport to publish through.
    pub driver: BusDriver,

    /// Multicast URL for the LCM transport, if used.
    pub multicast_url: Option<String>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            driver: BusDriver::Simulated,
            multicast_url: None,
        }
    }
}

/// Parity setting for the serial collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    /// No parity bit.
    #[default]
    None,
    /// Even parity.
    Even,
    /// Odd parity.
    Odd,
}

/// Flow-control kinds the serial collaborator can enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowControl {
    /// Hardware CTS/RTS flow control.
    RtsCts,
    /// Software XON/XOFF flow control.
    XonXoff,
}

/// Serial device bring-up configuration.
///
/// The subsystem only configures the port (open, mode, baud, flow
/// control, close); it never drives the data path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path (e.g., "/dev/ttyACM0"). `None` skips serial bring-up.
    pub port: Option<PathBuf>,

    /// Baud rate.
    pub baud: u32,

    /// Open the port for blocking reads.
    pub blocking: bool,

    /// Data bits (5-8).
    pub databits: u8,

    /// Parity.
    pub parity: Parity,

    /// Stop bits (1 or 2).
    pub stopbits: u8,

    /// Optional flow control to enable after open.
    pub flow_control: Option<FlowControl>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: 115_200,
            blocking: true,
            databits: 8,
            parity: Parity::None,
            stopbits: 1,
            flow_control: None,
        }
    }
}

/// Pacing metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable metrics collection.
    pub enabled: bool,

    /// Size of the period histogram ring buffer.
    pub histogram_size: usize,

    /// Percentiles reported in the shutdown summary.
    pub percentiles: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            histogram_size: 1_024,
            percentiles: vec![50.0, 90.0, 99.0],
        }
    }
}

impl TimesyncConfig {
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

    /// Serialize configuration to a TOML string.
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
