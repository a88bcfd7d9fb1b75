//! Configuration file support for the p2mp CLI tools
//!
//! Everything here is also settable from the command line; a config file
//! exists for repeated runs against the same destination set.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

/// Sender configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderConfig {
    /// Input file to transfer
    pub file: String,
    /// Destination hosts (names or addresses, without port)
    pub hosts: Vec<String>,
    /// Destination port, shared by all hosts
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum segment size in bytes
    #[serde(default = "default_mss")]
    pub mss: usize,
    /// Ack wait per attempt in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Statistics interval in seconds (0 disables the stats thread)
    #[serde(default)]
    pub stats_interval_secs: u64,
}

/// Receiver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// Output file path
    pub output: String,
    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Artificial loss probability in [0, 1]
    #[serde(default)]
    pub loss_probability: f64,
    /// Explicit bind address; discovered from the interface table if unset
    pub bind: Option<IpAddr>,
}

fn default_port() -> u16 {
    7735
}

fn default_mss() -> usize {
    p2mp_protocol::DEFAULT_MSS
}

fn default_timeout_ms() -> u64 {
    p2mp_protocol::DEFAULT_ACK_TIMEOUT_MS
}

/// Combined configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Sender configuration
    pub sender: Option<SenderConfig>,
    /// Receiver configuration
    pub receiver: Option<ReceiverConfig>,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Create example sender configuration
    pub fn example_sender() -> Self {
        Config {
            sender: Some(SenderConfig {
                file: "payload.bin".to_string(),
                hosts: vec!["192.168.1.10".to_string(), "192.168.1.11".to_string()],
                port: 7735,
                mss: p2mp_protocol::DEFAULT_MSS,
                timeout_ms: p2mp_protocol::DEFAULT_ACK_TIMEOUT_MS,
                stats_interval_secs: 1,
            }),
            receiver: None,
        }
    }

    /// Create example receiver configuration
    pub fn example_receiver() -> Self {
        Config {
            sender: None,
            receiver: Some(ReceiverConfig {
                output: "payload.bin".to_string(),
                port: 7735,
                loss_probability: 0.05,
                bind: None,
            }),
        }
    }
}

impl SenderConfig {
    /// Get ack timeout as Duration
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get statistics interval as Duration
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
