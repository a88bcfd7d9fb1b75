//! P2MP CLI Library
//!
//! Shared functionality for the p2mp command-line tools.

pub mod config;
pub mod exit;
pub mod stats;

pub use config::{Config, ConfigError, ReceiverConfig, SenderConfig};
pub use stats::{display_transfer_stats, format_bytes, format_duration};
