//! Error types for netpulse

use std::io;
use thiserror::Error;

/// Result type alias for netpulse operations
pub type Result<T> = std::result::Result<T, NetPulseError>;

/// Main error type for the connectivity monitor
#[derive(Error, Debug)]
pub enum NetPulseError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Network error (provider lookups, throughput measurement)
    #[error("Network error: {0}")]
    Network(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Alert delivery error
    #[error("Alert delivery error: {0}")]
    Alert(String),

    /// Command failed
    #[error("Command failed: {0}")]
    Command(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}
