//! # Error Types
//!
//! Custom error types for the DShot ESC driver using `thiserror`.

use thiserror::Error;

/// Main error type for the DShot ESC driver
#[derive(Debug, Error)]
pub enum DshotEscError {
    /// Encoder timing cannot be represented at the requested tick resolution
    #[error("Encoder configuration error: {0}")]
    Configuration(String),

    /// Throttle value outside the 11-bit DShot range
    #[error("Invalid throttle value {0} (must be 0-2047)")]
    InvalidThrottle(u16),

    /// Frame checksum does not match its payload
    #[error("Frame checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// Symbol that matches neither the logical-0 nor the logical-1 timing
    #[error("Malformed symbol at bit {0}")]
    MalformedSymbol(usize),

    /// Reserved throttle value (0-47) with no assigned special command
    #[error("Unknown special command code {0}")]
    UnknownCommand(u16),

    /// Motor channel listed more than once
    #[error("Duplicate motor channel {0}")]
    DuplicateChannel(u8),

    /// Motor channel not present in the bank
    #[error("Unknown motor channel {0}")]
    UnknownChannel(u8),

    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Serial pulse bridge errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// No pulse bridge found on any candidate path
    #[error("No pulse bridge device found (tried: {0})")]
    SerialPortNotFound(String),

    /// Frame log serialization errors
    #[error("Frame log error: {0}")]
    FrameLog(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the DShot ESC driver
pub type Result<T> = std::result::Result<T, DshotEscError>;
