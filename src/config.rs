//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::dshot::encoder::EncoderConfig;
use crate::dshot::protocol::DSHOT_THROTTLE_MAX;
use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_encoder")]
    pub encoder: EncoderConfig,
    pub serial: SerialConfig,
    pub motors: MotorConfig,
    pub ramp: RampConfig,
    pub frame_log: FrameLogConfig,
    pub logging: LoggingConfig,
}

/// Pulse bridge serial link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Motor channel configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MotorConfig {
    #[serde(default = "default_channels")]
    pub channels: Vec<u8>,
}

/// Arming and throttle ramp configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RampConfig {
    #[serde(default = "default_arm_duration_ms")]
    pub arm_duration_ms: u64,

    #[serde(default = "default_ramp_start")]
    pub start: u16,

    #[serde(default = "default_ramp_end")]
    pub end: u16,

    #[serde(default = "default_ramp_step")]
    pub step: u16,

    #[serde(default = "default_step_interval_ms")]
    pub step_interval_ms: u64,

    #[serde(default)]
    pub telemetry_request: bool,
}

/// Transmitted frame log configuration
#[derive(Debug, Deserialize, Clone)]
pub struct FrameLogConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_frame_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,
}

/// Diagnostic logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write a daily rolling log file here in addition to stdout
    #[serde(default)]
    pub log_dir: Option<String>,
}

// Default value functions
fn default_encoder() -> EncoderConfig {
    EncoderConfig::new(default_resolution_hz(), default_bit_rate_hz(), default_post_delay_us())
}
fn default_resolution_hz() -> u32 { 40_000_000 }
fn default_bit_rate_hz() -> u32 { 600_000 }
fn default_post_delay_us() -> u32 { 50 }

fn default_serial_port() -> String { "/dev/ttyACM0".to_string() }
fn default_baud_rate() -> u32 { 921_600 }
fn default_timeout_ms() -> u64 { 100 }

fn default_channels() -> Vec<u8> { vec![0, 1, 2, 3] }

fn default_arm_duration_ms() -> u64 { 5000 }
fn default_ramp_start() -> u16 { 100 }
fn default_ramp_end() -> u16 { 1000 }
fn default_ramp_step() -> u16 { 10 }
fn default_step_interval_ms() -> u64 { 1000 }

fn default_frame_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }

fn default_log_level() -> String { "info".to_string() }

/// Baud rates the pulse bridge firmware accepts
const SUPPORTED_BAUD_RATES: [u32; 5] = [115_200, 230_400, 460_800, 921_600, 2_000_000];

/// Accepted tracing levels
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dshot_esc::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// Encoder timing is checked when the encoders are built; this only
    /// rejects values that are out of range on their own.
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.encoder.resolution_hz == 0 {
            return Err(crate::error::DshotEscError::Config(
                toml::de::Error::custom("resolution_hz must be greater than 0")
            ));
        }

        if self.encoder.bit_rate_hz == 0 || self.encoder.bit_rate_hz > self.encoder.resolution_hz {
            return Err(crate::error::DshotEscError::Config(
                toml::de::Error::custom("bit_rate_hz must be between 1 and resolution_hz")
            ));
        }

        if self.encoder.post_delay_us == 0 {
            return Err(crate::error::DshotEscError::Config(
                toml::de::Error::custom("post_delay_us must be greater than 0")
            ));
        }

        // Validate serial configuration
        if self.serial.port.is_empty() {
            return Err(crate::error::DshotEscError::Config(
                toml::de::Error::custom("serial port cannot be empty")
            ));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(crate::error::DshotEscError::Config(
                toml::de::Error::custom(format!(
                    "baud_rate must be one of: {:?}",
                    SUPPORTED_BAUD_RATES
                ))
            ));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10000 {
            return Err(crate::error::DshotEscError::Config(
                toml::de::Error::custom("timeout_ms must be between 1 and 10000")
            ));
        }

        // Validate motor channels
        if self.motors.channels.is_empty() {
            return Err(crate::error::DshotEscError::Config(
                toml::de::Error::custom("at least one motor channel is required")
            ));
        }

        for (index, channel) in self.motors.channels.iter().enumerate() {
            if self.motors.channels[..index].contains(channel) {
                return Err(crate::error::DshotEscError::Config(
                    toml::de::Error::custom(format!("motor channel {} is listed more than once", channel))
                ));
            }
        }

        // Validate ramp
        if self.ramp.step == 0 {
            return Err(crate::error::DshotEscError::Config(
                toml::de::Error::custom("ramp step must be greater than 0")
            ));
        }

        if self.ramp.start >= self.ramp.end {
            return Err(crate::error::DshotEscError::Config(
                toml::de::Error::custom("ramp start must be less than ramp end")
            ));
        }

        if self.ramp.end > DSHOT_THROTTLE_MAX + 1 {
            return Err(crate::error::DshotEscError::Config(
                toml::de::Error::custom("ramp end must be at most 2048")
            ));
        }

        if self.ramp.step_interval_ms == 0 || self.ramp.step_interval_ms > 60000 {
            return Err(crate::error::DshotEscError::Config(
                toml::de::Error::custom("step_interval_ms must be between 1 and 60000")
            ));
        }

        if self.ramp.arm_duration_ms > 60000 {
            return Err(crate::error::DshotEscError::Config(
                toml::de::Error::custom("arm_duration_ms must be at most 60000")
            ));
        }

        // Validate frame log
        if self.frame_log.enabled && self.frame_log.log_dir.is_empty() {
            return Err(crate::error::DshotEscError::Config(
                toml::de::Error::custom("frame_log log_dir cannot be empty when enabled")
            ));
        }

        if self.frame_log.max_records_per_file == 0 {
            return Err(crate::error::DshotEscError::Config(
                toml::de::Error::custom("max_records_per_file must be greater than 0")
            ));
        }

        if self.frame_log.max_files_to_keep == 0 {
            return Err(crate::error::DshotEscError::Config(
                toml::de::Error::custom("max_files_to_keep must be greater than 0")
            ));
        }

        // Validate logging
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(crate::error::DshotEscError::Config(
                toml::de::Error::custom("log level must be one of: trace, debug, info, warn, error")
            ));
        }

        Ok(())
    }
}
