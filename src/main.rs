//! # DShot ESC
//!
//! Arms a set of ESCs and ramps their throttle through a serial pulse bridge.

use anyhow::{Context, Result};
use tokio::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

use dshot_esc::config::{Config, LoggingConfig};
use dshot_esc::dshot::protocol::Command;
use dshot_esc::frame_log::FrameLogger;
use dshot_esc::motors::MotorBank;
use dshot_esc::ramp::ThrottleRamp;
use dshot_esc::transmitter::{SerialPulseBridge, TransmitMode};

/// Configuration file used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// File name prefix for the rolling diagnostic log
const LOG_FILE_PREFIX: &str = "dshot-esc.log";

/// Main entry point for the DShot ESC driver
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, or `config/default.toml`)
///    - Set up logging with tracing subscriber
///    - Build one encoder per motor channel and open the pulse bridge
///
/// 2. **Arming**
///    - Loop zero throttle on every channel for `arm_duration_ms`
///
/// 3. **Ramp**
///    - Step throttle from `start` towards `end`, holding each value for
///      `step_interval_ms`; every frame is looped by the bridge until replaced
///    - After the last step, hold the final throttle until Ctrl+C
///
/// 4. **Shutdown**
///    - On Ctrl+C, loop zero throttle on every channel and exit
///
/// # Errors
///
/// Returns error if:
/// - The configuration cannot be loaded or the encoder timing is invalid
/// - The pulse bridge cannot be opened
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let _log_guard = init_logging(&config.logging);

    info!("DShot ESC v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut bank = MotorBank::new(config.encoder, &config.motors.channels)
        .context("Failed to create DShot encoders")?;
    if config.frame_log.enabled {
        bank = bank.with_frame_log(FrameLogger::from_config(&config.frame_log)?);
        info!("Recording transmitted frames to {}", config.frame_log.log_dir);
    }
    info!(
        "Installed {} DShot encoders ({} bit/s at {} Hz resolution)",
        bank.len(),
        config.encoder.bit_rate_hz,
        config.encoder.resolution_hz
    );

    let mut bridge = SerialPulseBridge::open(
        &[config.serial.port.as_str()],
        config.serial.baud_rate,
        Duration::from_millis(config.serial.timeout_ms),
    )?;
    info!("Pulse bridge opened at: {}", bridge.device_path());

    let ramp = ThrottleRamp::from_config(&config.ramp)?;
    let telemetry_request = config.ramp.telemetry_request;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut interrupted = false;
    let mut last_throttle = 0;

    for step in ramp {
        if step.throttle == 0 {
            info!("Arming ESCs with zero throttle for {:?}...", step.hold);
        } else {
            info!("Throttle {}", step.throttle);
        }

        let command = Command::new(step.throttle, telemetry_request);
        if let Err(e) = bank.send_all(&mut bridge, command, TransmitMode::Loop).await {
            warn!("Failed to send throttle {}: {}", step.throttle, e);
        }
        last_throttle = step.throttle;

        tokio::select! {
            _ = tokio::time::sleep(step.hold) => {}
            _ = &mut shutdown => {
                interrupted = true;
                break;
            }
        }
    }

    if !interrupted {
        info!("Ramp complete, holding throttle {}. Press Ctrl+C to stop", last_throttle);
        shutdown.await?;
    }

    info!("Received Ctrl+C, stopping motors...");
    bank.send_all(&mut bridge, Command::new(0, false), TransmitMode::Loop)
        .await
        .context("Failed to send zero throttle")?;
    bank.flush_frame_log()?;

    Ok(())
}

/// Install the tracing subscriber
///
/// `RUST_LOG` overrides the configured level. The returned guard must stay
/// alive for file output to be flushed.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (file_writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::io::stdout.and(file_writer))
                .init();

            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path() {
        assert_eq!(DEFAULT_CONFIG_PATH, "config/default.toml");
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let config = Config::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml"))
            .expect("shipped config should load");

        let bank = MotorBank::new(config.encoder, &config.motors.channels).unwrap();
        assert_eq!(bank.len(), 4);
        assert!(ThrottleRamp::from_config(&config.ramp).is_ok());
    }
}
