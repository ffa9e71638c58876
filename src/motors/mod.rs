//! # Motor Bank Module
//!
//! Owns one DShot encoder per motor channel and fans commands out to a
//! pulse transmitter.

use tracing::{debug, warn};

use crate::dshot::encoder::{DshotEncoder, EncoderConfig, SymbolBuffer};
use crate::dshot::protocol::{Command, Frame, SpecialCommand};
use crate::error::{DshotEscError, Result};
use crate::frame_log::FrameLogger;
use crate::transmitter::{PulseTransmitter, TransmitMode};

/// One ESC output: its channel index and its own encoder
#[derive(Debug, Clone)]
pub struct Motor {
    channel: u8,
    encoder: DshotEncoder,
}

impl Motor {
    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn encoder(&self) -> &DshotEncoder {
        &self.encoder
    }
}

/// Set of independently encoded motor channels
#[derive(Debug)]
pub struct MotorBank {
    motors: Vec<Motor>,
    frame_log: Option<FrameLogger>,
}

impl MotorBank {
    /// Build an encoder for every channel
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The timing is not representable ([`DshotEscError::Configuration`])
    /// - A channel is listed twice ([`DshotEscError::DuplicateChannel`])
    pub fn new(config: EncoderConfig, channels: &[u8]) -> Result<Self> {
        let mut motors: Vec<Motor> = Vec::with_capacity(channels.len());

        for &channel in channels {
            if motors.iter().any(|motor| motor.channel == channel) {
                return Err(DshotEscError::DuplicateChannel(channel));
            }

            motors.push(Motor {
                channel,
                encoder: DshotEncoder::new(config)?,
            });
        }

        Ok(Self {
            motors,
            frame_log: None,
        })
    }

    /// Record every transmitted frame
    pub fn with_frame_log(mut self, logger: FrameLogger) -> Self {
        self.frame_log = Some(logger);
        self
    }

    pub fn len(&self) -> usize {
        self.motors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.motors.is_empty()
    }

    pub fn channels(&self) -> Vec<u8> {
        self.motors.iter().map(Motor::channel).collect()
    }

    pub fn motor(&self, channel: u8) -> Result<&Motor> {
        self.motors
            .iter()
            .find(|motor| motor.channel == channel)
            .ok_or(DshotEscError::UnknownChannel(channel))
    }

    /// Encode the same command for every channel
    pub fn encode_all(&self, command: Command) -> Result<Vec<(u8, SymbolBuffer)>> {
        self.motors
            .iter()
            .map(|motor| Ok((motor.channel, motor.encoder.encode(command)?)))
            .collect()
    }

    /// Encode and transmit a command on one channel
    pub async fn send_to<T>(&mut self, transmitter: &mut T, channel: u8, command: Command, mode: TransmitMode) -> Result<()>
    where
        T: PulseTransmitter + ?Sized,
    {
        let frame = Frame::new(command)?;
        let symbols = self.motor(channel)?.encoder.encode_frame(frame);

        transmitter.transmit(channel, &symbols, mode).await?;
        debug!("Channel {}: sent frame {} (throttle {})", channel, frame, frame.throttle());

        if let Some(logger) = self.frame_log.as_mut() {
            if let Err(e) = logger.record(channel, &frame) {
                warn!("Failed to record frame: {}", e);
            }
        }

        Ok(())
    }

    /// Encode and transmit a command on every channel
    ///
    /// Stops at the first channel that fails.
    pub async fn send_all<T>(&mut self, transmitter: &mut T, command: Command, mode: TransmitMode) -> Result<()>
    where
        T: PulseTransmitter + ?Sized,
    {
        for channel in self.channels() {
            self.send_to(transmitter, channel, command, mode).await?;
        }
        Ok(())
    }

    /// Send a special command to every channel as many times as the ESC requires
    pub async fn send_special<T>(&mut self, transmitter: &mut T, command: SpecialCommand) -> Result<()>
    where
        T: PulseTransmitter + ?Sized,
    {
        for _ in 0..command.repeat_count() {
            self.send_all(transmitter, Command::special(command), TransmitMode::Once)
                .await?;
        }
        Ok(())
    }

    /// Flush the frame log, if any
    pub fn flush_frame_log(&mut self) -> Result<()> {
        match self.frame_log.as_mut() {
            Some(logger) => logger.flush(),
            None => Ok(()),
        }
    }
}
