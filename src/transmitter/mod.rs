//! # Pulse Transmitter Module
//!
//! Hands encoded symbol buffers to a pulse-train peripheral.
//!
//! This module handles:
//! - The `PulseTransmitter` seam used by the motor bank
//! - A serial-attached pulse bridge that replays symbol words on its output pins
//! - Packing symbol buffers into bridge packets

pub mod port_trait;

use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::dshot::encoder::SymbolBuffer;
use crate::error::{DshotEscError, Result};

use port_trait::{SerialPortIO, TokioSerialPort};

/// Sync byte opening every bridge packet
pub const BRIDGE_SYNC_BYTE: u8 = 0xD5;

/// Bridge packet header: sync + channel + mode + symbol count
pub const BRIDGE_HEADER_SIZE: usize = 4;

/// Default bridge device paths to try (in order of preference)
pub const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyACM0", // USB CDC devices
    "/dev/ttyUSB0", // USB-to-serial adapters
];

/// How the peripheral plays a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitMode {
    /// Send the buffer once
    Once,

    /// Repeat the buffer until the next transmission on the same channel
    Loop,
}

impl TransmitMode {
    /// Mode byte in the bridge packet
    pub fn code(&self) -> u8 {
        match self {
            TransmitMode::Once => 0,
            TransmitMode::Loop => 1,
        }
    }
}

/// Anything that can put a symbol buffer on a motor's signal line
///
/// Implementations must keep symbol order and tick counts unchanged.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PulseTransmitter: Send {
    /// Queue one symbol buffer for transmission on `channel`
    async fn transmit(&mut self, channel: u8, symbols: &SymbolBuffer, mode: TransmitMode) -> Result<()>;
}

/// Build a bridge packet for one symbol buffer
///
/// Layout: sync (0xD5), channel, mode, symbol count, then one little-endian
/// 32-bit pulse word per symbol.
pub fn encode_bridge_packet(channel: u8, symbols: &SymbolBuffer, mode: TransmitMode) -> BytesMut {
    let words = symbols.to_words();

    let mut packet = BytesMut::with_capacity(BRIDGE_HEADER_SIZE + words.len() * 4);
    packet.put_u8(BRIDGE_SYNC_BYTE);
    packet.put_u8(channel);
    packet.put_u8(mode.code());
    packet.put_u8(words.len() as u8);
    for word in words {
        packet.put_u32_le(word);
    }

    packet
}

/// Serial-attached pulse-train bridge
///
/// One serial link drives every motor channel; packets carry the channel index.
pub struct SerialPulseBridge<P: SerialPortIO = TokioSerialPort> {
    /// Serial port handle
    port: P,
    /// Device path (e.g., /dev/ttyACM0)
    device_path: String,
    /// Upper bound on a single packet write
    write_timeout: Duration,
}

impl<P: SerialPortIO> std::fmt::Debug for SerialPulseBridge<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPulseBridge")
            .field("device_path", &self.device_path)
            .field("write_timeout", &self.write_timeout)
            .finish_non_exhaustive()
    }
}

impl SerialPulseBridge<TokioSerialPort> {
    /// Open the first bridge device that responds
    ///
    /// # Arguments
    ///
    /// * `paths` - Device paths to try (e.g., &["/dev/ttyACM0"])
    /// * `baud_rate` - Serial baud rate
    /// * `write_timeout` - Upper bound on a single packet write
    ///
    /// # Errors
    ///
    /// Returns [`DshotEscError::SerialPortNotFound`] if no path could be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::time::Duration;
    /// use dshot_esc::transmitter::SerialPulseBridge;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let bridge = SerialPulseBridge::open(&["/dev/ttyACM0"], 921_600, Duration::from_millis(100))?;
    ///     println!("Connected to: {}", bridge.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(paths: &[&str], baud_rate: u32, write_timeout: Duration) -> Result<Self> {
        for path in paths {
            debug!("Trying to open pulse bridge: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Opened pulse bridge at {} ({} baud)", path, baud_rate);
                    return Ok(Self::with_port(
                        TokioSerialPort::new(port),
                        path.to_string(),
                        write_timeout,
                    ));
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(DshotEscError::SerialPortNotFound(paths.join(", ")))
    }

    /// Open a specific serial port (8N1, no flow control)
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| DshotEscError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }
}

impl<P: SerialPortIO> SerialPulseBridge<P> {
    /// Wrap an already-open port
    pub fn with_port(port: P, device_path: String, write_timeout: Duration) -> Self {
        Self {
            port,
            device_path,
            write_timeout,
        }
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    async fn send_packet(&mut self, packet: &[u8]) -> Result<()> {
        self.port
            .write_all(packet)
            .await
            .map_err(|e| DshotEscError::Serial(format!("Failed to write packet: {}", e)))?;

        self.port
            .flush()
            .await
            .map_err(|e| DshotEscError::Serial(format!("Failed to flush serial port: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl<P: SerialPortIO> PulseTransmitter for SerialPulseBridge<P> {
    async fn transmit(&mut self, channel: u8, symbols: &SymbolBuffer, mode: TransmitMode) -> Result<()> {
        let packet = encode_bridge_packet(channel, symbols, mode);
        let timeout = self.write_timeout;

        tokio::time::timeout(timeout, self.send_packet(&packet))
            .await
            .map_err(|_| {
                DshotEscError::Serial(format!("Write to channel {} timed out after {:?}", channel, timeout))
            })??;

        debug!("Sent {} symbols to channel {} ({:?})", symbols.len(), channel, mode);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::port_trait::mocks::MockSerialPort;
    use super::*;
    use crate::dshot::encoder::{DshotEncoder, EncoderConfig};
    use crate::dshot::protocol::Command;

    fn encode(throttle: u16) -> SymbolBuffer {
        DshotEncoder::new(EncoderConfig::new(40_000_000, 600_000, 30))
            .unwrap()
            .encode(Command::new(throttle, false))
            .unwrap()
    }

    fn mock_bridge() -> (SerialPulseBridge<MockSerialPort>, MockSerialPort) {
        let port = MockSerialPort::new();
        let bridge = SerialPulseBridge::with_port(
            port.clone(),
            "/dev/mock0".to_string(),
            Duration::from_millis(100),
        );
        (bridge, port)
    }

    #[test]
    fn test_transmit_mode_codes() {
        assert_eq!(TransmitMode::Once.code(), 0);
        assert_eq!(TransmitMode::Loop.code(), 1);
    }

    #[test]
    fn test_bridge_packet_layout() {
        let symbols = encode(0);
        let packet = encode_bridge_packet(2, &symbols, TransmitMode::Loop);

        assert_eq!(packet.len(), BRIDGE_HEADER_SIZE + 17 * 4);
        assert_eq!(packet[0], BRIDGE_SYNC_BYTE);
        assert_eq!(packet[1], 2);
        assert_eq!(packet[2], 1);
        assert_eq!(packet[3], 17);

        // First data word: high 24, low 42, little-endian
        let first = u32::from_le_bytes([packet[4], packet[5], packet[6], packet[7]]);
        assert_eq!(first, symbols[0].to_word());

        let last = u32::from_le_bytes([packet[68], packet[69], packet[70], packet[71]]);
        assert_eq!(last, symbols.reset().to_word());
    }

    #[tokio::test]
    async fn test_transmit_writes_packet() {
        let (mut bridge, port) = mock_bridge();
        let symbols = encode(1000);

        bridge.transmit(0, &symbols, TransmitMode::Once).await.unwrap();

        let written = port.get_written_data();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0], encode_bridge_packet(0, &symbols, TransmitMode::Once).to_vec());
        assert_eq!(port.flushes(), 1);
    }

    #[tokio::test]
    async fn test_transmit_write_error() {
        let (mut bridge, port) = mock_bridge();
        port.set_write_error(std::io::ErrorKind::BrokenPipe);

        let result = bridge.transmit(1, &encode(100), TransmitMode::Loop).await;
        match result {
            Err(DshotEscError::Serial(msg)) => assert!(msg.contains("Failed to write packet")),
            other => panic!("Expected Serial error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transmit_flush_error() {
        let (mut bridge, port) = mock_bridge();
        port.set_flush_error(std::io::ErrorKind::TimedOut);

        let result = bridge.transmit(2, &encode(1000), TransmitMode::Once).await;
        match result {
            Err(DshotEscError::Serial(msg)) => assert!(msg.contains("Failed to flush serial port")),
            other => panic!("Expected Serial error, got: {:?}", other),
        }

        // The packet reached the port before the flush failed
        assert_eq!(port.get_written_data().len(), 1);
        assert_eq!(port.flushes(), 0);
    }

    #[test]
    fn test_device_path() {
        let (bridge, _port) = mock_bridge();
        assert_eq!(bridge.device_path(), "/dev/mock0");
    }

    #[test]
    fn test_open_with_invalid_paths_returns_error() {
        let invalid_paths = &["/dev/nonexistent0", "/dev/nonexistent1"];
        let result = SerialPulseBridge::open(invalid_paths, 921_600, Duration::from_millis(100));

        match result {
            Err(DshotEscError::SerialPortNotFound(msg)) => {
                assert!(msg.contains("/dev/nonexistent0"));
                assert!(msg.contains("/dev/nonexistent1"));
            }
            other => panic!("Expected SerialPortNotFound error, got: {:?}", other),
        }
    }

    #[test]
    fn test_open_with_empty_paths_returns_error() {
        let empty_paths: &[&str] = &[];
        let result = SerialPulseBridge::open(empty_paths, 921_600, Duration::from_millis(100));
        assert!(matches!(result, Err(DshotEscError::SerialPortNotFound(_))));
    }

    #[test]
    fn test_open_port_with_invalid_path_returns_error() {
        let result = SerialPulseBridge::open_port("/dev/nonexistent_serial_device_12345", 921_600);

        match result {
            Err(DshotEscError::Serial(msg)) => {
                assert!(msg.contains("/dev/nonexistent_serial_device_12345"));
                assert!(msg.contains("Failed to open"));
            }
            other => panic!("Expected Serial error, got: {:?}", other),
        }
    }
}
