//! # DShot Protocol Constants and Types
//!
//! Core protocol definitions for DShot ESC communication.

use std::fmt;

use crate::error::{DshotEscError, Result};

use super::checksum::dshot_checksum;

/// Number of data bits in a DShot frame
pub const DSHOT_FRAME_BITS: usize = 16;

/// Symbols per transmission: 16 data bits + 1 reset gap
pub const DSHOT_SYMBOL_COUNT: usize = DSHOT_FRAME_BITS + 1;

/// Throttle value range (11-bit: 0-2047)
pub const DSHOT_THROTTLE_MIN: u16 = 0;
pub const DSHOT_THROTTLE_MAX: u16 = 2047;

/// First throttle value that spins the motor (0-47 are special commands)
pub const DSHOT_THROTTLE_ARMED_MIN: u16 = 48;

/// Bit position of the telemetry request flag within the frame
const TELEMETRY_BIT: u16 = 1 << 4;

/// Width of the checksum field
const CHECKSUM_BITS: u16 = 4;

/// Frames an ESC must receive back to back before it applies a settings command
pub const DSHOT_SETTINGS_COMMAND_REPEAT: usize = 6;

/// Standard DShot bit rates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DshotSpeed {
    DShot150,
    DShot300,
    DShot600,
    DShot1200,
}

impl DshotSpeed {
    /// Bit rate in bits/second
    pub fn bit_rate_hz(&self) -> u32 {
        match self {
            DshotSpeed::DShot150 => 150_000,
            DshotSpeed::DShot300 => 300_000,
            DshotSpeed::DShot600 => 600_000,
            DshotSpeed::DShot1200 => 1_200_000,
        }
    }
}

/// Special commands carried in the reserved throttle values 0-47
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum SpecialCommand {
    MotorStop = 0,
    Beep1 = 1,
    Beep2 = 2,
    Beep3 = 3,
    Beep4 = 4,
    Beep5 = 5,
    EscInfo = 6,
    SpinDirection1 = 7,
    SpinDirection2 = 8,
    Mode3dOff = 9,
    Mode3dOn = 10,
    SettingsRequest = 11,
    SaveSettings = 12,
    ExtendedTelemetryEnable = 13,
    ExtendedTelemetryDisable = 14,
    SpinDirectionNormal = 20,
    SpinDirectionReversed = 21,
    Led0On = 22,
    Led1On = 23,
    Led2On = 24,
    Led3On = 25,
    Led0Off = 26,
    Led1Off = 27,
    Led2Off = 28,
    Led3Off = 29,
    AudioStreamModeToggle = 30,
    SilentModeToggle = 31,
    SignalLineTelemetryDisable = 32,
    SignalLineTelemetryEnable = 33,
    SignalLineContinuousErpmTelemetry = 34,
    SignalLineContinuousErpmPeriodTelemetry = 35,
    SignalLineTemperatureTelemetry = 42,
    SignalLineVoltageTelemetry = 43,
    SignalLineCurrentTelemetry = 44,
    SignalLineConsumptionTelemetry = 45,
    SignalLineErpmTelemetry = 46,
    SignalLineErpmPeriodTelemetry = 47,
}

impl SpecialCommand {
    /// Number of consecutive frames the ESC needs before it acts on the command
    ///
    /// Commands that change persistent ESC state are only accepted after
    /// several identical frames in a row.
    pub fn repeat_count(&self) -> usize {
        use SpecialCommand::*;

        match self {
            SpinDirection1
            | SpinDirection2
            | Mode3dOff
            | Mode3dOn
            | SaveSettings
            | ExtendedTelemetryEnable
            | ExtendedTelemetryDisable
            | SpinDirectionNormal
            | SpinDirectionReversed
            | SignalLineTelemetryDisable
            | SignalLineTelemetryEnable
            | SignalLineContinuousErpmTelemetry
            | SignalLineContinuousErpmPeriodTelemetry => DSHOT_SETTINGS_COMMAND_REPEAT,
            _ => 1,
        }
    }

    /// Raw throttle value that carries this command
    pub fn code(&self) -> u16 {
        *self as u16
    }
}

impl TryFrom<u16> for SpecialCommand {
    type Error = DshotEscError;

    fn try_from(value: u16) -> Result<Self> {
        use SpecialCommand::*;

        let command = match value {
            0 => MotorStop,
            1 => Beep1,
            2 => Beep2,
            3 => Beep3,
            4 => Beep4,
            5 => Beep5,
            6 => EscInfo,
            7 => SpinDirection1,
            8 => SpinDirection2,
            9 => Mode3dOff,
            10 => Mode3dOn,
            11 => SettingsRequest,
            12 => SaveSettings,
            13 => ExtendedTelemetryEnable,
            14 => ExtendedTelemetryDisable,
            20 => SpinDirectionNormal,
            21 => SpinDirectionReversed,
            22 => Led0On,
            23 => Led1On,
            24 => Led2On,
            25 => Led3On,
            26 => Led0Off,
            27 => Led1Off,
            28 => Led2Off,
            29 => Led3Off,
            30 => AudioStreamModeToggle,
            31 => SilentModeToggle,
            32 => SignalLineTelemetryDisable,
            33 => SignalLineTelemetryEnable,
            34 => SignalLineContinuousErpmTelemetry,
            35 => SignalLineContinuousErpmPeriodTelemetry,
            42 => SignalLineTemperatureTelemetry,
            43 => SignalLineVoltageTelemetry,
            44 => SignalLineCurrentTelemetry,
            45 => SignalLineConsumptionTelemetry,
            46 => SignalLineErpmTelemetry,
            47 => SignalLineErpmPeriodTelemetry,
            other => return Err(DshotEscError::UnknownCommand(other)),
        };

        Ok(command)
    }
}

/// Logical motor command for one DShot transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Command {
    /// Raw DShot throttle (0-47 special commands, 48-2047 motor speed)
    pub throttle: u16,

    /// Ask the ESC to answer with telemetry
    pub telemetry_request: bool,
}

impl Command {
    /// Create a command from a raw throttle value
    ///
    /// The value is not range checked here; encoding rejects throttle above 2047.
    pub fn new(throttle: u16, telemetry_request: bool) -> Self {
        Self {
            throttle,
            telemetry_request,
        }
    }

    /// Create a command carrying a special command code
    ///
    /// ESCs only act on special commands when the telemetry bit is set.
    pub fn special(command: SpecialCommand) -> Self {
        Self::new(command.code(), true)
    }

    /// Whether the throttle falls into the reserved command range
    pub fn is_special(&self) -> bool {
        self.throttle < DSHOT_THROTTLE_ARMED_MIN
    }
}

/// A 16-bit DShot frame: throttle (11 bits), telemetry flag (1 bit), checksum (4 bits)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frame {
    raw: u16,
}

impl Frame {
    /// Build a frame from a command
    ///
    /// # Errors
    ///
    /// Returns [`DshotEscError::InvalidThrottle`] if the throttle exceeds 2047
    pub fn new(command: Command) -> Result<Self> {
        if command.throttle > DSHOT_THROTTLE_MAX {
            return Err(DshotEscError::InvalidThrottle(command.throttle));
        }

        let payload = (command.throttle << 1) | command.telemetry_request as u16;
        let checksum = dshot_checksum(payload);

        Ok(Self {
            raw: (payload << CHECKSUM_BITS) | checksum as u16,
        })
    }

    /// Rebuild a frame from its raw 16-bit value, verifying the checksum
    ///
    /// # Errors
    ///
    /// Returns [`DshotEscError::ChecksumMismatch`] if the checksum nibble does
    /// not match the payload
    pub fn from_raw(raw: u16) -> Result<Self> {
        let frame = Self { raw };
        let expected = dshot_checksum(frame.payload());

        if frame.checksum() != expected {
            return Err(DshotEscError::ChecksumMismatch {
                expected,
                actual: frame.checksum(),
            });
        }

        Ok(frame)
    }

    /// Raw 16-bit frame value
    pub fn raw(&self) -> u16 {
        self.raw
    }

    /// 12-bit payload (throttle and telemetry flag)
    pub fn payload(&self) -> u16 {
        self.raw >> CHECKSUM_BITS
    }

    /// Throttle value (0-2047)
    pub fn throttle(&self) -> u16 {
        self.raw >> 5
    }

    /// Whether the telemetry request flag is set
    pub fn telemetry_request(&self) -> bool {
        self.raw & TELEMETRY_BIT != 0
    }

    /// Checksum nibble
    pub fn checksum(&self) -> u8 {
        (self.raw & 0x0F) as u8
    }

    /// Command this frame was built from
    pub fn command(&self) -> Command {
        Command::new(self.throttle(), self.telemetry_request())
    }

    /// Frame bits, most significant first
    pub fn bits(&self) -> impl Iterator<Item = bool> {
        let raw = self.raw;
        (0..DSHOT_FRAME_BITS).map(move |i| (raw >> (DSHOT_FRAME_BITS - 1 - i)) & 1 == 1)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("raw", &format_args!("{:#06X}", self.raw))
            .field("throttle", &self.throttle())
            .field("telemetry_request", &self.telemetry_request())
            .field("checksum", &self.checksum())
            .finish()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06X}", self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_ranges() {
        assert_eq!(DSHOT_THROTTLE_MIN, 0);
        assert_eq!(DSHOT_THROTTLE_MAX, 2047);
        assert_eq!(DSHOT_THROTTLE_ARMED_MIN, 48);
        assert_eq!(DSHOT_SYMBOL_COUNT, 17);
    }

    #[test]
    fn test_speed_bit_rates() {
        assert_eq!(DshotSpeed::DShot150.bit_rate_hz(), 150_000);
        assert_eq!(DshotSpeed::DShot300.bit_rate_hz(), 300_000);
        assert_eq!(DshotSpeed::DShot600.bit_rate_hz(), 600_000);
        assert_eq!(DshotSpeed::DShot1200.bit_rate_hz(), 1_200_000);
    }

    #[test]
    fn test_frame_zero_throttle() {
        let frame = Frame::new(Command::new(0, false)).unwrap();
        assert_eq!(frame.raw(), 0x0000);
        assert_eq!(frame.checksum(), 0);
    }

    #[test]
    fn test_frame_throttle_1000() {
        let frame = Frame::new(Command::new(1000, false)).unwrap();
        assert_eq!(frame.payload(), 0x7D0);
        assert_eq!(frame.checksum(), 0xA);
        assert_eq!(frame.raw(), 0x7D0A);
        assert_eq!(frame.to_string(), "0x7D0A");
    }

    #[test]
    fn test_frame_fields_roundtrip() {
        let frame = Frame::new(Command::new(998, true)).unwrap();
        assert_eq!(frame.throttle(), 998);
        assert!(frame.telemetry_request());
        assert_eq!(frame.payload(), 0x7CD);
        assert_eq!(frame.checksum(), 0x06);
        assert_eq!(frame.command(), Command::new(998, true));
    }

    #[test]
    fn test_frame_boundaries() {
        assert!(Frame::new(Command::new(0, false)).is_ok());
        assert!(Frame::new(Command::new(2047, true)).is_ok());

        match Frame::new(Command::new(2048, false)) {
            Err(DshotEscError::InvalidThrottle(2048)) => {}
            other => panic!("Expected InvalidThrottle, got: {:?}", other),
        }
        assert!(Frame::new(Command::new(u16::MAX, false)).is_err());
    }

    #[test]
    fn test_frame_bits_msb_first() {
        let frame = Frame::new(Command::new(1000, false)).unwrap();
        let bits: Vec<bool> = frame.bits().collect();
        assert_eq!(bits.len(), 16);

        // 0x7D0A = 0111 1101 0000 1010
        let expected = [
            false, true, true, true, true, true, false, true, false, false, false, false, true,
            false, true, false,
        ];
        assert_eq!(bits, expected);
    }

    #[test]
    fn test_frame_from_raw_valid() {
        let frame = Frame::from_raw(0x7D0A).unwrap();
        assert_eq!(frame.throttle(), 1000);
        assert!(!frame.telemetry_request());
    }

    #[test]
    fn test_frame_from_raw_bad_checksum() {
        match Frame::from_raw(0x7D0B) {
            Err(DshotEscError::ChecksumMismatch { expected, actual }) => {
                assert_eq!(expected, 0xA);
                assert_eq!(actual, 0xB);
            }
            other => panic!("Expected ChecksumMismatch, got: {:?}", other),
        }
    }

    #[test]
    fn test_checksum_roundtrip_all_speeds() {
        for throttle in DSHOT_THROTTLE_ARMED_MIN..=DSHOT_THROTTLE_MAX {
            for telemetry in [false, true] {
                let frame = Frame::new(Command::new(throttle, telemetry)).unwrap();
                let payload = frame.raw() >> 4;
                let folded = (payload ^ (payload >> 4) ^ (payload >> 8)) & 0x0F;
                assert_eq!(frame.checksum() as u16, folded);
                assert_eq!(Frame::from_raw(frame.raw()).unwrap(), frame);
            }
        }
    }

    #[test]
    fn test_special_command_sets_telemetry_bit() {
        let command = Command::special(SpecialCommand::Beep3);
        assert_eq!(command.throttle, 3);
        assert!(command.telemetry_request);
        assert!(command.is_special());
        assert!(!Command::new(48, false).is_special());
    }

    #[test]
    fn test_special_command_repeat_counts() {
        assert_eq!(SpecialCommand::SaveSettings.repeat_count(), 6);
        assert_eq!(SpecialCommand::SpinDirectionReversed.repeat_count(), 6);
        assert_eq!(SpecialCommand::Beep1.repeat_count(), 1);
        assert_eq!(SpecialCommand::MotorStop.repeat_count(), 1);
    }

    #[test]
    fn test_special_command_try_from() {
        for code in 0..DSHOT_THROTTLE_ARMED_MIN {
            if let Ok(command) = SpecialCommand::try_from(code) {
                assert_eq!(command.code(), code);
            }
        }

        assert_eq!(SpecialCommand::try_from(47).unwrap(), SpecialCommand::SignalLineErpmPeriodTelemetry);
        assert!(matches!(SpecialCommand::try_from(15), Err(DshotEscError::UnknownCommand(15))));
        assert!(matches!(SpecialCommand::try_from(48), Err(DshotEscError::UnknownCommand(48))));
    }
}
