//! # DShot Symbol Encoder
//!
//! Renders DShot frames into (high, low) pulse symbols for a pulse-train peripheral.

use std::ops::Deref;

use serde::Deserialize;
use tracing::debug;

use crate::error::{DshotEscError, Result};

use super::protocol::*;

/// Longest single pulse phase a pulse word can hold (15-bit duration field)
pub const SYMBOL_DURATION_MAX: u16 = 0x7FFF;

/// Longest reset gap, split over both halves of one pulse word
pub const RESET_TICKS_MAX: u32 = 2 * SYMBOL_DURATION_MAX as u32;

const MICROS_PER_SECOND: u64 = 1_000_000;

/// Encoder timing parameters, fixed for the lifetime of an encoder
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfig {
    /// Pulse peripheral tick rate in Hz
    pub resolution_hz: u32,

    /// DShot bit rate in bits/second (e.g. 600000 for DShot600)
    pub bit_rate_hz: u32,

    /// Silence after each frame in microseconds
    pub post_delay_us: u32,
}

impl EncoderConfig {
    pub fn new(resolution_hz: u32, bit_rate_hz: u32, post_delay_us: u32) -> Self {
        Self {
            resolution_hz,
            bit_rate_hz,
            post_delay_us,
        }
    }

    /// Build a configuration for one of the standard DShot speeds
    pub fn for_speed(resolution_hz: u32, speed: DshotSpeed, post_delay_us: u32) -> Self {
        Self::new(resolution_hz, speed.bit_rate_hz(), post_delay_us)
    }
}

/// One pulse: high for `high_ticks`, then low for `low_ticks`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Symbol {
    pub high_ticks: u16,
    pub low_ticks: u16,
}

impl Symbol {
    pub fn new(high_ticks: u16, low_ticks: u16) -> Self {
        Self {
            high_ticks,
            low_ticks,
        }
    }

    /// Line held low for the whole symbol
    pub fn reset(low_ticks: u16) -> Self {
        Self::new(0, low_ticks)
    }

    /// Whether this is a reset (all-low) symbol
    pub fn is_reset(&self) -> bool {
        self.high_ticks == 0
    }

    /// Total symbol length in ticks
    pub fn period(&self) -> u32 {
        self.high_ticks as u32 + self.low_ticks as u32
    }

    /// Pack into a 32-bit pulse word
    ///
    /// Layout (LSB first): `duration0:15 | level0:1 | duration1:15 | level1:1`.
    /// A zero duration terminates a transmission on pulse peripherals, so a
    /// reset symbol is split into two low halves instead of a zero-length high.
    pub fn to_word(&self) -> u32 {
        let (level0, duration0, duration1) = if self.is_reset() {
            let first = self.low_ticks / 2;
            (0u32, first, self.low_ticks - first)
        } else {
            (1u32, self.high_ticks, self.low_ticks)
        };

        (duration0 as u32 & SYMBOL_DURATION_MAX as u32)
            | (level0 << 15)
            | ((duration1 as u32 & SYMBOL_DURATION_MAX as u32) << 16)
    }
}

/// Precomputed tick durations for logical 0, logical 1 and the reset gap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitTiming {
    pub ticks_per_bit: u16,
    pub zero: Symbol,
    pub one: Symbol,
    pub reset: Symbol,
}

impl BitTiming {
    /// Derive the timing table from an encoder configuration
    ///
    /// Logical 0 is high for 3/8 of the bit period, logical 1 for 3/4.
    ///
    /// # Errors
    ///
    /// Returns [`DshotEscError::Configuration`] if:
    /// - Resolution or bit rate is zero
    /// - The bit rate exceeds the resolution, or a phase rounds down to zero ticks
    /// - Rounding makes the logical-0 and logical-1 high phases identical
    /// - A bit period does not fit a 15-bit pulse duration
    /// - The reset gap is shorter than one bit period or longer than one pulse word
    pub fn from_config(config: &EncoderConfig) -> Result<Self> {
        if config.resolution_hz == 0 {
            return Err(DshotEscError::Configuration(
                "resolution_hz must be greater than 0".to_string(),
            ));
        }

        if config.bit_rate_hz == 0 {
            return Err(DshotEscError::Configuration(
                "bit_rate_hz must be greater than 0".to_string(),
            ));
        }

        let ticks_per_bit = config.resolution_hz / config.bit_rate_hz;
        if ticks_per_bit > SYMBOL_DURATION_MAX as u32 {
            return Err(DshotEscError::Configuration(format!(
                "bit period of {} ticks exceeds maximum pulse duration {}",
                ticks_per_bit, SYMBOL_DURATION_MAX
            )));
        }

        let t0_high = ticks_per_bit * 3 / 8;
        let t1_high = ticks_per_bit * 3 / 4;
        let zero = Symbol::new(t0_high as u16, (ticks_per_bit - t0_high) as u16);
        let one = Symbol::new(t1_high as u16, (ticks_per_bit - t1_high) as u16);
        let ticks_per_bit = ticks_per_bit as u16;

        if zero.high_ticks == 0 || one.low_ticks == 0 || zero.high_ticks == one.high_ticks {
            return Err(DshotEscError::Configuration(format!(
                "resolution {} Hz is too coarse for bit rate {} Hz ({} ticks per bit)",
                config.resolution_hz, config.bit_rate_hz, ticks_per_bit
            )));
        }

        let reset_ticks =
            config.resolution_hz as u64 * config.post_delay_us as u64 / MICROS_PER_SECOND;
        if reset_ticks < ticks_per_bit as u64 {
            return Err(DshotEscError::Configuration(format!(
                "post delay of {} us ({} ticks) is shorter than one bit period ({} ticks)",
                config.post_delay_us, reset_ticks, ticks_per_bit
            )));
        }
        if reset_ticks > RESET_TICKS_MAX as u64 {
            return Err(DshotEscError::Configuration(format!(
                "post delay of {} us ({} ticks) exceeds maximum {} ticks",
                config.post_delay_us, reset_ticks, RESET_TICKS_MAX
            )));
        }

        Ok(Self {
            ticks_per_bit,
            zero,
            one,
            reset: Symbol::reset(reset_ticks as u16),
        })
    }

    /// Symbol for one logical bit
    pub fn symbol_for(&self, bit: bool) -> Symbol {
        if bit {
            self.one
        } else {
            self.zero
        }
    }

    /// Map a data symbol back to its bit, `None` if it matches neither timing
    pub fn classify(&self, symbol: &Symbol) -> Option<bool> {
        if *symbol == self.one {
            Some(true)
        } else if *symbol == self.zero {
            Some(false)
        } else {
            None
        }
    }
}

/// Ready-to-transmit symbols for one frame: 16 data symbols, MSB first, then the reset gap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolBuffer {
    symbols: [Symbol; DSHOT_SYMBOL_COUNT],
}

impl SymbolBuffer {
    /// The 16 data symbols
    pub fn data(&self) -> &[Symbol] {
        &self.symbols[..DSHOT_FRAME_BITS]
    }

    /// The trailing reset symbol
    pub fn reset(&self) -> Symbol {
        self.symbols[DSHOT_FRAME_BITS]
    }

    /// All symbols packed as pulse words
    pub fn to_words(&self) -> [u32; DSHOT_SYMBOL_COUNT] {
        let mut words = [0u32; DSHOT_SYMBOL_COUNT];
        for (word, symbol) in words.iter_mut().zip(self.symbols.iter()) {
            *word = symbol.to_word();
        }
        words
    }

    /// Total transmission length in ticks, reset gap included
    pub fn total_ticks(&self) -> u32 {
        self.symbols.iter().map(Symbol::period).sum()
    }
}

impl Deref for SymbolBuffer {
    type Target = [Symbol];

    fn deref(&self) -> &Self::Target {
        &self.symbols
    }
}

/// DShot frame encoder with a precomputed timing table
///
/// Immutable after construction; `encode` takes `&self` and may be called
/// from several threads at once.
#[derive(Debug, Clone)]
pub struct DshotEncoder {
    config: EncoderConfig,
    timing: BitTiming,
}

impl DshotEncoder {
    /// Create an encoder, computing the bit timing table once
    ///
    /// # Arguments
    ///
    /// * `config` - Tick resolution, bit rate and post-frame delay
    ///
    /// # Errors
    ///
    /// Returns [`DshotEscError::Configuration`] if the timing cannot be
    /// represented at the given resolution (see [`BitTiming::from_config`])
    ///
    /// # Examples
    ///
    /// ```
    /// use dshot_esc::dshot::encoder::{DshotEncoder, EncoderConfig};
    ///
    /// let encoder = DshotEncoder::new(EncoderConfig::new(40_000_000, 600_000, 30))?;
    /// assert_eq!(encoder.timing().ticks_per_bit, 66);
    /// # Ok::<(), dshot_esc::error::DshotEscError>(())
    /// ```
    pub fn new(config: EncoderConfig) -> Result<Self> {
        let timing = BitTiming::from_config(&config)?;

        debug!(
            "DShot encoder ready: {} Hz resolution, {} bit/s, T0={}/{} T1={}/{} reset={} ticks",
            config.resolution_hz,
            config.bit_rate_hz,
            timing.zero.high_ticks,
            timing.zero.low_ticks,
            timing.one.high_ticks,
            timing.one.low_ticks,
            timing.reset.low_ticks
        );

        Ok(Self { config, timing })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn timing(&self) -> &BitTiming {
        &self.timing
    }

    /// Encode a command into a symbol buffer
    ///
    /// # Arguments
    ///
    /// * `command` - Throttle (0-2047) and telemetry request flag
    ///
    /// # Returns
    ///
    /// * `SymbolBuffer` - 17 symbols: frame bits MSB first, then the reset gap
    ///
    /// # Errors
    ///
    /// Returns [`DshotEscError::InvalidThrottle`] if the throttle exceeds 2047
    ///
    /// # Examples
    ///
    /// ```
    /// use dshot_esc::dshot::encoder::{DshotEncoder, EncoderConfig};
    /// use dshot_esc::dshot::protocol::Command;
    ///
    /// let encoder = DshotEncoder::new(EncoderConfig::new(40_000_000, 600_000, 30))?;
    /// let symbols = encoder.encode(Command::new(1000, false))?;
    /// assert_eq!(symbols.len(), 17);
    /// # Ok::<(), dshot_esc::error::DshotEscError>(())
    /// ```
    pub fn encode(&self, command: Command) -> Result<SymbolBuffer> {
        let frame = Frame::new(command)?;
        Ok(self.encode_frame(frame))
    }

    /// Encode an already-built frame
    pub fn encode_frame(&self, frame: Frame) -> SymbolBuffer {
        let mut symbols = [self.timing.reset; DSHOT_SYMBOL_COUNT];

        for (symbol, bit) in symbols.iter_mut().zip(frame.bits()) {
            *symbol = self.timing.symbol_for(bit);
        }

        SymbolBuffer { symbols }
    }

    /// Recover the frame from emitted symbols (loopback verification)
    ///
    /// Only the 16 data symbols are inspected; tick counts must match the
    /// timing table exactly.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - A data symbol is missing or matches neither bit timing ([`DshotEscError::MalformedSymbol`])
    /// - The decoded checksum is wrong ([`DshotEscError::ChecksumMismatch`])
    pub fn decode(&self, symbols: &[Symbol]) -> Result<Frame> {
        let mut raw: u16 = 0;

        for index in 0..DSHOT_FRAME_BITS {
            let bit = symbols
                .get(index)
                .and_then(|symbol| self.timing.classify(symbol))
                .ok_or(DshotEscError::MalformedSymbol(index))?;
            raw = (raw << 1) | bit as u16;
        }

        Frame::from_raw(raw)
    }
}
