//! # DShot Checksum
//!
//! 4-bit checksum over the 12-bit frame payload (throttle + telemetry bit).
//!
//! The three nibbles of the payload are XOR-folded together and the low four
//! bits of the result form the checksum.

/// Mask selecting the 12 payload bits
const PAYLOAD_MASK: u16 = 0x0FFF;

/// Mask selecting one nibble
const NIBBLE_MASK: u16 = 0x000F;

/// Calculate the DShot checksum of a 12-bit payload
///
/// Bits above the 12-bit payload are ignored.
///
/// # Arguments
///
/// * `payload` - `(throttle << 1) | telemetry_request`
///
/// # Returns
///
/// * `u8` - Checksum nibble (0x0-0xF)
///
/// # Examples
///
/// ```
/// use dshot_esc::dshot::checksum::dshot_checksum;
///
/// // Throttle 1000, no telemetry: nibbles 0x7, 0xD, 0x0
/// assert_eq!(dshot_checksum(0x7D0), 0xA);
/// ```
pub fn dshot_checksum(payload: u16) -> u8 {
    let payload = payload & PAYLOAD_MASK;
    ((payload ^ (payload >> 4) ^ (payload >> 8)) & NIBBLE_MASK) as u8
}

/// Calculate the checksum nibble by nibble (slow, for verification)
///
/// Splits the payload into its three nibbles explicitly and folds them.
/// Used primarily for testing the shift-based implementation.
#[allow(dead_code)]
fn dshot_checksum_slow(payload: u16) -> u8 {
    let mut crc: u8 = 0;

    for shift in [8u16, 4, 0] {
        crc ^= ((payload >> shift) & NIBBLE_MASK) as u8;
    }

    crc
}
