//! # DShot Protocol Module
//!
//! Implementation of the DShot digital ESC protocol (outbound direction only).
//!
//! This module handles:
//! - Frame construction (11-bit throttle, telemetry request bit, 4-bit checksum)
//! - XOR-fold checksum calculation
//! - Bit timing tables derived from tick resolution and bit rate
//! - Rendering frames into (high, low) pulse symbols for a pulse-train peripheral

pub mod protocol;
pub mod checksum;
pub mod encoder;
