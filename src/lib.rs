//! # DShot ESC
//!
//! Encode DShot throttle commands into hardware-timed pulse symbols.
//!
//! This library provides the DShot frame encoder (checksum, bit timing and
//! symbol rendering) together with the pieces needed to drive a set of ESCs
//! through a pulse-train peripheral.

pub mod config;
pub mod error;
pub mod dshot;
pub mod frame_log;
pub mod motors;
pub mod ramp;
pub mod transmitter;
