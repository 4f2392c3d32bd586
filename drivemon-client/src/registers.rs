//! Register map of the monitored drive.
//!
//! Addresses are 0-based holding-register offsets, so Modbus register
//! 40001 is address 0. The layout and scale factors are those of the
//! ACS310 drive family and are not protocol-generic.

use serde::{Deserialize, Serialize};

/// Output frequency (register 40001). Raw value is in 0.01 Hz steps.
pub const REG_OUTPUT_FREQUENCY: u16 = 0;

/// Output current (register 40002). Raw value is in 0.1 A steps.
pub const REG_OUTPUT_CURRENT: u16 = 1;

/// Drive status word (register 40051). Decoded by [`crate::status::StatusWord`].
pub const REG_STATUS_WORD: u16 = 50;

/// Last fault code (register 40103). Zero when no code is available.
pub const REG_LAST_FAULT: u16 = 102;

/// First address of the measurement block read each poll cycle.
pub const MEASUREMENT_START: u16 = REG_OUTPUT_FREQUENCY;

/// Registers in the measurement block: frequency and current.
pub const MEASUREMENT_COUNT: u16 = 2;

/// Largest register block a single read may request from the drive.
pub const MAX_BLOCK_LEN: u16 = 4;

/// First address of the operating-data area walked by the register sweep.
pub const SWEEP_START: u16 = 0;

/// Last address (inclusive) of the operating-data area.
pub const SWEEP_END: u16 = 58;

/// Live operating values scaled to engineering units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Output frequency in Hz.
    pub frequency_hz: f64,

    /// Output current in A.
    pub current_a: f64,
}

impl Measurement {
    /// Scale the raw measurement registers to engineering units.
    pub fn from_raw(frequency_raw: u16, current_raw: u16) -> Self {
        Self {
            frequency_hz: f64::from(frequency_raw) / 100.0,
            current_a: f64::from(current_raw) / 10.0,
        }
    }
}
