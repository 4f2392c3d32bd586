//! Poll cycle output.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::registers::Measurement;
use crate::status::DriveStatus;

/// One completed poll cycle: live measurements plus decoded status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSample {
    /// Unix timestamp in milliseconds when the cycle completed.
    pub timestamp: i64,

    /// Scaled live measurements.
    pub measurement: Measurement,

    /// Decoded drive state.
    pub status: DriveStatus,
}

impl PollSample {
    /// Build a sample stamped with the current time.
    pub fn new(measurement: Measurement, status: DriveStatus) -> Self {
        Self {
            timestamp: current_timestamp_millis(),
            measurement,
            status,
        }
    }
}

/// Get current Unix timestamp in milliseconds.
///
/// Returns 0 if system time is before Unix epoch (should never happen in practice).
pub fn current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
