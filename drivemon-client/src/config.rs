//! Serial connection configuration for the drive link.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Serial link parameters for one drive.
///
/// Assembled once per session, validated, then handed to the transport.
/// The defaults match the fielded ACS310 installation: 19200 Bd, 8 data
/// bits, no parity, one stop bit, unit id 1, 2 s response timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0" or "COM3")
    #[serde(default = "default_port")]
    pub port: String,

    /// Baud rate (default: 19200)
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Data bits: 5-8 (default: 8)
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,

    /// Parity: "none", "even", or "odd" (default: "none")
    #[serde(default = "default_parity")]
    pub parity: String,

    /// Stop bits: 1 or 2 (default: 1)
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,

    /// Modbus unit/slave ID of the drive (1-247, default: 1)
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    /// Response timeout in milliseconds (default: 2000)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    19200
}

fn default_data_bits() -> u8 {
    8
}

fn default_parity() -> String {
    "none".to_string()
}

fn default_stop_bits() -> u8 {
    1
}

fn default_unit_id() -> u8 {
    1
}

fn default_timeout_ms() -> u64 {
    2000
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            parity: default_parity(),
            stop_bits: default_stop_bits(),
            unit_id: default_unit_id(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ConnectionConfig {
    /// Response timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.port.is_empty() {
            return Err(Error::config("Serial port cannot be empty"));
        }

        if self.baud_rate == 0 {
            return Err(Error::config("baud_rate must be greater than 0"));
        }

        if !(5..=8).contains(&self.data_bits) {
            return Err(Error::config(format!(
                "invalid data_bits {} (use 5-8)",
                self.data_bits
            )));
        }

        match self.parity.to_lowercase().as_str() {
            "none" | "even" | "odd" => {}
            other => {
                return Err(Error::config(format!(
                    "invalid parity '{}' (use none, even, or odd)",
                    other
                )));
            }
        }

        if !(1..=2).contains(&self.stop_bits) {
            return Err(Error::config(format!(
                "invalid stop_bits {} (use 1 or 2)",
                self.stop_bits
            )));
        }

        if self.unit_id == 0 || self.unit_id > 247 {
            return Err(Error::config(format!(
                "unit_id {} out of range (use 1-247)",
                self.unit_id
            )));
        }

        if self.timeout_ms == 0 {
            return Err(Error::config("timeout_ms must be greater than 0"));
        }

        Ok(())
    }
}
