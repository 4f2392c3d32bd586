//! Typed register access for the drive.

use tracing::warn;

use crate::error::Result;
use crate::registers::{self, Measurement};
use crate::sample::PollSample;
use crate::status::{DriveStatus, FaultCode, StatusWord};
use crate::transport::Transport;

/// Drive-level read operations over a [`Transport`].
///
/// The read methods assume a connected transport; [`DriveClient::check`]
/// manages the connection itself for one-shot use.
#[derive(Debug)]
pub struct DriveClient<T: Transport> {
    transport: T,
}

impl<T: Transport> DriveClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Open the underlying transport.
    pub async fn connect(&mut self) -> Result<()> {
        self.transport.connect().await
    }

    /// Release the underlying transport.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.transport.disconnect().await
    }

    /// True while the transport is open.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Read a single holding register.
    pub async fn read_register(&mut self, address: u16) -> Result<u16> {
        let block = self.transport.read_holding_registers(address, 1).await?;
        Ok(block[0])
    }

    /// Read the measurement block (output frequency and current).
    pub async fn read_measurement(&mut self) -> Result<Measurement> {
        let block = self
            .transport
            .read_holding_registers(registers::MEASUREMENT_START, registers::MEASUREMENT_COUNT)
            .await?;
        Ok(Measurement::from_raw(block[0], block[1]))
    }

    /// Read the raw status word.
    pub async fn read_status_word(&mut self) -> Result<StatusWord> {
        let value = self.read_register(registers::REG_STATUS_WORD).await?;
        Ok(StatusWord(value))
    }

    /// Read the last fault code.
    pub async fn read_fault_code(&mut self) -> Result<FaultCode> {
        let value = self.read_register(registers::REG_LAST_FAULT).await?;
        Ok(FaultCode(value))
    }

    /// Read and decode the drive state.
    ///
    /// The fault code register is only fetched when the status word flags a
    /// fault; otherwise the code is reported unavailable without the extra
    /// bus round-trip.
    pub async fn read_drive_status(&mut self) -> Result<DriveStatus> {
        let status_word = self.read_status_word().await?;
        let fault_code = if status_word.is_faulted() {
            self.read_fault_code().await?
        } else {
            FaultCode::UNAVAILABLE
        };
        Ok(DriveStatus::decode(status_word, fault_code))
    }

    /// Run one full poll cycle: measurements first, then status.
    pub async fn sample(&mut self) -> Result<PollSample> {
        let measurement = self.read_measurement().await?;
        let status = self.read_drive_status().await?;
        Ok(PollSample::new(measurement, status))
    }

    /// One-shot connectivity and fault check.
    ///
    /// Connects, takes a single sample and releases the port whatever the
    /// outcome. A connection failure is returned before any register read
    /// is attempted.
    pub async fn check(&mut self) -> Result<PollSample> {
        self.transport.connect().await?;

        let outcome = self.sample().await;

        if let Err(e) = self.transport.disconnect().await {
            warn!(error = %e, "Error releasing transport after check");
        }

        outcome
    }
}
