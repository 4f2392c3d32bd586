//! Diagnostic walk over the drive's operating-data registers.

use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::client::DriveClient;
use crate::error::Result;
use crate::status::{DriveStatus, OperatingState};
use crate::stop::StopToken;
use crate::transport::Transport;

/// One sweep step: a raw register value and the drive state read next to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepEntry {
    pub address: u16,
    pub value: u16,
    pub status: DriveStatus,
}

/// Sequential reader for a block of operating-data registers.
///
/// Reads one register per step together with the status word, pausing the
/// poll interval between steps. The walk ends early when the drive shows
/// [`OperatingState::Faulted`] or when stopped; a failed step is skipped
/// and the walk moves on.
#[derive(Debug)]
pub struct RegisterSweep<T: Transport> {
    client: DriveClient<T>,
    range: RangeInclusive<u16>,
    interval: Duration,
}

impl<T: Transport> RegisterSweep<T> {
    /// Create a sweep over `range` with the given step interval.
    pub fn new(client: DriveClient<T>, range: RangeInclusive<u16>, interval: Duration) -> Self {
        Self {
            client,
            range,
            interval,
        }
    }

    /// Walk the range, delivering one [`SweepEntry`] (or read error) per
    /// step. The transport is released before this returns.
    pub async fn run(
        &mut self,
        entries: mpsc::Sender<Result<SweepEntry>>,
        mut stop: StopToken,
    ) -> Result<()> {
        self.client.connect().await?;

        info!(from = *self.range.start(), to = *self.range.end(), "Register sweep started");

        for address in self.range.clone() {
            if stop.is_stopped() {
                break;
            }

            match self.read_entry(address).await {
                Ok(entry) => {
                    let drive_faulted = entry.status.operating_state() == OperatingState::Faulted;
                    if entries.send(Ok(entry)).await.is_err() {
                        break;
                    }
                    if drive_faulted {
                        warn!(address, "Drive reports a fault, sweep aborted");
                        break;
                    }
                }
                Err(e) => {
                    warn!(address, error = %e, "Sweep step skipped");
                    if entries.send(Err(e)).await.is_err() {
                        break;
                    }
                }
            }

            if address == *self.range.end() {
                break;
            }

            tokio::select! {
                _ = stop.stopped() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        if let Err(e) = self.client.disconnect().await {
            warn!(error = %e, "Error releasing transport after sweep");
        }
        info!("Register sweep finished");

        Ok(())
    }

    async fn read_entry(&mut self, address: u16) -> Result<SweepEntry> {
        let value = self.client.read_register(address).await?;
        let status = self.client.read_drive_status().await?;
        Ok(SweepEntry {
            address,
            value,
            status,
        })
    }
}
