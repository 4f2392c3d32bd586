//! Continuous drive polling.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::DriveClient;
use crate::error::{Error, Result};
use crate::sample::PollSample;
use crate::stop::StopToken;
use crate::transport::Transport;

/// Default pause between poll cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Lifecycle of a [`DrivePoller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// Created, not yet started.
    Idle,
    /// Actively sampling the drive.
    Polling,
    /// Finished. Terminal; the transport has been released.
    Stopped,
}

/// Periodic sampler for one drive.
///
/// Owns the transport for the whole session: connects when started, samples
/// until stopped and releases the port on every exit path.
#[derive(Debug)]
pub struct DrivePoller<T: Transport> {
    client: DriveClient<T>,
    interval: Duration,
    state: PollerState,
}

impl<T: Transport> DrivePoller<T> {
    /// Create an idle poller with the given cycle interval.
    pub fn new(client: DriveClient<T>, interval: Duration) -> Self {
        Self {
            client,
            interval,
            state: PollerState::Idle,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PollerState {
        self.state
    }

    /// Run the polling loop until `stop` fires or the receiver goes away.
    ///
    /// Every cycle delivers `Ok(sample)` or `Err(read error)` on `updates`;
    /// a failed read costs that cycle and nothing else. A connection failure
    /// is fatal: no cycle runs and the error is returned. The poller can run
    /// once; [`PollerState::Stopped`] is terminal.
    pub async fn run(
        &mut self,
        updates: mpsc::Sender<Result<PollSample>>,
        mut stop: StopToken,
    ) -> Result<()> {
        if self.state != PollerState::Idle {
            return Err(Error::config("poller already ran, create a new one"));
        }

        if let Err(e) = self.client.connect().await {
            self.state = PollerState::Stopped;
            return Err(e);
        }

        self.state = PollerState::Polling;
        info!(interval_ms = self.interval.as_millis() as u64, "Polling started");

        while !stop.is_stopped() {
            match self.client.sample().await {
                Ok(sample) => {
                    debug!(
                        frequency_hz = sample.measurement.frequency_hz,
                        current_a = sample.measurement.current_a,
                        state = %sample.status.operating_state(),
                        "Poll cycle complete"
                    );
                    if updates.send(Ok(sample)).await.is_err() {
                        debug!("Sample receiver dropped, stopping");
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Poll cycle skipped");
                    if updates.send(Err(e)).await.is_err() {
                        debug!("Sample receiver dropped, stopping");
                        break;
                    }
                }
            }

            tokio::select! {
                _ = stop.stopped() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        self.state = PollerState::Stopped;
        if let Err(e) = self.client.disconnect().await {
            warn!(error = %e, "Error releasing transport after polling");
        }
        info!("Polling stopped");

        Ok(())
    }
}
