//! Cooperative stop signaling for the polling loops.
//!
//! The loops never abort an in-flight register read; they observe the token
//! at cycle boundaries and while sleeping between cycles.

use tokio::sync::watch;

/// Create a connected [`StopHandle`]/[`StopToken`] pair.
pub fn stop_channel() -> (StopHandle, StopToken) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopToken { rx })
}

/// Trigger side of the stop signal.
///
/// Held by whoever decides when polling ends (a Ctrl+C handler, a test).
/// Dropping the handle counts as a stop request.
#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    /// Request a stop. Idempotent.
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }
}

/// Observer side of the stop signal.
#[derive(Debug, Clone)]
pub struct StopToken {
    rx: watch::Receiver<bool>,
}

impl StopToken {
    /// True once a stop was requested or the handle is gone.
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Wait until a stop is requested. Meant to be raced in `tokio::select!`
    /// against the inter-cycle sleep.
    pub async fn stopped(&mut self) {
        // wait_for errors when the handle is dropped, which also means stop.
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}
