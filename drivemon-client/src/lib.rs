//! Modbus RTU diagnostic client for ACS310-class variable-frequency drives.
//!
//! The crate reads and decodes a small fixed register map over a serial
//! line: live measurements (output frequency and current), the status word
//! and the last fault code. On top of that it offers a one-shot
//! connectivity check, a cancellable polling loop and a diagnostic walk
//! over the operating-data registers. Write access to the drive is out of
//! scope.
//!
//! # Modules
//!
//! - [`config`] - serial link parameters
//! - [`transport`] - the register-read contract and its serial implementation
//! - [`registers`] - the drive's register map and scaling
//! - [`status`] - status-word and fault-code decoding
//! - [`sample`] - poll cycle output
//! - [`client`] - typed reads and the one-shot check
//! - [`poller`] - cancellable periodic sampling
//! - [`sweep`] - diagnostic register walk
//! - [`stop`] - cooperative stop signaling
//! - [`error`] - error types

pub mod client;
pub mod config;
pub mod error;
pub mod poller;
pub mod registers;
pub mod sample;
pub mod status;
pub mod stop;
pub mod sweep;
pub mod transport;

pub use client::DriveClient;
pub use config::ConnectionConfig;
pub use error::{Error, ReadErrorKind, Result};
pub use poller::{DEFAULT_POLL_INTERVAL, DrivePoller, PollerState};
pub use sample::{PollSample, current_timestamp_millis};
pub use status::{DriveStatus, FaultCode, OperatingState, StatusWord};
pub use stop::{StopHandle, StopToken, stop_channel};
pub use sweep::{RegisterSweep, SweepEntry};
pub use transport::{SerialTransport, Transport};
