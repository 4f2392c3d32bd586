//! Error types for the drive client.

use std::time::Duration;

use thiserror::Error;
use tokio_modbus::ExceptionCode;

/// Result type alias for drive client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the drive.
///
/// The split mirrors how callers must react: [`Error::Connection`] ends the
/// session, [`Error::Read`] costs the affected poll cycle and nothing else.
#[derive(Debug, Error)]
pub enum Error {
    /// The serial port could not be opened, or the link is not usable.
    #[error("Connection to '{port}' failed: {reason}")]
    Connection { port: String, reason: String },

    /// A register read failed. Polling loops skip the cycle and continue.
    #[error("Read of {count} register(s) at address {address} failed: {kind}")]
    Read {
        address: u16,
        count: u16,
        kind: ReadErrorKind,
    },

    /// Invalid configuration or API misuse.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a connection error for the given port.
    pub fn connection(port: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Connection {
            port: port.into(),
            reason: reason.into(),
        }
    }

    /// Create a read error for the given register block.
    pub fn read(address: u16, count: u16, kind: ReadErrorKind) -> Self {
        Error::Read {
            address,
            count,
            kind,
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// True when the error ends the current operation rather than costing a
    /// single poll cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Connection { .. } | Error::Config(_))
    }
}

/// Classification of a failed register read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadErrorKind {
    /// No response within the configured timeout.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// I/O failure on the serial link.
    #[error("I/O error: {0}")]
    Io(String),

    /// The drive answered with a Modbus exception.
    #[error("device exception: {0}")]
    Exception(ExceptionCode),

    /// The response could not be interpreted as a valid Modbus frame.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The drive returned a different register count than requested.
    #[error("expected {expected} register(s), got {actual}")]
    ShortResponse { expected: usize, actual: usize },
}
