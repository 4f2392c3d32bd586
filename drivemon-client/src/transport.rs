//! Serial Modbus transport for the drive link.

use std::fmt;
use std::time::Duration;

use tokio_modbus::client::{Context, Reader};
use tokio_modbus::prelude::*;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::error::{Error, ReadErrorKind, Result};
use crate::registers::MAX_BLOCK_LEN;

/// Register access and link lifecycle for one drive.
///
/// The polling layers are generic over this trait so they can run against a
/// scripted transport in tests. Everything takes `&mut self`: the serial bus
/// is half-duplex and a transport has exactly one user at a time.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Open the link. A failure here is fatal for the session.
    async fn connect(&mut self) -> Result<()>;

    /// Release the link. Safe to call when already closed.
    async fn disconnect(&mut self) -> Result<()>;

    /// True while the link is open.
    fn is_connected(&self) -> bool;

    /// Read `count` holding registers starting at `address`.
    ///
    /// Returns exactly `count` values or a classified [`Error::Read`];
    /// callers never see a partial block.
    async fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>>;
}

/// [`Transport`] over a serial port, via tokio-serial and Modbus RTU.
///
/// The port stays closed until [`Transport::connect`] and is dropped on
/// [`Transport::disconnect`], so a one-shot check does not hold the bus.
pub struct SerialTransport {
    config: ConnectionConfig,
    ctx: Option<Context>,
}

impl SerialTransport {
    /// Create a transport for the given link parameters.
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config, ctx: None }
    }

    /// Link parameters this transport was built with.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn serial_builder(&self) -> tokio_serial::SerialPortBuilder {
        let parity = match self.config.parity.to_lowercase().as_str() {
            "none" => tokio_serial::Parity::None,
            "even" => tokio_serial::Parity::Even,
            "odd" => tokio_serial::Parity::Odd,
            _ => tokio_serial::Parity::None,
        };

        let stop_bits = match self.config.stop_bits {
            2 => tokio_serial::StopBits::Two,
            _ => tokio_serial::StopBits::One,
        };

        let data_bits = match self.config.data_bits {
            5 => tokio_serial::DataBits::Five,
            6 => tokio_serial::DataBits::Six,
            7 => tokio_serial::DataBits::Seven,
            _ => tokio_serial::DataBits::Eight,
        };

        tokio_serial::new(self.config.port.as_str(), self.config.baud_rate)
            .parity(parity)
            .stop_bits(stop_bits)
            .data_bits(data_bits)
    }
}

impl fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialTransport")
            .field("port", &self.config.port)
            .field("unit_id", &self.config.unit_id)
            .field("connected", &self.ctx.is_some())
            .finish()
    }
}

impl Transport for SerialTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.ctx.is_some() {
            return Ok(());
        }

        self.config.validate()?;

        let builder = self.serial_builder();
        let serial = tokio_serial::SerialStream::open(&builder).map_err(|e| {
            Error::connection(self.config.port.clone(), format!("Serial open failed: {}", e))
        })?;

        let ctx = rtu::attach_slave(serial, Slave(self.config.unit_id));
        self.ctx = Some(ctx);

        info!(
            port = %self.config.port,
            baud_rate = self.config.baud_rate,
            unit_id = self.config.unit_id,
            "Serial transport connected"
        );

        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(mut ctx) = self.ctx.take() {
            if let Err(e) = ctx.disconnect().await {
                warn!(port = %self.config.port, error = %e, "Error closing serial port");
            }
            debug!(port = %self.config.port, "Serial transport closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.ctx.is_some()
    }

    async fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        if count == 0 || count > MAX_BLOCK_LEN {
            return Err(Error::config(format!(
                "register count {} outside 1..={}",
                count, MAX_BLOCK_LEN
            )));
        }

        let response_timeout = self.config.timeout();
        let ctx = self.ctx.as_mut().ok_or_else(|| {
            Error::connection(self.config.port.clone(), "transport not connected")
        })?;

        // The serial driver has no response deadline of its own, so every
        // read is raced against the configured timeout.
        let response =
            tokio::time::timeout(response_timeout, ctx.read_holding_registers(address, count))
                .await
                .map_err(|_| Error::read(address, count, ReadErrorKind::Timeout(response_timeout)))?;

        let registers = response
            .map_err(|e| Error::read(address, count, classify_read_failure(e, response_timeout)))?
            .map_err(|code| Error::read(address, count, ReadErrorKind::Exception(code)))?;
        let registers = check_block_len(address, count, registers)?;

        debug!(address, count, "Read holding registers");
        Ok(registers)
    }
}

/// Enforce the no-partial-blocks contract on a successful response.
fn check_block_len(address: u16, count: u16, registers: Vec<u16>) -> Result<Vec<u16>> {
    if registers.len() != count as usize {
        return Err(Error::read(
            address,
            count,
            ReadErrorKind::ShortResponse {
                expected: count as usize,
                actual: registers.len(),
            },
        ));
    }
    Ok(registers)
}

/// Classify a transport-level read failure.
fn classify_read_failure(err: tokio_modbus::Error, response_timeout: Duration) -> ReadErrorKind {
    match err {
        tokio_modbus::Error::Transport(io) => match io.kind() {
            std::io::ErrorKind::TimedOut => ReadErrorKind::Timeout(response_timeout),
            _ => ReadErrorKind::Io(io.to_string()),
        },
        tokio_modbus::Error::Protocol(e) => ReadErrorKind::Protocol(format!("{:?}", e)),
    }
}
