//! Serial port transport.
//!
//! [`SerialTransport`] implements [`Transport`] over `tokio-serial` for the
//! USB virtual COM port or RS-232 cable of an Elecraft K2/K3/KX3. The radios
//! default to 38400 baud, 8N1, no flow control.
//!
//! A vanished device (USB unplug, cable pulled) shows up as an end-of-file
//! read or a broken-pipe error; both are reported as
//! [`Error::ConnectionLost`] so the session can mark the link lost.
//!
//! # Example
//!
//! ```no_run
//! use rigstate_transport::{SerialConfig, SerialTransport};
//! use rigstate_core::transport::Transport;
//!
//! # async fn example() -> rigstate_core::Result<()> {
//! let mut transport = SerialTransport::open("/dev/ttyUSB0", SerialConfig::default()).await?;
//! transport.send(b"FA;").await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, error, info, trace, warn};

use rigstate_core::error::{Error, Result};
use rigstate_core::transport::Transport;

/// Factory default CAT rate of Elecraft radios.
pub const DEFAULT_BAUD_RATE: u32 = 38400;

/// Serial line settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub flow_control: FlowControl,
}

impl SerialConfig {
    /// 8N1 without flow control at `baud_rate`.
    pub fn with_baud(baud_rate: u32) -> Self {
        SerialConfig {
            baud_rate,
            ..Default::default()
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Seven,
    Eight,
}

impl From<DataBits> for tokio_serial::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Seven => tokio_serial::DataBits::Seven,
            DataBits::Eight => tokio_serial::DataBits::Eight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for tokio_serial::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => tokio_serial::StopBits::One,
            StopBits::Two => tokio_serial::StopBits::Two,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for tokio_serial::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for tokio_serial::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => tokio_serial::FlowControl::None,
            FlowControl::Software => tokio_serial::FlowControl::Software,
            FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
        }
    }
}

/// Map an I/O error on an open port to the link-level error.
fn link_error(e: std::io::Error) -> Error {
    match e.kind() {
        ErrorKind::BrokenPipe
        | ErrorKind::NotConnected
        | ErrorKind::UnexpectedEof
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted => Error::ConnectionLost,
        _ => Error::Io(e),
    }
}

/// A serial link to the radio.
pub struct SerialTransport {
    port: Option<SerialStream>,
    port_name: String,
}

impl SerialTransport {
    /// Open `port` (e.g. `/dev/ttyUSB0`, `COM3`) with the given settings.
    pub async fn open(port: &str, config: SerialConfig) -> Result<Self> {
        debug!(
            port = %port,
            baud_rate = config.baud_rate,
            data_bits = ?config.data_bits,
            stop_bits = ?config.stop_bits,
            parity = ?config.parity,
            flow_control = ?config.flow_control,
            "opening serial port"
        );

        let mut stream = tokio_serial::new(port, config.baud_rate)
            .data_bits(config.data_bits.into())
            .stop_bits(config.stop_bits.into())
            .parity(config.parity.into())
            .flow_control(config.flow_control.into())
            .open_native_async()
            .map_err(|e| {
                error!(port = %port, error = %e, "failed to open serial port");
                Error::Transport(format!("failed to open serial port {port}: {e}"))
            })?;

        // DTR/RTS may be wired to PTT or key on the radio's interface cable.
        if let Err(e) = stream.write_data_terminal_ready(false) {
            warn!(port = %port, error = %e, "failed to de-assert DTR");
        }
        if let Err(e) = stream.write_request_to_send(false) {
            warn!(port = %port, error = %e, "failed to de-assert RTS");
        }

        info!(port = %port, baud_rate = config.baud_rate, "serial port opened");

        Ok(Self {
            port: Some(stream),
            port_name: port.to_string(),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;
        trace!(port = %self.port_name, data = %String::from_utf8_lossy(data), "send");

        port.write_all(data).await.map_err(link_error)?;
        port.flush().await.map_err(link_error)?;
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        match tokio::time::timeout(timeout, port.read(buf)).await {
            Ok(Ok(0)) if !buf.is_empty() => {
                warn!(port = %self.port_name, "serial port reached end of file");
                Err(Error::ConnectionLost)
            }
            Ok(Ok(n)) => {
                trace!(port = %self.port_name, data = %String::from_utf8_lossy(&buf[..n]), "recv");
                Ok(n)
            }
            Ok(Err(e)) => {
                warn!(port = %self.port_name, error = %e, "serial read failed");
                Err(link_error(e))
            }
            Err(_) => Err(Error::Timeout),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut port) = self.port.take() {
            if let Err(e) = port.flush().await {
                warn!(port = %self.port_name, error = %e, "flush before close failed");
            }
            info!(port = %self.port_name, "serial port closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_elecraft_8n1() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, 38400);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.flow_control, FlowControl::None);
    }

    #[test]
    fn with_baud_keeps_line_settings() {
        let config = SerialConfig::with_baud(4800);
        assert_eq!(config.baud_rate, 4800);
        assert_eq!(config.data_bits, DataBits::Eight);
    }

    #[test]
    fn unplug_errors_are_connection_lost() {
        for kind in [ErrorKind::BrokenPipe, ErrorKind::UnexpectedEof, ErrorKind::NotConnected] {
            let e = link_error(std::io::Error::new(kind, "gone"));
            assert!(matches!(e, Error::ConnectionLost));
        }
        let e = link_error(std::io::Error::new(ErrorKind::InvalidInput, "bad"));
        assert!(matches!(e, Error::Io(_)));
    }

    #[tokio::test]
    async fn open_nonexistent_port_is_transport_error() {
        let result = SerialTransport::open("/dev/rigstate-does-not-exist", SerialConfig::default()).await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }
}
