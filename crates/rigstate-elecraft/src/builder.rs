//! ElecraftBuilder -- fluent builder for constructing [`ElecraftRadio`] instances.
//!
//! Separates configuration from construction so that callers can set up
//! serial port parameters and the event channel before the link is opened.
//!
//! # Example
//!
//! ```no_run
//! use rigstate_elecraft::builder::ElecraftBuilder;
//!
//! # async fn example() -> rigstate_core::Result<()> {
//! let radio = ElecraftBuilder::new()
//!     .serial_port("/dev/ttyUSB0")
//!     .baud_rate(38_400)
//!     .build()
//!     .await?;
//! println!("{}", radio.errors());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use rigstate_core::{Clock, Error, Result, SystemClock, Transport};
use rigstate_transport::{SerialConfig, SerialTransport, DEFAULT_BAUD_RATE};

use crate::radio::ElecraftRadio;

/// Default capacity of the session event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Fluent builder for [`ElecraftRadio`].
pub struct ElecraftBuilder {
    serial_port: Option<String>,
    baud_rate: u32,
    event_capacity: usize,
    clock: Arc<dyn Clock>,
}

impl ElecraftBuilder {
    pub fn new() -> Self {
        ElecraftBuilder {
            serial_port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            clock: Arc::new(SystemClock),
        }
    }

    /// Serial port path, e.g. `/dev/ttyUSB0` or `COM3`. Required by
    /// [`build()`](Self::build).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = baud;
        self
    }

    /// Capacity of the [`subscribe_events`](ElecraftRadio::subscribe_events)
    /// channel. Must be non-zero.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Time source for poll deadlines.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build an [`ElecraftRadio`] with a caller-provided transport.
    ///
    /// This is the entry point for testing (pass a `MockTransport` from
    /// `rigstate-test-harness`) and for callers that manage the transport
    /// themselves.
    pub async fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<ElecraftRadio> {
        if self.event_capacity == 0 {
            return Err(Error::InvalidParameter(
                "event_capacity must be at least 1".into(),
            ));
        }
        ElecraftRadio::new(transport, self.clock, self.event_capacity)
    }

    /// Open the serial port and build an [`ElecraftRadio`] on it.
    pub async fn build(self) -> Result<ElecraftRadio> {
        let port = self
            .serial_port
            .as_deref()
            .ok_or_else(|| Error::InvalidParameter("serial_port is required for build()".into()))?;
        let transport = SerialTransport::open(port, SerialConfig::with_baud(self.baud_rate)).await?;
        self.build_with_transport(Box::new(transport)).await
    }
}

impl Default for ElecraftBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Open `port` at `baud` and start mirroring the radio.
pub async fn connect(port: &str, baud: u32) -> Result<ElecraftRadio> {
    ElecraftBuilder::new()
        .serial_port(port)
        .baud_rate(baud)
        .build()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigstate_core::{CommHealth, ManualClock};
    use rigstate_test_harness::MockTransport;

    #[tokio::test]
    async fn builder_defaults() {
        let (mock, _link) = MockTransport::new();
        let radio = ElecraftBuilder::new()
            .build_with_transport(Box::new(mock))
            .await
            .unwrap();
        assert_eq!(radio.health(), CommHealth::NotResponding);
        assert!(radio.cell("freq").is_ok());
    }

    #[tokio::test]
    async fn builder_custom_settings() {
        let (mock, _link) = MockTransport::new();
        let radio = ElecraftBuilder::new()
            .serial_port("/dev/ttyUSB0")
            .baud_rate(9600)
            .event_capacity(8)
            .clock(Arc::new(ManualClock::new()))
            .build_with_transport(Box::new(mock))
            .await
            .unwrap();
        assert!(radio.keys().len() > 40);
    }

    #[tokio::test]
    async fn zero_event_capacity_rejected() {
        let (mock, _link) = MockTransport::new();
        let result = ElecraftBuilder::new()
            .event_capacity(0)
            .build_with_transport(Box::new(mock))
            .await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn serial_port_required_for_build() {
        let result = ElecraftBuilder::new().build().await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn missing_port_fails_to_open() {
        let result = connect("/dev/rigstate-does-not-exist", 38_400).await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }
}
