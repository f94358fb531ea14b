//! Transport trait for the radio link.
//!
//! The [`Transport`] trait abstracts over the physical link to a transceiver.
//! The serial implementation lives in `rigstate-transport`; tests use
//! `MockTransport` from `rigstate-test-harness`.
//!
//! The session IO task owns its transport exclusively, so implementations
//! need no internal locking.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a radio.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the radio, returning once all bytes are written.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the radio into the provided buffer.
    ///
    /// Returns the number of bytes read. Waits up to `timeout` for data and
    /// returns [`Error::Timeout`](crate::error::Error::Timeout) if nothing
    /// arrived. A closed link is reported as
    /// [`Error::ConnectionLost`](crate::error::Error::ConnectionLost).
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport. Later calls return
    /// [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;
}
