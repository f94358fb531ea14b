//! Mock transport for deterministic testing of protocol sessions.
//!
//! [`MockTransport`] implements the [`Transport`] trait over an in-memory
//! channel. The test keeps the paired [`MockLink`] handle to script what the
//! "radio" sends, inspect what the session wrote, and pull the plug.
//!
//! # Example
//!
//! ```
//! use rigstate_test_harness::MockTransport;
//!
//! let (mock, link) = MockTransport::new();
//! // Queue a status line; the session reads it on its next receive().
//! link.push(b"FA00014074000;");
//! # drop(mock);
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use rigstate_core::error::{Error, Result};
use rigstate_core::transport::Transport;

#[derive(Debug)]
enum Inbound {
    Data(Vec<u8>),
    Hangup,
}

/// A mock [`Transport`] for testing sessions without hardware.
///
/// Inbound bytes are delivered in the chunks they were pushed, split only
/// when the caller's buffer is smaller. When nothing is queued, `receive()`
/// waits for its timeout and returns [`Error::Timeout`]. After
/// [`MockLink::hangup`] or once every `MockLink` is dropped, `receive()`
/// returns [`Error::ConnectionLost`].
#[derive(Debug)]
pub struct MockTransport {
    inbound: mpsc::UnboundedReceiver<Inbound>,
    /// Bytes from a pushed chunk that did not fit the last receive buffer.
    pending: Vec<u8>,
    connected: bool,
    hung_up: bool,
    sent_log: Arc<Mutex<Vec<Vec<u8>>>>,
}

/// Test-side handle to a [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockLink {
    inbound: mpsc::UnboundedSender<Inbound>,
    sent_log: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockTransport {
    /// Create a connected mock transport and its control handle.
    pub fn new() -> (Self, MockLink) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sent_log = Arc::new(Mutex::new(Vec::new()));
        let transport = MockTransport {
            inbound: rx,
            pending: Vec::new(),
            connected: true,
            hung_up: false,
            sent_log: sent_log.clone(),
        };
        let link = MockLink {
            inbound: tx,
            sent_log,
        };
        (transport, link)
    }

    /// Set the connected state of the mock transport.
    ///
    /// When set to `false`, subsequent `send()` and `receive()` calls will
    /// return [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

impl MockLink {
    /// Queue bytes for the session to receive.
    pub fn push(&self, data: &[u8]) {
        let _ = self.inbound.send(Inbound::Data(data.to_vec()));
    }

    /// Simulate the serial device disappearing. Queued data is still
    /// delivered first.
    pub fn hangup(&self) {
        let _ = self.inbound.send(Inbound::Hangup);
    }

    /// Every `send()` call made on the transport so far, in order.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent_log.lock().clone()
    }

    /// All sent bytes concatenated and decoded as text.
    pub fn sent_text(&self) -> String {
        let log = self.sent_log.lock();
        log.iter()
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect()
    }

    /// Forget everything sent so far.
    pub fn clear_sent(&self) {
        self.sent_log.lock().clear();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        if self.hung_up {
            return Err(Error::ConnectionLost);
        }
        self.sent_log.lock().push(data.to_vec());
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        if self.pending.is_empty() {
            if self.hung_up {
                return Err(Error::ConnectionLost);
            }
            match tokio::time::timeout(timeout, self.inbound.recv()).await {
                Ok(Some(Inbound::Data(data))) => self.pending = data,
                Ok(Some(Inbound::Hangup)) | Ok(None) => {
                    self.hung_up = true;
                    return Err(Error::ConnectionLost);
                }
                Err(_) => return Err(Error::Timeout),
            }
        }

        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        self.pending.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected && !self.hung_up
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_transport_delivers_pushed_bytes() {
        let (mut mock, link) = MockTransport::new();
        link.push(b"FA00014074000;");

        let mut buf = [0u8; 64];
        let n = mock
            .receive(&mut buf, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"FA00014074000;");
    }

    #[tokio::test]
    async fn mock_transport_tracks_sent_data() {
        let (mut mock, link) = MockTransport::new();
        mock.send(b"AI2;K31;").await.unwrap();
        mock.send(b"FA;").await.unwrap();

        assert_eq!(link.sent().len(), 2);
        assert_eq!(link.sent()[1], b"FA;");
        assert_eq!(link.sent_text(), "AI2;K31;FA;");

        link.clear_sent();
        assert!(link.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn mock_transport_receive_without_data_times_out() {
        let (mut mock, _link) = MockTransport::new();
        let mut buf = [0u8; 64];

        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result.unwrap_err(), Error::Timeout));
    }

    #[tokio::test]
    async fn mock_transport_hangup_after_queued_data() {
        let (mut mock, link) = MockTransport::new();
        link.push(b"BN03;");
        link.hangup();

        let mut buf = [0u8; 64];
        let n = mock
            .receive(&mut buf, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"BN03;");

        let result = mock.receive(&mut buf, Duration::from_millis(100)).await;
        assert!(matches!(result.unwrap_err(), Error::ConnectionLost));
        assert!(!mock.is_connected());
        assert!(matches!(
            mock.send(b"FA;").await.unwrap_err(),
            Error::ConnectionLost
        ));
    }

    #[tokio::test]
    async fn mock_transport_dropped_link_is_hangup() {
        let (mut mock, link) = MockTransport::new();
        drop(link);

        let mut buf = [0u8; 8];
        let result = mock.receive(&mut buf, Duration::from_millis(100)).await;
        assert!(matches!(result.unwrap_err(), Error::ConnectionLost));
    }

    #[tokio::test]
    async fn mock_transport_disconnect() {
        let (mut mock, _link) = MockTransport::new();
        assert!(mock.is_connected());

        mock.close().await.unwrap();
        assert!(!mock.is_connected());

        let result = mock.send(&[0x01]).await;
        assert!(matches!(result.unwrap_err(), Error::NotConnected));
    }

    #[tokio::test]
    async fn mock_transport_set_connected() {
        let (mut mock, _link) = MockTransport::new();
        mock.set_connected(false);

        let mut buf = [0u8; 8];
        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result.unwrap_err(), Error::NotConnected));
    }

    #[tokio::test]
    async fn mock_transport_partial_receive() {
        let (mut mock, link) = MockTransport::new();
        link.push(&[0xAA, 0xBB, 0xCC, 0xDD]);

        let mut buf = [0u8; 2];
        let n = mock
            .receive(&mut buf, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(&buf[..n], &[0xAA, 0xBB]);

        let n = mock
            .receive(&mut buf, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(&buf[..n], &[0xCC, 0xDD]);
    }
}
