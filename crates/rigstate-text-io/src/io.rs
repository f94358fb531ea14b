//! The single session IO task.
//!
//! One tokio task owns the transport and a [`LineSession`] state machine
//! exclusively. It feeds received lines, timer expiries and host commands to
//! the session, and writes whatever the session produced after each event.
//! Nothing else touches the transport or applies session state, so host
//! writes and radio reports are serialized on this task's timeline.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use rigstate_core::error::{Error, Result};
use rigstate_core::transport::Transport;

use crate::protocol::{classify_line, InboundLine, LineBuffer};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A protocol state machine driven by the IO task.
///
/// All methods are synchronous; outbound bytes are buffered by the session
/// and collected with [`LineSession::take_outbound`] after every call.
pub trait LineSession: Send + 'static {
    /// Requests queued by the host for this session.
    type Command: Send + 'static;

    /// A transport was attached.
    fn connected(&mut self);

    /// A host command was dequeued.
    fn host_command(&mut self, command: Self::Command);

    /// A complete line arrived.
    fn line_received(&mut self, line: InboundLine);

    /// When the session's pending timer expires, if one is armed.
    fn poll_deadline(&self) -> Option<Instant>;

    /// The deadline returned by [`LineSession::poll_deadline`] passed.
    fn timer_fired(&mut self);

    /// The transport failed or was closed underneath the session.
    fn disconnected(&mut self);

    /// Drain the bytes the session wants written, in order.
    fn take_outbound(&mut self) -> Vec<Vec<u8>>;
}

/// Everything the IO task owned, returned when it stops.
pub struct IoParts<S: LineSession> {
    pub transport: Box<dyn Transport>,
    pub session: S,
    pub commands: mpsc::UnboundedReceiver<S::Command>,
    /// `false` if the task stopped because the link failed.
    pub link_ok: bool,
}

/// Handle to a running IO task. Dropping the handle stops the task.
pub struct SessionIo<S: LineSession> {
    cancel: CancellationToken,
    task: JoinHandle<IoParts<S>>,
    _guard: DropGuard,
}

impl<S: LineSession> SessionIo<S> {
    /// Whether the task has stopped (cancelled or link lost).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the task and recover the transport, session and command queue.
    ///
    /// Fails with [`Error::NotConnected`] if the task panicked; everything it
    /// owned is lost with it.
    pub async fn shutdown(self) -> Result<IoParts<S>> {
        self.cancel.cancel();
        self.task.await.map_err(|_| Error::NotConnected)
    }
}

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Spawn the IO task.
///
/// `commands` carries host requests; each is handed to
/// [`LineSession::host_command`] between other session events.
pub fn spawn_session_task<S: LineSession>(
    transport: Box<dyn Transport>,
    session: S,
    commands: mpsc::UnboundedReceiver<S::Command>,
) -> SessionIo<S> {
    let cancel = CancellationToken::new();
    let task = tokio::spawn(io_loop(transport, session, commands, cancel.clone()));
    SessionIo {
        _guard: cancel.clone().drop_guard(),
        cancel,
        task,
    }
}

// ---------------------------------------------------------------------------
// IO Loop
// ---------------------------------------------------------------------------

/// Receive slice per loop iteration.
const RECEIVE_TIMEOUT: Duration = Duration::from_millis(100);

/// The main IO loop.
///
/// Uses `tokio::select! { biased; }` to prioritize:
/// 1. Cancellation
/// 2. Host commands
/// 3. The session's poll timer
/// 4. Reading from the radio
async fn io_loop<S: LineSession>(
    mut transport: Box<dyn Transport>,
    mut session: S,
    mut commands: mpsc::UnboundedReceiver<S::Command>,
    cancel: CancellationToken,
) -> IoParts<S> {
    let mut lines = LineBuffer::new();
    let mut buf = [0u8; 256];

    session.connected();
    let mut link_ok = flush(&mut *transport, &mut session).await;

    while link_ok {
        let deadline = session.poll_deadline();

        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("session IO task cancelled");
                break;
            }

            cmd = commands.recv() => {
                match cmd {
                    Some(cmd) => session.host_command(cmd),
                    None => {
                        debug!("command queue closed, exiting session IO task");
                        break;
                    }
                }
            }

            _ = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                session.timer_fired();
            }

            res = transport.receive(&mut buf, RECEIVE_TIMEOUT) => {
                match res {
                    Ok(n) => {
                        for line in lines.push(&buf[..n]) {
                            debug!(line = %String::from_utf8_lossy(&line), "received");
                            session.line_received(classify_line(&line));
                        }
                    }
                    Err(Error::Timeout) => {}
                    Err(e) => {
                        warn!(error = %e, "receive failed");
                        link_ok = false;
                    }
                }
            }
        }

        if link_ok {
            link_ok = flush(&mut *transport, &mut session).await;
        }
    }

    if !link_ok {
        session.disconnected();
        // The session may have queued bytes; the link is gone, drop them.
        let _ = session.take_outbound();
    }

    IoParts {
        transport,
        session,
        commands,
        link_ok,
    }
}

/// Write everything the session produced. Returns `false` if the link failed.
async fn flush<S: LineSession>(transport: &mut dyn Transport, session: &mut S) -> bool {
    for chunk in session.take_outbound() {
        debug!(cmd = %String::from_utf8_lossy(&chunk), "sending");
        if let Err(e) = transport.send(&chunk).await {
            warn!(error = %e, "write failed");
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rigstate_test_harness::MockTransport;
    use std::sync::Arc;

    #[derive(Debug, Default)]
    struct Log {
        lines: Vec<InboundLine>,
        timers: usize,
        commands: usize,
        connected: usize,
        disconnected: usize,
    }

    /// Records every callback; arms one timer `delay` after connecting.
    struct Recorder {
        log: Arc<Mutex<Log>>,
        delay: Option<Duration>,
        deadline: Option<Instant>,
        outbound: Vec<Vec<u8>>,
    }

    impl Recorder {
        fn new(delay: Option<Duration>) -> (Self, Arc<Mutex<Log>>) {
            let log = Arc::new(Mutex::new(Log::default()));
            let rec = Recorder {
                log: log.clone(),
                delay,
                deadline: None,
                outbound: Vec::new(),
            };
            (rec, log)
        }
    }

    impl LineSession for Recorder {
        type Command = Vec<u8>;

        fn connected(&mut self) {
            self.log.lock().connected += 1;
            self.deadline = self.delay.map(|d| Instant::now() + d);
            self.outbound.push(b"HELLO;".to_vec());
        }

        fn host_command(&mut self, command: Vec<u8>) {
            self.log.lock().commands += 1;
            self.outbound.push(command);
        }

        fn line_received(&mut self, line: InboundLine) {
            self.log.lock().lines.push(line);
        }

        fn poll_deadline(&self) -> Option<Instant> {
            self.deadline
        }

        fn timer_fired(&mut self) {
            self.log.lock().timers += 1;
            self.deadline = None;
            self.outbound.push(b"TICK;".to_vec());
        }

        fn disconnected(&mut self) {
            self.log.lock().disconnected += 1;
        }

        fn take_outbound(&mut self) -> Vec<Vec<u8>> {
            std::mem::take(&mut self.outbound)
        }
    }

    // -----------------------------------------------------------------------
    // Inbound lines
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn lines_are_framed_and_classified() {
        let (mock, link) = MockTransport::new();
        let (rec, log) = Recorder::new(None);
        let (_tx, rx) = mpsc::unbounded_channel();
        let io = spawn_session_task(Box::new(mock), rec, rx);

        link.push(b"FA0001407");
        link.push(b"4000;?;BN$03;");
        tokio::time::sleep(Duration::from_millis(10)).await;

        {
            let log = log.lock();
            assert_eq!(log.connected, 1);
            assert_eq!(log.lines.len(), 3);
            assert_eq!(
                log.lines[0],
                InboundLine::Message {
                    code: "FA".into(),
                    sub: false,
                    data: "00014074000".into(),
                }
            );
            assert_eq!(log.lines[1], InboundLine::Busy);
            assert!(matches!(&log.lines[2], InboundLine::Message { sub: true, .. }));
        }

        let parts = io.shutdown().await.unwrap();
        assert!(parts.link_ok);
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn connect_output_is_flushed_first() {
        let (mock, link) = MockTransport::new();
        let (rec, log) = Recorder::new(None);
        let (tx, rx) = mpsc::unbounded_channel();
        let io = spawn_session_task(Box::new(mock), rec, rx);

        tx.send(b"FA00007000000;".to_vec()).unwrap();
        tx.send(b"KS022;".to_vec()).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(link.sent_text(), "HELLO;FA00007000000;KS022;");
        assert_eq!(log.lock().commands, 2);
        io.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_at_deadline() {
        let (mock, link) = MockTransport::new();
        let (rec, log) = Recorder::new(Some(Duration::from_millis(40)));
        let (_tx, rx) = mpsc::unbounded_channel();
        let io = spawn_session_task(Box::new(mock), rec, rx);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(log.lock().timers, 0);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(log.lock().timers, 1);
        assert_eq!(link.sent_text(), "HELLO;TICK;");

        io.shutdown().await.unwrap();
    }

    // -----------------------------------------------------------------------
    // Link loss
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn hangup_stops_task_and_reports_disconnect() {
        let (mock, link) = MockTransport::new();
        let (rec, log) = Recorder::new(None);
        let (_tx, rx) = mpsc::unbounded_channel();
        let io = spawn_session_task(Box::new(mock), rec, rx);

        link.push(b"BN03;");
        link.hangup();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(io.is_finished());
        assert_eq!(log.lock().lines.len(), 1);
        assert_eq!(log.lock().disconnected, 1);

        let parts = io.shutdown().await.unwrap();
        assert!(!parts.link_ok);
        assert!(!parts.transport.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn closed_command_queue_ends_task_cleanly() {
        let (mock, _link) = MockTransport::new();
        let (rec, log) = Recorder::new(None);
        let (tx, rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let io = spawn_session_task(Box::new(mock), rec, rx);

        drop(tx);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(io.is_finished());
        assert_eq!(log.lock().disconnected, 0);
        assert!(io.shutdown().await.unwrap().link_ok);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_cancels_task() {
        let (mock, link) = MockTransport::new();
        let (rec, log) = Recorder::new(Some(Duration::from_millis(40)));
        let (_tx, rx) = mpsc::unbounded_channel();
        let io = spawn_session_task(Box::new(mock), rec, rx);
        tokio::time::sleep(Duration::from_millis(10)).await;

        drop(io);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(log.lock().timers, 0);
        assert_eq!(link.sent_text(), "HELLO;");
    }
}
