//! ElecraftRadio -- the user-facing handle.
//!
//! Cells can be read from any thread. Host writes are validated
//! synchronously and then queued for the session IO task, which stores the
//! value and sends the SET command on its own timeline.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::Instant;
use tracing::{debug, error, info};

use rigstate_core::{
    Cell, Clock, CommHealth, Error, Result, SessionEvent, StateCell, Transport, Value, ViewCell,
};
use rigstate_text_io::{spawn_session_task, IoParts, LineSession, SessionIo};

use crate::session::{ElecraftSession, HostCommand};
use crate::state::{RadioState, SessionState};

/// Key of the derived centre frequency view.
pub const IQ_CENTER_KEY: &str = "iq_center";

enum Link {
    Running(SessionIo<ElecraftSession>),
    /// Session stopped; the command queue is kept for the next link.
    Parked(mpsc::UnboundedReceiver<HostCommand>),
}

/// A live mirror of one Elecraft radio.
///
/// Construct with [`ElecraftBuilder`](crate::builder::ElecraftBuilder) or
/// [`connect`](crate::builder::connect).
pub struct ElecraftRadio {
    state: Arc<RadioState>,
    writes: mpsc::UnboundedSender<HostCommand>,
    clock: Arc<dyn Clock>,
    link: Mutex<Option<Link>>,
}

impl ElecraftRadio {
    /// Create the cells and start the session on `transport`. Must be called
    /// from within a tokio runtime.
    pub(crate) fn new(
        transport: Box<dyn Transport>,
        clock: Arc<dyn Clock>,
        event_capacity: usize,
    ) -> Result<Self> {
        let (writes, rx) = mpsc::unbounded_channel();
        let state = Arc::new(RadioState::new(&writes, event_capacity)?);
        let session = ElecraftSession::new(state.clone(), clock.clone());
        let io = spawn_session_task(transport, session, rx);
        Ok(ElecraftRadio {
            state,
            writes,
            clock,
            link: Mutex::new(Some(Link::Running(io))),
        })
    }

    // -----------------------------------------------------------------
    // Cells
    // -----------------------------------------------------------------

    /// A schema cell by key.
    pub fn cell(&self, key: &str) -> Result<Arc<Cell>> {
        match key {
            "errors" => Ok(self.state.errors.clone()),
            "iq_offset" => Ok(self.state.iq_offset.clone()),
            _ => self
                .state
                .cell(key)
                .cloned()
                .ok_or_else(|| Error::UnknownCell(key.to_string())),
        }
    }

    /// Any cell by key, including the derived `iq_center` view.
    pub fn state_cell(&self, key: &str) -> Result<Arc<dyn StateCell>> {
        if key == IQ_CENTER_KEY {
            let view: Arc<dyn StateCell> = self.state.iq_center.clone();
            return Ok(view);
        }
        let cell: Arc<dyn StateCell> = self.cell(key)?;
        Ok(cell)
    }

    /// Every key [`state_cell`](Self::state_cell) resolves, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.state.cells.keys().cloned().collect();
        keys.extend(["errors", IQ_CENTER_KEY, "iq_offset"].map(String::from));
        keys.sort();
        keys
    }

    pub fn iq_center_cell(&self) -> Arc<ViewCell> {
        self.state.iq_center.clone()
    }

    pub fn iq_offset(&self) -> f64 {
        self.state.iq_offset.get().as_f64().unwrap_or(0.0)
    }

    /// Current error text; empty when communication is healthy.
    pub fn errors(&self) -> String {
        self.state.errors.get().to_string()
    }

    pub fn health(&self) -> CommHealth {
        self.state.health()
    }

    pub fn session_state(&self) -> SessionState {
        self.state.session_state()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.state.subscribe_events()
    }

    /// Host write to any writable cell. Returns once the value is validated
    /// and queued; the cell changes when the session applies it.
    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        self.state_cell(key)?.set(value)
    }

    /// Queue raw CAT text. It must be empty or end with `;`.
    pub fn send_raw(&self, text: &str) -> Result<()> {
        if !(text.is_empty() || text.ends_with(';')) {
            return Err(Error::InvalidParameter(format!(
                "raw command must end with ';': {text:?}"
            )));
        }
        if text.is_empty() {
            return Ok(());
        }
        self.writes
            .send(HostCommand::Raw(text.as_bytes().to_vec()))
            .map_err(|_| Error::NotConnected)
    }

    /// Wait until the radio is answering.
    ///
    /// Fails with [`Error::NotResponding`] if it has not answered within
    /// `timeout`, and with [`Error::ConnectionLost`] if the link is down.
    pub async fn wait_responding(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut events = self.subscribe_events();
        loop {
            match self.health() {
                CommHealth::Ok => return Ok(()),
                CommHealth::LinkLost => return Err(Error::ConnectionLost),
                CommHealth::NotResponding | CommHealth::BadData => {}
            }
            match tokio::time::timeout_at(deadline, events.recv()).await {
                Ok(Ok(_)) | Ok(Err(RecvError::Lagged(_))) => {}
                Ok(Err(RecvError::Closed)) => return Err(Error::NotConnected),
                Err(_) => return Err(Error::NotResponding),
            }
        }
    }

    // -----------------------------------------------------------------
    // Link
    // -----------------------------------------------------------------

    /// Whether a session is running on a live link.
    pub async fn is_connected(&self) -> bool {
        matches!(&*self.link.lock().await, Some(Link::Running(io)) if !io.is_finished())
    }

    /// Stop the session and close the transport. Cells keep their values.
    pub async fn close(&self) -> Result<()> {
        let mut link = self.link.lock().await;
        self.stop(&mut link).await
    }

    /// Restart the session on a new transport.
    ///
    /// If an earlier session task panicked, its command queue went with it
    /// and the handle cannot be reconnected; this returns
    /// [`Error::NotConnected`] and a new radio must be built.
    pub async fn reconnect(&self, transport: Box<dyn Transport>) -> Result<()> {
        let mut link = self.link.lock().await;
        if let Err(e) = self.stop(&mut link).await {
            debug!(error = %e, "closing previous link failed");
        }
        match link.take() {
            Some(Link::Parked(mut rx)) => {
                // Writes made while disconnected were never sent; drop them.
                while rx.try_recv().is_ok() {}
                info!("reconnecting to radio");
                let session = ElecraftSession::new(self.state.clone(), self.clock.clone());
                *link = Some(Link::Running(spawn_session_task(transport, session, rx)));
                Ok(())
            }
            None => {
                error!("session task was lost; build a new radio to reconnect");
                Err(Error::NotConnected)
            }
            running @ Some(Link::Running(_)) => {
                *link = running;
                Err(Error::NotConnected)
            }
        }
    }

    async fn stop(&self, link: &mut Option<Link>) -> Result<()> {
        let io = match link.take() {
            Some(Link::Running(io)) => io,
            other => {
                *link = other;
                return Ok(());
            }
        };
        let IoParts {
            mut transport,
            mut session,
            commands,
            link_ok,
        } = match io.shutdown().await {
            Ok(parts) => parts,
            Err(e) => {
                // The link stays empty: the handle is unusable from here on.
                error!(error = %e, "session task panicked; radio handle can no longer reconnect");
                self.state.set_health(CommHealth::LinkLost);
                self.state.set_session_state(SessionState::Disconnected);
                self.state.emit(SessionEvent::Disconnected);
                return Err(e);
            }
        };
        if link_ok {
            session.disconnected();
        }
        *link = Some(Link::Parked(commands));
        transport.close().await
    }
}

impl std::fmt::Debug for ElecraftRadio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElecraftRadio")
            .field("state", &self.state)
            .finish()
    }
}
