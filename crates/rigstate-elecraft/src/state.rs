//! Shared radio state: the cell set plus link status.
//!
//! One [`RadioState`] is shared between the user-facing
//! [`ElecraftRadio`](crate::radio::ElecraftRadio) handle and the session
//! running inside the IO task.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use rigstate_core::{Cell, CommHealth, Result, SessionEvent, Value, ValueType, ViewCell};

use crate::center::install_center;
use crate::schema::install;
use crate::session::HostCommand;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport attached.
    Disconnected,
    /// Setup sent; waiting for the radio to answer.
    Initializing,
    /// The radio is answering and routine polls are running.
    Synced,
    /// The radio went silent; probing until it answers.
    Doubtful,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Initializing => "initializing",
            SessionState::Synced => "synced",
            SessionState::Doubtful => "doubtful",
        };
        f.write_str(s)
    }
}

pub struct RadioState {
    pub(crate) cells: BTreeMap<String, Arc<Cell>>,
    pub(crate) errors: Arc<Cell>,
    pub(crate) iq_offset: Arc<Cell>,
    pub(crate) iq_center: Arc<ViewCell>,
    health: RwLock<CommHealth>,
    session_state: RwLock<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl RadioState {
    pub(crate) fn new(
        writes: &mpsc::UnboundedSender<HostCommand>,
        event_capacity: usize,
    ) -> Result<Self> {
        let cells = install(writes);
        let (iq_offset, iq_center) = install_center(&cells)?;
        let initial = CommHealth::NotResponding;
        let errors = Arc::new(
            Cell::new("errors", ValueType::Text).with_value(Value::from(initial.message()))?,
        );
        let (events, _) = broadcast::channel(event_capacity);
        Ok(RadioState {
            cells,
            errors,
            iq_offset,
            iq_center,
            health: RwLock::new(initial),
            session_state: RwLock::new(SessionState::Disconnected),
            events,
        })
    }

    pub(crate) fn cell(&self, key: &str) -> Option<&Arc<Cell>> {
        self.cells.get(key)
    }

    pub fn health(&self) -> CommHealth {
        *self.health.read()
    }

    /// Record a new health status. Updates `errors` and emits
    /// [`SessionEvent::HealthChanged`] only when the status changes.
    pub(crate) fn set_health(&self, health: CommHealth) {
        {
            let mut current = self.health.write();
            if *current == health {
                return;
            }
            *current = health;
        }
        info!(%health, "radio communication health changed");
        // Text accepts any string.
        let _ = self.errors.set_internal(Value::from(health.message()));
        self.emit(SessionEvent::HealthChanged(health));
    }

    pub fn session_state(&self) -> SessionState {
        *self.session_state.read()
    }

    pub(crate) fn set_session_state(&self, state: SessionState) {
        let mut current = self.session_state.write();
        if *current != state {
            debug!(from = %*current, to = %state, "session state");
            *current = state;
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Broadcast an event. Having no receivers is fine.
    pub(crate) fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

impl fmt::Debug for RadioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RadioState")
            .field("cells", &self.cells.len())
            .field("health", &self.health())
            .field("session_state", &self.session_state())
            .finish()
    }
}
