//! The Elecraft protocol session.
//!
//! [`ElecraftSession`] is the state machine the IO task drives. It turns
//! received lines into cell updates, tracks communication health and runs
//! the polling cycle:
//!
//! ```text
//! connect ──► setup + full request, doubtful timer armed   (Initializing)
//! good line, health ok      ──► fast-reactive timer (40 ms) (Synced)
//! good line, health not ok  ──► clear health, setup + full request
//! fast-reactive timer       ──► FA;BN; + doubtful timer (1 s)
//! doubtful timer            ──► not-responding, FA;, re-arm (Doubtful)
//! ```
//!
//! Any line that moves `band` also triggers one full request, because
//! several values are band-dependent and the radio does not report them on
//! its own.
//!
//! Host writes arrive as [`HostCommand`]s and are applied here too, so a
//! cell and everything derived from it only ever change on the session's
//! timeline.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use rigstate_core::{Clock, CommHealth, Error, Result, SessionEvent, Value};
use rigstate_text_io::{InboundLine, LineSession};

use crate::commands::{lookup, Dispatch, DOUBTFUL_PROBE, FAST_PROBE, REQUEST_ALL, SETUP, STATUS_CODE};
use crate::poll::{PollAction, PollScheduler};
use crate::state::{RadioState, SessionState};
use crate::status::StatusFrame;

/// The key whose change forces a full request.
const BAND_KEY: &str = "band";

/// A host request, queued by cell write hooks and the radio handle.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    /// Store a validated value in `key` and, if it changed, send `command`.
    /// `command` is `None` when the value has no wire form.
    Write {
        key: String,
        value: Value,
        command: Option<Vec<u8>>,
    },
    /// Raw CAT text, sent as-is.
    Raw(Vec<u8>),
}

/// What a received message carries.
#[derive(Debug)]
enum Decoded {
    Ignored,
    Unknown,
    Updates(Vec<(String, Value)>),
}

fn decode_message(code: &str, sub: bool, data: &str) -> Result<Decoded> {
    if code == STATUS_CODE && !sub {
        let frame = StatusFrame::decode(data)?;
        return Ok(Decoded::Updates(
            frame
                .updates()
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        ));
    }
    match lookup(code, sub) {
        Dispatch::Ignored => Ok(Decoded::Ignored),
        Dispatch::Unknown => Ok(Decoded::Unknown),
        Dispatch::Field { key, decoder } => {
            let value = decoder
                .decode(data)
                .map_err(|e| Error::Protocol(format!("{key}: {e}")))?;
            Ok(Decoded::Updates(vec![(key, value)]))
        }
    }
}

pub struct ElecraftSession {
    state: Arc<RadioState>,
    poll: PollScheduler,
    outbound: Vec<Vec<u8>>,
}

impl ElecraftSession {
    pub fn new(state: Arc<RadioState>, clock: Arc<dyn Clock>) -> Self {
        ElecraftSession {
            state,
            poll: PollScheduler::new(clock),
            outbound: Vec::new(),
        }
    }

    /// The pending poll, if any.
    pub fn pending_poll(&self) -> Option<PollAction> {
        self.poll.pending()
    }

    fn send(&mut self, text: &str) {
        self.outbound.push(text.as_bytes().to_vec());
    }

    /// Ask for everything and wait for the radio to answer.
    fn request_all(&mut self) {
        debug!("requesting full radio state");
        self.send(REQUEST_ALL);
        self.poll.arm(PollAction::Doubtful);
        self.state.emit(SessionEvent::Resync);
    }

    /// Validate every update against its cell, then commit them all.
    /// Returns whether `band` changed.
    fn apply(&self, updates: Vec<(String, Value)>) -> Result<bool> {
        let mut staged = Vec::with_capacity(updates.len());
        for (key, value) in updates {
            match self.state.cell(&key) {
                Some(cell) => {
                    let value = cell
                        .check(&value)
                        .map_err(|e| Error::Protocol(e.to_string()))?;
                    staged.push((key, cell.clone(), value));
                }
                None => debug!(key = %key, "no cell for reported value"),
            }
        }

        let mut band_changed = false;
        for (key, cell, value) in staged {
            let changed = cell.set_internal(value)?;
            if changed && key == BAND_KEY {
                band_changed = true;
            }
        }
        Ok(band_changed)
    }

    fn handle_message(&mut self, code: &str, sub: bool, data: &str) {
        let band_changed = match decode_message(code, sub, data) {
            Ok(Decoded::Updates(updates)) => match self.apply(updates) {
                Ok(changed) => changed,
                Err(e) => return self.bad_data(code, data, &e),
            },
            Ok(Decoded::Ignored) => {
                trace!(code, "ignored message");
                false
            }
            Ok(Decoded::Unknown) => {
                debug!(code, sub, data, "unrecognized message");
                false
            }
            Err(e) => return self.bad_data(code, data, &e),
        };
        self.good_line(band_changed);
    }

    fn host_write(&mut self, key: &str, value: Value, command: Option<Vec<u8>>) {
        let Some(cell) = self.state.cell(key).cloned() else {
            debug!(key, "host write for unknown cell dropped");
            return;
        };
        match cell.set_internal(value) {
            Ok(true) => match command {
                Some(bytes) => self.outbound.push(bytes),
                None => warn!(key, value = %cell.get(), "value has no CAT encoding, not sent"),
            },
            Ok(false) => trace!(key, "host write matches current value"),
            Err(e) => warn!(key, error = %e, "host write rejected"),
        }
    }

    fn bad_data(&self, code: &str, data: &str, error: &Error) {
        warn!(code, data, error = %error, "failed to parse message from radio");
        self.state.set_health(CommHealth::BadData);
    }

    fn good_line(&mut self, band_changed: bool) {
        let resync = !self.state.health().is_ok();
        if resync {
            info!("radio responding, reinitializing");
            self.state.set_health(CommHealth::Ok);
            self.send(SETUP);
        } else if band_changed {
            debug!("band changed");
        }

        if resync || band_changed {
            self.request_all();
        }

        if resync {
            self.state.set_session_state(SessionState::Initializing);
        } else {
            self.poll.arm(PollAction::FastReactive);
            self.state.set_session_state(SessionState::Synced);
        }
    }
}

impl LineSession for ElecraftSession {
    type Command = HostCommand;

    fn connected(&mut self) {
        info!("connected to radio, initializing");
        self.state.set_session_state(SessionState::Initializing);
        self.state.set_health(CommHealth::NotResponding);
        self.state.emit(SessionEvent::Connected);
        self.send(SETUP);
        self.request_all();
    }

    fn host_command(&mut self, command: HostCommand) {
        match command {
            HostCommand::Write { key, value, command } => self.host_write(&key, value, command),
            HostCommand::Raw(bytes) => self.outbound.push(bytes),
        }
    }

    fn line_received(&mut self, line: InboundLine) {
        if self.state.session_state() == SessionState::Disconnected {
            trace!(?line, "line after disconnect ignored");
            return;
        }
        match line {
            InboundLine::Empty => {}
            InboundLine::Noise => debug!("discarding line with embedded NUL"),
            InboundLine::Busy => trace!("radio busy"),
            InboundLine::Malformed(text) => {
                warn!(line = %text, "malformed line from radio");
                self.state.set_health(CommHealth::BadData);
            }
            InboundLine::Message { code, sub, data } => self.handle_message(&code, sub, &data),
        }
    }

    fn poll_deadline(&self) -> Option<Instant> {
        self.poll.deadline()
    }

    fn timer_fired(&mut self) {
        match self.poll.fire() {
            Some(PollAction::FastReactive) => {
                self.send(FAST_PROBE);
                self.poll.arm(PollAction::Doubtful);
            }
            Some(PollAction::Doubtful) => {
                debug!("no response from radio, probing");
                self.state.set_health(CommHealth::NotResponding);
                self.send(DOUBTFUL_PROBE);
                self.poll.arm(PollAction::Doubtful);
                self.state.set_session_state(SessionState::Doubtful);
            }
            None => {}
        }
    }

    fn disconnected(&mut self) {
        warn!("serial link to radio lost");
        self.poll.cancel();
        self.outbound.clear();
        self.state.set_health(CommHealth::LinkLost);
        self.state.set_session_state(SessionState::Disconnected);
        self.state.emit(SessionEvent::Disconnected);
    }

    fn take_outbound(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.outbound)
    }
}

impl std::fmt::Debug for ElecraftSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElecraftSession")
            .field("poll", &self.poll)
            .field("outbound", &self.outbound.len())
            .finish()
    }
}
