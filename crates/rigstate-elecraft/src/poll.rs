//! Poll timer for a session.
//!
//! A session has at most one pending timer. Arming always replaces whatever
//! was pending, so two probes can never be scheduled at once.

use std::sync::Arc;
use std::time::Duration;

use rigstate_core::Clock;
use tokio::time::Instant;

/// Delay after a response before the next routine poll.
pub const FAST_REACTIVE_INTERVAL: Duration = Duration::from_millis(40);

/// Silence after which the radio is considered not responding.
pub const DOUBTFUL_TIMEOUT: Duration = Duration::from_secs(1);

/// What to do when the timer expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollAction {
    /// The radio answered recently; poll `FA;BN;`.
    FastReactive,
    /// Nothing arrived in time; mark not-responding and probe `FA;`.
    Doubtful,
}

impl PollAction {
    pub fn delay(self) -> Duration {
        match self {
            PollAction::FastReactive => FAST_REACTIVE_INTERVAL,
            PollAction::Doubtful => DOUBTFUL_TIMEOUT,
        }
    }
}

pub struct PollScheduler {
    clock: Arc<dyn Clock>,
    pending: Option<(Instant, PollAction)>,
}

impl PollScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        PollScheduler {
            clock,
            pending: None,
        }
    }

    /// Schedule `action` after its delay, replacing any pending timer.
    pub fn arm(&mut self, action: PollAction) {
        self.pending = Some((self.clock.now() + action.delay(), action));
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|(at, _)| at)
    }

    pub fn pending(&self) -> Option<PollAction> {
        self.pending.map(|(_, action)| action)
    }

    /// Whether the pending timer's deadline has passed on the clock.
    pub fn is_due(&self) -> bool {
        matches!(self.pending, Some((at, _)) if at <= self.clock.now())
    }

    /// Consume the pending timer. Called once its deadline has passed.
    pub fn fire(&mut self) -> Option<PollAction> {
        self.pending.take().map(|(_, action)| action)
    }
}

impl std::fmt::Debug for PollScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollScheduler")
            .field("pending", &self.pending)
            .finish()
    }
}
