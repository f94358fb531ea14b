//! Time sources for poll scheduling.
//!
//! The session computes timer deadlines from an injected [`Clock`] so its
//! state machine can be stepped deterministically in tests with
//! [`ManualClock`]. Deadlines are [`tokio::time::Instant`]s, which the IO
//! task sleeps on directly.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Tokio's clock. Honors `tokio::time::pause` in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_only_on_request() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        assert_eq!(clock.now(), t0);
        clock.advance(Duration::from_millis(40));
        assert_eq!(clock.now() - t0, Duration::from_millis(40));
    }

    #[tokio::test(start_paused = true)]
    async fn system_clock_follows_paused_time() {
        let t0 = SystemClock.now();
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(SystemClock.now() - t0, Duration::from_secs(1));
    }
}
