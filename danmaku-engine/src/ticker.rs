//! Fixed-interval tick driver fed by a host clock

use std::time::{Duration, Instant};

/// Decides when the engine should tick.
///
/// The driver owns no thread or timer. The host calls [`due`] with its own
/// clock and gets back the real elapsed time once an interval has passed.
///
/// [`due`]: TickDriver::due
#[derive(Debug, Clone)]
pub struct TickDriver {
    interval: Duration,
    running: bool,
    last: Option<Instant>,
}

impl TickDriver {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: false,
            last: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts the driver; returns false if it was already running
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        self.last = None;
        true
    }

    /// Stops the driver; returns false if it was already stopped
    pub fn stop(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.running = false;
        self.last = None;
        true
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Milliseconds elapsed since the previous tick, if a tick is due at `now`.
    ///
    /// The first call after [`start`](TickDriver::start) only records the
    /// reference instant.
    pub fn due(&mut self, now: Instant) -> Option<f64> {
        if !self.running {
            return None;
        }
        let Some(last) = self.last else {
            self.last = Some(now);
            return None;
        };
        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.interval {
            return None;
        }
        self.last = Some(now);
        Some(elapsed.as_nanos() as f64 / 1_000_000.0)
    }
}
