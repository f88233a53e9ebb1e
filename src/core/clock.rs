//! Time source used at every suspension point.
//!
//! Poll slices, idle timers and pacing gaps all go through a [`Clock`] so the
//! session can run against real time or against a virtual clock in tests.

use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Monotonic time source with the ability to wait
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;

    /// Block the caller for `duration`
    fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation backed by `std::time` and `thread::sleep`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Virtual clock: `sleep` advances time instantly.
///
/// Clones share the same timeline, so a transport and a session built from
/// the same `ManualClock` agree on what "now" is.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Move time forward without anybody sleeping
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Virtual time since the clock was created
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.elapsed.lock()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
