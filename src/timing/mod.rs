//! Session timebase
//!
//! Every source, the mixer and the encoder stamp samples against one
//! `PTSClock` created when the session starts, which is what puts all
//! tracks of a recording in the same clock domain.

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic clock for presentation timestamps
#[derive(Debug, Clone)]
pub struct PTSClock {
    start: Arc<Instant>,
}

impl PTSClock {
    /// Create a new clock with the current instant as time zero
    pub fn new() -> Self {
        Self::from_instant(Instant::now())
    }

    /// Create a clock sharing an existing time zero
    pub fn from_instant(start: Instant) -> Self {
        Self {
            start: Arc::new(start),
        }
    }

    /// Seconds elapsed since time zero
    #[inline]
    pub fn pts(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Seconds between time zero and `instant`; zero if `instant` is earlier
    #[inline]
    pub fn pts_at(&self, instant: Instant) -> f64 {
        instant.saturating_duration_since(*self.start).as_secs_f64()
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn start_instant(&self) -> Instant {
        *self.start
    }
}

impl Default for PTSClock {
    fn default() -> Self {
        Self::new()
    }
}
