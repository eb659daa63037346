//! Monotonic session clock
//!
//! Wraps `std::time::Instant` so that timestamps are:
//! - Monotonic (never go backward within a session)
//! - Relative to the session origin, in fractional milliseconds
//! - Cheap to sample from the pointer callback thread

use std::time::{Duration, Instant};

/// Clock measuring elapsed time since the start of a recording session
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    origin: Instant,
}

impl SessionClock {
    /// Start a new session clock at the current instant
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Start a clock at an explicit origin
    pub fn starting_at(origin: Instant) -> Self {
        Self { origin }
    }

    /// Move the origin to now; later samples restart near zero
    pub fn restart(&mut self) {
        self.origin = Instant::now();
    }

    /// Session origin
    #[inline]
    pub fn origin(&self) -> Instant {
        self.origin
    }

    /// Milliseconds elapsed since the origin
    #[inline]
    pub fn elapsed_ms(&self) -> f64 {
        Self::millis_between(self.origin, Instant::now())
    }

    /// Milliseconds between two instants, saturating at zero
    #[inline]
    pub fn millis_between(earlier: Instant, later: Instant) -> f64 {
        duration_to_millis(later.saturating_duration_since(earlier))
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::start()
    }
}

/// Convert a duration to fractional milliseconds
#[inline]
pub fn duration_to_millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}
