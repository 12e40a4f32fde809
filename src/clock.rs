//! # Clock module
//!
//! The scheduler reads time and waits through a `Clock`, so that pacing can be driven by
//! something other than the system clock.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

pub trait Clock {
    /// Monotonic time elapsed since some fixed, clock specific origin.
    fn monotonic(&self) -> Duration;

    /// Current wall clock time, used to timestamp captures.
    fn wall(&self) -> DateTime<Utc>;

    /// Block the calling thread for the given duration.
    fn sleep(&self, duration: Duration);
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }

    fn wall(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration)
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_system_clock_sleeps() {
        let clock = SystemClock::new();

        let before = clock.monotonic();
        clock.sleep(Duration::from_millis(5));

        assert!(clock.monotonic() - before >= Duration::from_millis(5));
    }
}
