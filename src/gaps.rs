//! # Capture gap module
//!
//! Records when each frame of a stream was captured, so that the regularity of the sampling can be
//! checked after the run.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

// -----------------------------------------------------------------------------------------------
// TYPES
// -----------------------------------------------------------------------------------------------

/// Capture timestamps of a stream, in the order they were recorded.
pub type CaptureLog = Vec<DateTime<Utc>>;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct GapTracker {
    log: CaptureLog
}

/// Statistics of the gaps between consecutive captures, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapSummary {
    /// Number of captures the gaps were measured over
    pub frame_count: usize,

    pub min: f64,

    pub median: f64,

    pub max: f64
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl GapTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a capture timestamp.
    ///
    /// Timestamps are not required to be in order.
    pub fn record(&mut self, timestamp: DateTime<Utc>) {
        self.log.push(timestamp);
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn log(&self) -> &[DateTime<Utc>] {
        &self.log
    }

    pub fn into_log(self) -> CaptureLog {
        self.log
    }

    /// Minimum, median and maximum of the gaps between consecutive timestamps.
    pub fn summarize(&self) -> Result<GapSummary> {
        if self.log.len() < 2 {
            return Err(Error::InsufficientSamples(self.log.len()));
        }

        let mut gaps: Vec<f64> = self.log
            .windows(2)
            .map(|w| seconds_between(&w[0], &w[1]))
            .collect();
        gaps.sort_by(|a, b| a.total_cmp(b));

        let mid = gaps.len() / 2;
        let median = if gaps.len() % 2 == 0 {
            (gaps[mid - 1] + gaps[mid]) / 2.0
        }
        else {
            gaps[mid]
        };

        Ok(GapSummary {
            frame_count: self.log.len(),
            min: gaps[0],
            median,
            max: gaps[gaps.len() - 1]
        })
    }
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Signed number of seconds from `a` to `b`, with microsecond resolution.
fn seconds_between(a: &DateTime<Utc>, b: &DateTime<Utc>) -> f64 {
    let gap = b.signed_duration_since(*a);

    match gap.num_microseconds() {
        Some(us) => us as f64 / 1e6,
        None => gap.num_milliseconds() as f64 / 1e3
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
