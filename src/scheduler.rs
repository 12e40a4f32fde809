//! # Cadence Scheduler Module
//!
//! Drives a set of camera streams from a single control loop. Each round captures one frame from
//! every live stream in turn and folds it into that stream's aggregator and gap tracker. After each
//! capture the loop waits out whatever is left of the stream's target interval, so the cost of a
//! round grows with the number of streams.
//!
//! A run moves through `Priming -> Running -> Finalizing -> Done`. A stream whose camera fails is
//! disabled for the rest of the run and reported in the `RunReport`, the other streams carry on.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};

use crate::aggregator::{Aggregator, Composites};
use crate::camstream::FrameSource;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::exporter::CompositeExporter;
use crate::gaps::{CaptureLog, GapSummary, GapTracker};
use crate::stream_spec::{validate_specs, StreamSpec};

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Default time given to the cameras to settle after they are started.
pub const DEFAULT_SETTLE_TIME: Duration = Duration::from_secs(5);

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Starting the cameras and taking the warm-up frames
    Priming,

    /// Sampling frames until the run duration has passed
    Running,

    /// Building and exporting the composites
    Finalizing,

    /// Cameras stopped, nothing more to do
    Done
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Handle which asks a running scheduler to stop early.
///
/// The scheduler finishes the capture in progress and then finalizes with whatever frames it has.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stop: Arc<AtomicBool>
}

/// The composites of one stream together with its capture log.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeResult {
    pub camera_id: u32,

    /// Wall clock time sampling started at
    pub started_at: DateTime<Utc>,

    pub images: Composites,

    pub capture_log: CaptureLog
}

/// What happened to one stream during a run.
#[derive(Debug)]
pub struct StreamOutcome {
    pub camera_id: u32,

    /// Number of frames folded into the composites
    pub frame_count: u64,

    /// Frames which were captured but had the wrong shape
    pub skipped_frames: u64,

    /// `None` if the stream never aggregated a frame
    pub composite: Option<CompositeResult>,

    /// `None` if fewer than two frames were captured
    pub gaps: Option<GapSummary>,

    /// The start or capture error which disabled the stream
    pub capture_error: Option<Error>,

    pub export_error: Option<Error>
}

/// Outcome of every stream in a run, in the order the streams were given.
#[derive(Debug)]
pub struct RunReport {
    pub streams: Vec<StreamOutcome>
}

pub struct CadenceScheduler<C: Clock> {
    clock: C,

    streams: Vec<StreamSlot>,

    run_duration: Duration,

    settle_time: Duration,

    state: SchedulerState,

    stop: StopHandle
}

/// Everything owned by a single stream's processing path.
struct StreamSlot {
    spec: StreamSpec,

    source: Box<dyn FrameSource>,

    aggregator: Aggregator,

    gaps: GapTracker,

    started: bool,

    skipped_frames: u64,

    failure: Option<Error>
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

impl RunReport {
    /// Outcome of the given camera.
    pub fn stream(&self, camera_id: u32) -> Option<&StreamOutcome> {
        self.streams.iter().find(|s| s.camera_id == camera_id)
    }

    /// True if no stream hit a capture or export error.
    pub fn is_clean(&self) -> bool {
        self.streams.iter().all(|s| s.capture_error.is_none() && s.export_error.is_none())
    }
}

impl StreamSlot {
    fn is_live(&self) -> bool {
        self.started && self.failure.is_none()
    }

    fn disable(&mut self, e: Error) {
        error!("Camera {} disabled for the rest of the run: {}", self.spec.camera_id, e);
        self.failure = Some(e);
    }
}

impl<C: Clock> CadenceScheduler<C> {
    /// Create a scheduler for the given streams.
    ///
    /// Every spec is validated. The run duration is taken from the first stream and applies to all
    /// of them.
    pub fn new(streams: Vec<(StreamSpec, Box<dyn FrameSource>)>, clock: C) -> Result<Self> {
        if streams.is_empty() {
            return Err(Error::NoStreams);
        }

        let specs: Vec<StreamSpec> = streams.iter().map(|(s, _)| s.clone()).collect();
        validate_specs(&specs)?;

        let run_duration = specs[0].duration();

        let streams = streams
            .into_iter()
            .map(|(spec, source)| StreamSlot {
                aggregator: Aggregator::new(&spec),
                gaps: GapTracker::new(),
                spec,
                source,
                started: false,
                skipped_frames: 0,
                failure: None
            })
            .collect();

        Ok(Self {
            clock,
            streams,
            run_duration,
            settle_time: DEFAULT_SETTLE_TIME,
            state: SchedulerState::Priming,
            stop: StopHandle::new()
        })
    }

    /// Set how long to wait after starting the cameras before the warm-up capture.
    pub fn settle_time(mut self, settle_time: Duration) -> Self {
        self.settle_time = settle_time;

        self
    }

    /// Use an existing stop handle instead of the scheduler's own.
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;

        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn run_duration(&self) -> Duration {
        self.run_duration
    }

    /// A handle which can be used to end the run early from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Perform the whole run, handing the results to `exporter`.
    ///
    /// Fails only if the scheduler has already run or if no stream could be started, in which case
    /// any camera that was started is stopped again.
    pub fn run(&mut self, exporter: &mut dyn CompositeExporter) -> Result<RunReport> {
        if self.state != SchedulerState::Priming {
            return Err(Error::SchedulerAlreadyRun);
        }

        if let Err(e) = self.prime(exporter) {
            self.stop_sources();
            self.transition(SchedulerState::Done);
            return Err(e);
        }

        self.transition(SchedulerState::Running);
        let started_at = self.clock.wall();
        self.sample();

        self.transition(SchedulerState::Finalizing);
        let report = self.finalize(started_at, exporter);

        self.stop_sources();
        self.transition(SchedulerState::Done);

        Ok(report)
    }

    fn transition(&mut self, next: SchedulerState) {
        info!("Scheduler {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Start every camera, let them settle and take one warm-up frame from each.
    fn prime(&mut self, exporter: &mut dyn CompositeExporter) -> Result<()> {
        for slot in self.streams.iter_mut() {
            match slot.source.start() {
                Ok(()) => slot.started = true,
                Err(e) => slot.disable(e)
            }
        }

        if !self.streams.iter().any(StreamSlot::is_live) {
            return Err(Error::NoStreamsStarted);
        }

        if self.settle_time > Duration::from_secs(0) {
            self.clock.sleep(self.settle_time);
        }

        let clock = &self.clock;
        for slot in self.streams.iter_mut().filter(|s| s.is_live()) {
            match slot.source.capture() {
                Ok(frame) => {
                    if let Err(e) = exporter.export_snapshot(&slot.spec, &frame, clock.wall()) {
                        error!("Cannot export first frame of camera {}: {}", slot.spec.camera_id, e);
                    }
                },
                Err(e) => slot.disable(e)
            }
        }

        if !self.streams.iter().any(StreamSlot::is_live) {
            return Err(Error::NoStreamsStarted);
        }

        Ok(())
    }

    /// Capture rounds until the run duration has passed, a stop is requested or no stream is left.
    fn sample(&mut self) {
        let clock = &self.clock;
        let stop = &self.stop;
        let start = clock.monotonic();

        while elapsed_since(clock, start) < self.run_duration && !stop.is_stopped() {
            if !self.streams.iter().any(StreamSlot::is_live) {
                warn!("Every camera has failed, ending the run early");
                break;
            }

            for slot in self.streams.iter_mut().filter(|s| s.is_live()) {
                if stop.is_stopped() {
                    break;
                }

                capture_once(clock, slot);
            }
        }

        if stop.is_stopped() {
            info!("Stop requested after {:?}", elapsed_since(clock, start));
        }
    }

    /// Build every stream's composites and gap summary and export them.
    fn finalize(
        &mut self,
        started_at: DateTime<Utc>,
        exporter: &mut dyn CompositeExporter
    ) -> RunReport {
        let mut outcomes = Vec::with_capacity(self.streams.len());

        for slot in self.streams.iter_mut() {
            let camera_id = slot.spec.camera_id;
            let frame_count = slot.aggregator.count();

            info!("Camera {}: {} images captured", camera_id, frame_count);
            for ts in slot.gaps.log() {
                debug!("Camera {} capture at {}", camera_id, ts);
            }

            let gaps = match slot.gaps.summarize() {
                Ok(g) => {
                    info!(
                        "Camera {}: gap between images min {:.3}s, median {:.3}s, max {:.3}s",
                        camera_id, g.min, g.median, g.max
                    );
                    Some(g)
                },
                Err(e) => {
                    warn!("Camera {}: no gap summary: {}", camera_id, e);
                    None
                }
            };

            let aggregator = std::mem::replace(
                &mut slot.aggregator,
                Aggregator::new(&slot.spec)
            );
            let capture_log = std::mem::replace(&mut slot.gaps, GapTracker::new()).into_log();

            let composite = match aggregator.finalize() {
                Ok(images) => Some(CompositeResult {
                    camera_id,
                    started_at,
                    images,
                    capture_log
                }),
                Err(e) => {
                    warn!("Camera {}: no composites: {}", camera_id, e);
                    None
                }
            };

            let export_error = match composite {
                Some(ref c) => exporter.export_composites(c, gaps.as_ref()).err(),
                None => None
            };
            if let Some(ref e) = export_error {
                error!("Cannot export composites of camera {}: {}", camera_id, e);
            }

            outcomes.push(StreamOutcome {
                camera_id,
                frame_count,
                skipped_frames: slot.skipped_frames,
                composite,
                gaps,
                capture_error: slot.failure.take(),
                export_error
            });
        }

        RunReport { streams: outcomes }
    }

    fn stop_sources(&mut self) {
        for slot in self.streams.iter_mut().filter(|s| s.started) {
            if let Err(e) = slot.source.stop() {
                error!("Cannot stop camera {}: {}", slot.spec.camera_id, e);
            }
            slot.started = false;
        }
    }
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

fn elapsed_since<C: Clock>(clock: &C, start: Duration) -> Duration {
    clock.monotonic().checked_sub(start).unwrap_or_default()
}

/// One capture of one stream, padded out to the stream's target interval.
fn capture_once<C: Clock>(clock: &C, slot: &mut StreamSlot) {
    let cycle_start = clock.monotonic();

    match slot.source.capture() {
        Ok(frame) => {
            let timestamp = clock.wall();

            // The timestamp is only kept for frames which made it into the aggregation
            match slot.aggregator.update(&frame) {
                Ok(()) => slot.gaps.record(timestamp),
                Err(e) => {
                    warn!("Skipping frame from camera {}: {}", slot.spec.camera_id, e);
                    slot.skipped_frames += 1;
                }
            }
        },
        Err(e) => {
            slot.disable(e);
            return;
        }
    }

    let elapsed = elapsed_since(clock, cycle_start);
    let interval = slot.spec.interval();

    debug!("Camera {} capture took {:?}", slot.spec.camera_id, elapsed);

    if elapsed < interval {
        clock.sleep(interval - elapsed);
    }
}
