//! # Timex composites from camera streams
//!
//! This crate samples one or more camera streams at a target cadence and incrementally builds four
//! composite images per stream without keeping any of the frames:
//!
//! - timex, the mean of every frame,
//! - brightest, the per-pixel maximum,
//! - darkest, the per-pixel minimum,
//! - variance, the per-pixel variance stretched over the full 8 bit range.
//!
//! The time of every capture is recorded as well, so the regularity of the sampling can be checked
//! once the run is over.
//!
//! ## Dependencies
//!
//! Camera access uses [`rscam`](https://github.com/loyd/rscam) over V4L2 and is behind the `v4l2`
//! feature, which needs the V4L2 dev headers:
//!
//! ```shell
//! sudo apt install v4l-utils libv4l-dev
//! ```
//!
//! ## Installation
//!
//! ```toml
//! [dependencies]
//! cv_timex = { version = "0.1", features = ["v4l2"] }
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cv_timex::prelude::*;
//!
//! let config = StreamConfig::from_file("camera_config.json")?;
//!
//! let mut streams: Vec<(StreamSpec, Box<dyn FrameSource>)> = Vec::new();
//! for spec in config.camera_settings {
//!     let source = V4l2SourceBuilder::from_spec(&spec)?.build()?;
//!     streams.push((spec, Box::new(source)));
//! }
//!
//! let mut exporter = DiskExporter::new("data/BlastBeach")?;
//! let report = CadenceScheduler::new(streams, SystemClock::new())?.run(&mut exporter)?;
//! ```
//!
//! Any other camera can be used by implementing [`FrameSource`] for it.

// -----------------------------------------------------------------------------------------------
// EXPORTS
// -----------------------------------------------------------------------------------------------

pub use aggregator::{AggregationState, Aggregator, Composites, OUTPUT_MAX};
#[cfg(feature = "v4l2")]
pub use builder::V4l2SourceBuilder;
#[cfg(feature = "v4l2")]
pub use camstream::V4l2Source;
pub use camstream::FrameSource;
pub use clock::{Clock, SystemClock};
pub use error::{Error, Result};
pub use exporter::{artifact_name, ColorOrder, CompositeExporter, DiskExporter, Role};
pub use frame::Frame;
pub use gaps::{CaptureLog, GapSummary, GapTracker};
pub use scheduler::{
    CadenceScheduler, CompositeResult, RunReport, SchedulerState, StopHandle, StreamOutcome,
    DEFAULT_SETTLE_TIME
};
pub use stream_spec::{validate_specs, StreamConfig, StreamSpec};

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

mod aggregator;
#[cfg(feature = "v4l2")]
mod builder;
mod camstream;
mod clock;
mod error;
mod exporter;
mod frame;
mod gaps;
mod scheduler;
mod stream_spec;

pub mod prelude {
    pub use crate::{CadenceScheduler, RunReport, StopHandle};
    pub use crate::{Clock, SystemClock};
    pub use crate::{CompositeExporter, DiskExporter};
    pub use crate::{Frame, FrameSource, StreamConfig, StreamSpec};
    #[cfg(feature = "v4l2")]
    pub use crate::{V4l2Source, V4l2SourceBuilder};
}
