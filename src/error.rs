//! # `cv_timex` Error module
//!
//! Provides abstractions over errors which can occur during this crate's use.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::path::PathBuf;

use serde_any;
use thiserror;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// Result type used by faillible functions inside the `cv_timex` crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents errors which can occur during use of the `cv_timex` crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(
        "Frame shape {found:?} does not match the declared stream shape {expected:?} \
        (height, width, channels)"
    )]
    DimensionMismatch {
        expected: (usize, usize, usize),
        found: (usize, usize, usize)
    },

    #[error("Cannot finalise an aggregation which has not seen any frames")]
    EmptyAggregation,

    #[error("At least 2 capture timestamps are needed for a gap summary, only {0} recorded")]
    InsufficientSamples(usize),

    #[error("Error capturing camera image: {0}")]
    CameraCaptureError(std::io::Error),

    #[error("Error starting camera: {0}")]
    CamStartError(String),

    #[error("Error occured while converting an image: {0}")]
    ImageConversionError(image::ImageError),

    #[error("Cannot build a {width}x{height} image with {channels} channels")]
    ImageBufferError {
        width: usize,
        height: usize,
        channels: usize
    },

    #[error("Unsupported output image format {0:?}")]
    UnsupportedFormat(image::ImageFormat),

    #[error("Pixel buffer does not fit the requested shape: {0}")]
    ShapeError(ndarray::ShapeError),

    #[error("Cannot find file at {0:?}")]
    FileNotFound(PathBuf),

    #[error("Error deserialising data: {0}")]
    DeserialisationError(serde_any::Error),

    #[error("Invalid stream specification: {0}")]
    InvalidStreamSpec(String),

    #[error("No streams were given to the scheduler")]
    NoStreams,

    #[error("None of the camera streams could be started")]
    NoStreamsStarted,

    #[error("This scheduler has already completed a run")]
    SchedulerAlreadyRun,

    #[error("I/O error: {0}")]
    IoError(std::io::Error)
}
