//! # Stream specification module
//!
//! Describes a single camera stream which will be sampled by the scheduler, and provides loading
//! of a list of these from a configuration file.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde_any;

use crate::error::{Error, Result};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Specification of a single camera stream.
///
/// Pixels are always 8 bits per channel. The layout deserialises directly from the entries of the
/// `camera_settings` list in a stream configuration file:
///
/// ```json
/// { "camera_id": 0, "size": [1920, 1080], "duration": 600 }
/// ```
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct StreamSpec {
    /// Index of the camera this stream reads from
    pub camera_id: u32,

    /// Frame size as `[width, height]` in pixels
    pub size: [u32; 2],

    /// Number of channels per pixel
    #[serde(default = "default_channels")]
    pub channels: u32,

    /// Target interval between captures of this stream in seconds
    #[serde(default = "default_interval")]
    pub interval: f64,

    /// Total run duration in seconds
    pub duration: f64
}

/// A list of stream specifications, as stored in a configuration file.
#[derive(Deserialize, Debug, Clone)]
pub struct StreamConfig {
    pub camera_settings: Vec<StreamSpec>
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl StreamSpec {
    /// Create a new spec with a three channel frame.
    pub fn new(camera_id: u32, width: u32, height: u32, interval: f64, duration: f64) -> Self {
        Self {
            camera_id,
            size: [width, height],
            channels: default_channels(),
            interval,
            duration
        }
    }

    /// Set the number of channels per pixel.
    pub fn with_channels(mut self, channels: u32) -> Self {
        self.channels = channels;

        self
    }

    pub fn width(&self) -> u32 {
        self.size[0]
    }

    pub fn height(&self) -> u32 {
        self.size[1]
    }

    /// The shape every frame of this stream must have, as `(height, width, channels)`.
    pub fn frame_shape(&self) -> (usize, usize, usize) {
        (self.size[1] as usize, self.size[0] as usize, self.channels as usize)
    }

    /// Target interval between captures.
    ///
    /// Only meaningful on a validated spec.
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval)
    }

    /// Run duration.
    ///
    /// Only meaningful on a validated spec.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration)
    }

    /// Check the spec describes a stream which can actually be sampled.
    pub fn validate(&self) -> Result<()> {
        if self.size[0] == 0 || self.size[1] == 0 {
            return Err(Error::InvalidStreamSpec(format!(
                "camera {} has a zero frame size {:?}", self.camera_id, self.size
            )));
        }

        if self.channels == 0 {
            return Err(Error::InvalidStreamSpec(format!(
                "camera {} has zero channels", self.camera_id
            )));
        }

        if Duration::try_from_secs_f64(self.interval).is_err() {
            return Err(Error::InvalidStreamSpec(format!(
                "camera {} has an invalid interval of {}s", self.camera_id, self.interval
            )));
        }

        if Duration::try_from_secs_f64(self.duration).is_err() {
            return Err(Error::InvalidStreamSpec(format!(
                "camera {} has an invalid duration of {}s", self.camera_id, self.duration
            )));
        }

        Ok(())
    }
}

impl StreamConfig {
    /// Load the stream configuration from a file.
    ///
    /// The file type will be guessed at runtime, any file type supported by
    /// [`serde_any`](https://docs.rs/serde_any/0.5.0/serde_any/) is supported. Every spec in the
    /// file is validated.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        if !path.as_ref().exists() {
            return Err(Error::FileNotFound(path.as_ref().to_path_buf()));
        }

        let config: StreamConfig = serde_any::from_file(path)
            .map_err(|e| Error::DeserialisationError(e))?;

        validate_specs(&config.camera_settings)?;

        Ok(config)
    }
}

// -----------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Validate a list of specs, including that no camera appears twice.
pub fn validate_specs(specs: &[StreamSpec]) -> Result<()> {
    let mut seen = HashSet::new();

    for spec in specs {
        spec.validate()?;

        if !seen.insert(spec.camera_id) {
            return Err(Error::InvalidStreamSpec(format!(
                "camera {} is listed more than once", spec.camera_id
            )));
        }
    }

    Ok(())
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

fn default_channels() -> u32 {
    3
}

fn default_interval() -> f64 {
    1.0
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
