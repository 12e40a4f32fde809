//! # `V4l2SourceBuilder` implementation
//!
//! This module implements the builder for V4L2 camera frame sources.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::path::{Path, PathBuf};

use image::ImageFormat;
use rscam::Config;

use crate::camstream::V4l2Source;
use crate::error::{Error, Result};
use crate::stream_spec::StreamSpec;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

pub struct V4l2SourceBuilder {
    path: Option<PathBuf>,

    img_format: ImageFormat,

    config: Config<'static>
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl V4l2SourceBuilder {
    pub fn new() -> Self {
        Self {
            path: None,
            img_format: ImageFormat::Jpeg,
            config: Config {
                format: b"MJPG",
                ..Config::default()
            }
        }
    }

    /// Builder for the camera described by a stream spec.
    ///
    /// The device is `/dev/video{camera_id}` and the resolution is the spec's frame size.
    pub fn from_spec(spec: &StreamSpec) -> Result<Self> {
        Ok(Self::new()
            .path(format!("/dev/video{}", spec.camera_id))?
            .resolution((spec.width(), spec.height())))
    }

    /// Device node to read frames from, e.g. `/dev/video1`.
    ///
    /// Fails with `FileNotFound` if nothing exists at `path`.
    pub fn path<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }

        self.path = Some(path.to_path_buf());

        Ok(self)
    }

    /// Driver frame interval as a `(numerator, denominator)` fraction of a second.
    ///
    /// This is the rate the device delivers at, not the sampling cadence of the stream, which the
    /// scheduler controls.
    pub fn interval(mut self, interval: (u32, u32)) -> Self {
        self.config.interval = interval;

        self
    }

    /// Frame size requested from the driver as `(width, height)`.
    pub fn resolution(mut self, resolution: (u32, u32)) -> Self {
        self.config.resolution = resolution;

        self
    }

    /// Set the format of the images.
    ///
    /// Uses the FourCC notation, default value is `b"MJPG"`. Only formats which can be decoded
    /// into an image are accepted.
    pub fn format(mut self, format: &'static [u8]) -> Result<Self> {
        self.img_format = format_from_fourcc(format).ok_or_else(|| Error::CamStartError(
            format!("Unsupported image format {}", String::from_utf8_lossy(format))
        ))?;
        self.config.format = format;

        Ok(self)
    }

    /// Interlacing mode, one of the `rscam::FIELD_*` constants.
    pub fn field(mut self, field: u32) -> Self {
        self.config.field = field;

        self
    }

    /// Number of driver buffers to queue. More buffers ride out slow captures at the cost of
    /// returning older frames.
    pub fn num_buffers(mut self, num_buffers: u32) -> Self {
        self.config.nbuffers = num_buffers;

        self
    }

    /// Build the source. The camera is not opened until the source is started.
    pub fn build(self) -> Result<V4l2Source> {
        let path = self.path
            .ok_or_else(|| Error::CamStartError(String::from("Missing camera path")))?;

        Ok(V4l2Source::new(path, self.config, self.img_format))
    }
}

impl Default for V4l2SourceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

fn format_from_fourcc(format: &[u8]) -> Option<ImageFormat> {
    match format {
        b"MJPG" => Some(ImageFormat::Jpeg),
        _ => None
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {

    use super::*;
    use crate::camstream::FrameSource;

    #[test]
    fn test_missing_path() {
        match V4l2SourceBuilder::new().build() {
            Err(Error::CamStartError(_)) => (),
            Err(e) => panic!("Expected CamStartError, got {:?}", e),
            Ok(_) => panic!("Built a source without a path")
        }
    }

    /// Test that every driver setting lands in the camera config
    #[test]
    fn test_config_settings() {
        let builder = V4l2SourceBuilder::new()
            .interval((1, 30))
            .resolution((1920, 1080))
            .field(rscam::FIELD_NONE)
            .num_buffers(4);

        assert_eq!(builder.config.interval, (1, 30));
        assert_eq!(builder.config.resolution, (1920, 1080));
        assert_eq!(builder.config.field, rscam::FIELD_NONE);
        assert_eq!(builder.config.nbuffers, 4);
        assert_eq!(builder.config.format, b"MJPG");
    }

    #[test]
    fn test_path_must_exist() {
        match V4l2SourceBuilder::new().path("/dev/does-not-exist") {
            Err(Error::FileNotFound(p)) => assert_eq!(p, PathBuf::from("/dev/does-not-exist")),
            Err(e) => panic!("Expected FileNotFound, got {:?}", e),
            Ok(_) => panic!("Accepted a missing device path")
        }

        let source = V4l2SourceBuilder::new()
            .path(std::env::temp_dir())
            .expect("Temporary directory should exist")
            .build();
        assert!(source.is_ok());
    }

    #[test]
    fn test_unsupported_format() {
        assert!(V4l2SourceBuilder::new().format(b"YUYV").is_err());
        assert!(V4l2SourceBuilder::new().format(b"MJPG").is_ok());
    }

    /// Test that a real camera produces frames of the requested size
    #[test]
    #[ignore]
    fn test_capture() {
        let spec = StreamSpec::new(0, 640, 480, 1.0, 10.0);
        let mut source = V4l2SourceBuilder::from_spec(&spec)
            .expect("Cannot open /dev/video0")
            .interval((1, 30))
            .build()
            .expect("Cannot build source");

        source.start().expect("Cannot start camera");
        let frame = source.capture().expect("Cannot capture frame");
        source.stop().expect("Cannot stop camera");

        assert_eq!(frame.shape(), spec.frame_shape());
    }
}
