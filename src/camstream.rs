//! # Camera Stream Module
//!
//! This module provides the `FrameSource` trait through which the scheduler acquires frames, and
//! with the `v4l2` feature enabled, a source reading from a V4L2 camera.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

#[cfg(feature = "v4l2")]
use std::path::PathBuf;

#[cfg(feature = "v4l2")]
use image::{DynamicImage, ImageFormat};
#[cfg(feature = "v4l2")]
use log::{debug, info};
#[cfg(feature = "v4l2")]
use rscam::{Camera, Config};

#[cfg(feature = "v4l2")]
use crate::error::Error;
use crate::error::Result;
use crate::frame::Frame;

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

/// A source of frames for a single camera stream.
pub trait FrameSource {
    /// Start acquisition.
    fn start(&mut self) -> Result<()>;

    /// Capture a frame from the stream, blocking until one is available.
    fn capture(&mut self) -> Result<Frame>;

    /// Stop acquisition.
    fn stop(&mut self) -> Result<()>;
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTS
// -----------------------------------------------------------------------------------------------

/// A camera accessed over V4L2, created by `V4l2SourceBuilder`.
#[cfg(feature = "v4l2")]
pub struct V4l2Source {
    path: PathBuf,

    config: Config<'static>,

    img_format: ImageFormat,

    camera: Option<Camera>
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

#[cfg(feature = "v4l2")]
impl V4l2Source {
    pub(crate) fn new(path: PathBuf, config: Config<'static>, img_format: ImageFormat) -> Self {
        Self {
            path,
            config,
            img_format,
            camera: None
        }
    }
}

#[cfg(feature = "v4l2")]
impl FrameSource for V4l2Source {
    /// Open the device and start streaming.
    fn start(&mut self) -> Result<()> {
        let path = self.path
            .to_str()
            .ok_or_else(|| Error::CamStartError(format!("Invalid device path {:?}", self.path)))?;

        let mut camera = Camera::new(path)
            .map_err(|e| Error::CamStartError(format!("{}", e)))?;

        camera.start(&self.config).map_err(|e| Error::CamStartError(format!("{}", e)))?;

        info!("Started camera at {:?}", self.path);
        self.camera = Some(camera);

        Ok(())
    }

    /// Capture an image from the camera.
    fn capture(&mut self) -> Result<Frame> {
        let camera = self.camera.as_ref().ok_or_else(|| Error::CameraCaptureError(
            std::io::Error::new(std::io::ErrorKind::NotConnected, "camera not started")
        ))?;

        // Get the frame from the camera
        let rscam_frame = camera.capture()
            .map_err(|e| Error::CameraCaptureError(e))?;

        debug!("Captured {} bytes from {:?}", rscam_frame.len(), self.path);

        // Convert the frame into an image
        Ok(Frame::from_dynamic(&rscam_frame_to_dynamic_image(&rscam_frame, self.img_format)?))
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(mut camera) = self.camera.take() {
            camera.stop().map_err(|e| Error::IoError(e))?;
            info!("Stopped camera at {:?}", self.path);
        }

        Ok(())
    }
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Convert an `rscam::Frame` struct into an `image::DynamicImage` struct.
#[cfg(feature = "v4l2")]
fn rscam_frame_to_dynamic_image(frame: &rscam::Frame, format: ImageFormat) -> Result<DynamicImage> {
    image::load_from_memory_with_format(frame, format)
        .map_err(|e| Error::ImageConversionError(e))
}
