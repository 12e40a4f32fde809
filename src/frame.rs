//! # Frame module
//!
//! A captured image, stored as an owned `height x width x channels` array of 8 bit samples.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::{DynamicImage, GenericImageView};
use ndarray::{Array3, ArrayView3};

use crate::error::{Error, Result};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// A single frame captured from a camera stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pixels: Array3<u8>
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Frame {
    /// Wrap an array shaped `(height, width, channels)`.
    pub fn from_array(pixels: Array3<u8>) -> Self {
        Self { pixels }
    }

    /// Build a frame from an interleaved, row major pixel buffer.
    pub fn from_raw(width: u32, height: u32, channels: u32, data: Vec<u8>) -> Result<Self> {
        let pixels = Array3::from_shape_vec(
            (height as usize, width as usize, channels as usize),
            data
        ).map_err(|e| Error::ShapeError(e))?;

        Ok(Self { pixels })
    }

    /// A frame where every sample has the same value.
    pub fn filled(width: u32, height: u32, channels: u32, value: u8) -> Self {
        Self {
            pixels: Array3::from_elem(
                (height as usize, width as usize, channels as usize),
                value
            )
        }
    }

    /// Convert a decoded image into a three channel RGB frame.
    pub fn from_dynamic(img: &DynamicImage) -> Self {
        let (width, height) = img.dimensions();
        let rgb = img.to_rgb8();

        // An RgbImage buffer always holds exactly width * height * 3 samples
        Self {
            pixels: Array3::from_shape_vec(
                (height as usize, width as usize, 3),
                rgb.into_raw()
            ).unwrap_or_else(|_| Array3::zeros((height as usize, width as usize, 3)))
        }
    }

    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    pub fn channels(&self) -> usize {
        self.pixels.dim().2
    }

    /// Shape as `(height, width, channels)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        self.pixels.dim()
    }

    pub fn view(&self) -> ArrayView3<'_, u8> {
        self.pixels.view()
    }

    pub fn into_array(self) -> Array3<u8> {
        self.pixels
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {

    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_from_raw() {
        let frame = Frame::from_raw(2, 3, 1, vec![0, 1, 2, 3, 4, 5]).expect("Bad shape");

        assert_eq!(frame.shape(), (3, 2, 1));
        assert_eq!(frame.view()[[2, 1, 0]], 5);
    }

    #[test]
    fn test_from_raw_wrong_length() {
        match Frame::from_raw(2, 3, 3, vec![0; 6]) {
            Err(Error::ShapeError(_)) => (),
            other => panic!("Expected ShapeError, got {:?}", other)
        }
    }

    #[test]
    fn test_from_dynamic() {
        let mut img = RgbImage::new(4, 2);
        img.put_pixel(3, 1, Rgb([10, 20, 30]));

        let frame = Frame::from_dynamic(&DynamicImage::ImageRgb8(img));

        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.view()[[1, 3, 2]], 30);
    }
}
