//! # Exporter module
//!
//! Hands the results of a run to their destination. `DiskExporter` writes every composite as an
//! image file named after the time of the run, the camera and the kind of image, e.g.
//!
//! ```text
//! 1688473815.000000.Tue.Jul.04.12_30_15.GMT.2023.c0.timex.jpg
//! ```
//!
//! Next to the composites it writes a `.gaps.txt` sidecar holding the frame count, the gap
//! statistics and the epoch of every capture that went into them.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use log::info;
use ndarray::ArrayView3;

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::gaps::GapSummary;
use crate::scheduler::CompositeResult;
use crate::stream_spec::StreamSpec;

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

/// Destination for the images produced by a run.
pub trait CompositeExporter {
    /// Export the warm-up frame captured for a stream before sampling starts.
    fn export_snapshot(
        &mut self,
        spec: &StreamSpec,
        frame: &Frame,
        timestamp: DateTime<Utc>
    ) -> Result<()>;

    /// Export the composites of a stream, along with its gap summary if one could be computed.
    fn export_composites(
        &mut self,
        result: &CompositeResult,
        gaps: Option<&GapSummary>
    ) -> Result<()>;
}

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

/// The kind of image an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Snap,
    Timex,
    Brightest,
    Darkest,
    Variance,
    Gaps
}

/// Channel order of three and four channel frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorOrder {
    Rgb,
    Bgr
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Writes images into a directory.
pub struct DiskExporter {
    output_dir: PathBuf,

    format: ImageFormat,

    color_order: ColorOrder,

    written: Vec<PathBuf>
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Role {
    pub fn tag(&self) -> &'static str {
        match self {
            Role::Snap => "snap",
            Role::Timex => "timex",
            Role::Brightest => "brightest",
            Role::Darkest => "darkest",
            Role::Variance => "variance",
            Role::Gaps => "gaps"
        }
    }
}

impl DiskExporter {
    /// Create an exporter writing JPEGs into `output_dir`, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        fs::create_dir_all(output_dir.as_ref()).map_err(|e| Error::IoError(e))?;

        Ok(Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            format: ImageFormat::Jpeg,
            color_order: ColorOrder::Rgb,
            written: Vec::new()
        })
    }

    /// Set the format images are written in.
    pub fn format(mut self, format: ImageFormat) -> Result<Self> {
        extension(format)?;
        self.format = format;

        Ok(self)
    }

    /// Set the channel order of incoming frames, which are always written as RGB.
    pub fn color_order(mut self, color_order: ColorOrder) -> Self {
        self.color_order = color_order;

        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Paths of every file written so far.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn write(
        &mut self,
        pixels: ArrayView3<'_, u8>,
        time: &DateTime<Utc>,
        camera_id: u32,
        role: Role
    ) -> Result<()> {
        let name = artifact_name(time, camera_id, role, extension(self.format)?);
        let path = self.output_dir.join(&name);

        array_to_image(pixels, self.color_order)?
            .save_with_format(&path, self.format)
            .map_err(|e| Error::ImageConversionError(e))?;

        info!("Saved {} image for camera {} as {}", role.tag(), camera_id, name);
        self.written.push(path);

        Ok(())
    }

    fn write_gaps(&mut self, result: &CompositeResult, gaps: Option<&GapSummary>) -> Result<()> {
        let name = artifact_name(&result.started_at, result.camera_id, Role::Gaps, "txt");
        let path = self.output_dir.join(&name);

        fs::write(&path, gap_report(result, gaps)).map_err(|e| Error::IoError(e))?;

        info!(
            "Saved capture log of {} frames for camera {} as {}",
            result.capture_log.len(), result.camera_id, name
        );
        self.written.push(path);

        Ok(())
    }
}

impl CompositeExporter for DiskExporter {
    fn export_snapshot(
        &mut self,
        spec: &StreamSpec,
        frame: &Frame,
        timestamp: DateTime<Utc>
    ) -> Result<()> {
        self.write(frame.view(), &timestamp, spec.camera_id, Role::Snap)
    }

    fn export_composites(
        &mut self,
        result: &CompositeResult,
        gaps: Option<&GapSummary>
    ) -> Result<()> {
        let images = &result.images;
        let time = &result.started_at;

        self.write(images.timex.view(), time, result.camera_id, Role::Timex)?;
        self.write(images.brightest.view(), time, result.camera_id, Role::Brightest)?;
        self.write(images.darkest.view(), time, result.camera_id, Role::Darkest)?;
        self.write(images.variance.view(), time, result.camera_id, Role::Variance)?;
        self.write_gaps(result, gaps)
    }
}

// -----------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Name of an artifact: epoch seconds, human readable UTC time, camera and role.
pub fn artifact_name(
    time: &DateTime<Utc>,
    camera_id: u32,
    role: Role,
    extension: &str
) -> String {
    format!(
        "{:.6}.{}.c{}.{}.{}",
        epoch_seconds(time),
        time.format("%a.%b.%d.%H_%M_%S.GMT.%Y"),
        camera_id,
        role.tag(),
        extension
    )
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

fn epoch_seconds(time: &DateTime<Utc>) -> f64 {
    time.timestamp() as f64 + f64::from(time.timestamp_subsec_micros()) / 1e6
}

/// Plain text capture report: a header of `key: value` lines, then one epoch per line.
fn gap_report(result: &CompositeResult, gaps: Option<&GapSummary>) -> String {
    let mut report = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(report, "camera: {}", result.camera_id);
    let _ = writeln!(report, "frames: {}", result.images.frame_count);
    match gaps {
        Some(g) => {
            let _ = writeln!(report, "gap_min: {:.6}", g.min);
            let _ = writeln!(report, "gap_median: {:.6}", g.median);
            let _ = writeln!(report, "gap_max: {:.6}", g.max);
        },
        None => {
            let _ = writeln!(report, "gaps: unavailable");
        }
    }
    let _ = writeln!(report, "epochs:");
    for time in &result.capture_log {
        let _ = writeln!(report, "{:.6}", epoch_seconds(time));
    }

    report
}

fn extension(format: ImageFormat) -> Result<&'static str> {
    match format {
        ImageFormat::Jpeg => Ok("jpg"),
        ImageFormat::Png => Ok("png"),
        ImageFormat::Bmp => Ok("bmp"),
        ImageFormat::Tiff => Ok("tif"),
        f => Err(Error::UnsupportedFormat(f))
    }
}

/// Convert a `(height, width, channels)` array into an image, dropping any alpha channel.
fn array_to_image(pixels: ArrayView3<'_, u8>, color_order: ColorOrder) -> Result<DynamicImage> {
    let (height, width, channels) = pixels.dim();
    let buffer_error = || Error::ImageBufferError { width, height, channels };

    let data: Vec<u8> = pixels.iter().cloned().collect();

    match channels {
        1 => GrayImage::from_raw(width as u32, height as u32, data)
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(buffer_error),
        3 | 4 => {
            let mut rgb = Vec::with_capacity(width * height * 3);
            for px in data.chunks(channels) {
                rgb.extend_from_slice(&px[..3]);
            }

            if color_order == ColorOrder::Bgr {
                for px in rgb.chunks_mut(3) {
                    px.swap(0, 2);
                }
            }

            RgbImage::from_raw(width as u32, height as u32, rgb)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(buffer_error)
        },
        _ => Err(buffer_error())
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {

    use super::*;
    use crate::aggregator::Aggregator;
    use chrono::TimeZone;

    fn run_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 7, 4, 12, 30, 15).unwrap()
    }

    #[test]
    fn test_artifact_name() {
        assert_eq!(
            artifact_name(&run_start(), 2, Role::Brightest, "jpg"),
            "1688473815.000000.Tue.Jul.04.12_30_15.GMT.2023.c2.brightest.jpg"
        );

        let with_micros = Utc.timestamp_opt(1688473815, 250_000_000).unwrap();
        assert!(artifact_name(&with_micros, 0, Role::Snap, "png")
            .starts_with("1688473815.250000.Tue.Jul.04.12_30_15"));
    }

    #[test]
    fn test_bgr_swap() {
        let frame = Frame::from_raw(1, 1, 3, vec![1, 2, 3]).unwrap();

        let img = array_to_image(frame.view(), ColorOrder::Bgr).unwrap().to_rgb8();
        assert_eq!(img.into_raw(), vec![3, 2, 1]);
    }

    #[test]
    fn test_alpha_dropped() {
        let frame = Frame::from_raw(2, 1, 4, vec![1, 2, 3, 4, 5, 6, 7, 8]).unwrap();

        let img = array_to_image(frame.view(), ColorOrder::Rgb).unwrap().to_rgb8();
        assert_eq!(img.into_raw(), vec![1, 2, 3, 5, 6, 7]);
    }

    #[test]
    fn test_unsupported_channels() {
        let frame = Frame::filled(2, 2, 2, 0);

        match array_to_image(frame.view(), ColorOrder::Rgb) {
            Err(Error::ImageBufferError { channels: 2, .. }) => (),
            other => panic!("Expected ImageBufferError, got {:?}", other.map(|_| ()))
        }
    }

    /// Test that every composite is written and reads back with the same pixels
    #[test]
    fn test_disk_export() {
        let dir = tempfile::tempdir().expect("Cannot create temporary directory");
        let out = dir.path().join("BlastBeach");
        let mut exporter = DiskExporter::new(&out)
            .expect("Cannot create exporter")
            .format(ImageFormat::Png)
            .expect("PNG should be supported");

        let mut agg = Aggregator::with_shape((3, 3, 1));
        for v in &[10, 20, 30] {
            agg.update(&Frame::filled(3, 3, 1, *v)).unwrap();
        }

        let result = CompositeResult {
            camera_id: 1,
            started_at: run_start(),
            images: agg.finalize().unwrap(),
            capture_log: Vec::new()
        };

        let spec = StreamSpec::new(1, 3, 3, 0.0, 1.0).with_channels(1);
        exporter.export_snapshot(&spec, &Frame::filled(3, 3, 1, 5), run_start()).unwrap();
        exporter.export_composites(&result, None).unwrap();

        assert_eq!(exporter.written().len(), 6);
        for path in exporter.written() {
            assert!(path.starts_with(&out));
            assert!(path.exists());
        }

        let timex_path = out.join(artifact_name(&run_start(), 1, Role::Timex, "png"));
        let timex = image::open(&timex_path).expect("Cannot read timex").to_luma8();
        assert!(timex.into_raw().iter().all(|&v| v == 20));
    }

    /// Test that the gap sidecar lists the statistics and every capture epoch
    #[test]
    fn test_gap_sidecar() {
        let dir = tempfile::tempdir().expect("Cannot create temporary directory");
        let mut exporter = DiskExporter::new(dir.path()).expect("Cannot create exporter");

        let mut agg = Aggregator::with_shape((2, 2, 1));
        for v in &[1, 2, 3] {
            agg.update(&Frame::filled(2, 2, 1, *v)).unwrap();
        }

        let capture_log = vec![
            Utc.timestamp_opt(1688473816, 0).unwrap(),
            Utc.timestamp_opt(1688473817, 500_000_000).unwrap(),
            Utc.timestamp_opt(1688473818, 0).unwrap()
        ];
        let result = CompositeResult {
            camera_id: 3,
            started_at: run_start(),
            images: agg.finalize().unwrap(),
            capture_log
        };
        let gaps = GapSummary { frame_count: 3, min: 0.5, median: 1.0, max: 1.5 };

        exporter.export_composites(&result, Some(&gaps)).unwrap();

        let path = dir.path().join(artifact_name(&run_start(), 3, Role::Gaps, "txt"));
        assert_eq!(exporter.written().last(), Some(&path));

        let report = fs::read_to_string(&path).expect("Cannot read sidecar");
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines, vec![
            "camera: 3",
            "frames: 3",
            "gap_min: 0.500000",
            "gap_median: 1.000000",
            "gap_max: 1.500000",
            "epochs:",
            "1688473816.000000",
            "1688473817.500000",
            "1688473818.000000"
        ]);
    }

    #[test]
    fn test_gap_sidecar_without_summary() {
        let mut agg = Aggregator::with_shape((1, 1, 1));
        agg.update(&Frame::filled(1, 1, 1, 7)).unwrap();

        let result = CompositeResult {
            camera_id: 0,
            started_at: run_start(),
            images: agg.finalize().unwrap(),
            capture_log: vec![run_start()]
        };

        let report = gap_report(&result, None);
        assert!(report.contains("frames: 1\n"));
        assert!(report.contains("gaps: unavailable\n"));
        assert!(report.ends_with("epochs:\n1688473815.000000\n"));
    }

    #[test]
    fn test_unsupported_format() {
        let dir = tempfile::tempdir().unwrap();

        assert!(DiskExporter::new(dir.path()).unwrap().format(ImageFormat::Gif).is_err());
    }
}
