//! # Aggregator module
//!
//! Folds the frames of a single stream into running composite images using constant memory:
//!
//! - timex: the per-pixel mean of every frame,
//! - brightest: the per-pixel maximum,
//! - darkest: the per-pixel minimum,
//! - variance: the per-pixel variance, rescaled to fill the 8 bit range.
//!
//! The mean and variance use Welford's online algorithm, accumulated in `f64` so long runs do not
//! drift.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use ndarray::{Array3, Zip};

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::stream_spec::StreamSpec;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Largest value of an output sample.
pub const OUTPUT_MAX: u8 = std::u8::MAX;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Running statistics for one stream.
#[derive(Debug, Clone)]
pub struct AggregationState {
    /// Running mean of every frame
    pub mean: Array3<f64>,

    /// Brightest value seen at each sample
    pub max_image: Array3<u8>,

    /// Darkest value seen at each sample
    pub min_image: Array3<u8>,

    /// Accumulated squared deviation from the running mean
    pub sum_sq_dev: Array3<f64>
}

/// Folds frames of a single stream into an `AggregationState`.
#[derive(Debug, Clone)]
pub struct Aggregator {
    shape: (usize, usize, usize),

    state: Option<AggregationState>,

    count: u64
}

/// The final composite images of a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Composites {
    /// Mean image, truncated to 8 bits
    pub timex: Array3<u8>,

    /// Per-pixel maximum
    pub brightest: Array3<u8>,

    /// Per-pixel minimum
    pub darkest: Array3<u8>,

    /// Per-pixel variance rescaled so the smallest variance is 0 and the largest is `OUTPUT_MAX`
    pub variance: Array3<u8>,

    /// Smallest and largest unscaled variance in the image
    pub variance_range: (f64, f64),

    /// Number of frames the composites were built from
    pub frame_count: u64
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Aggregator {
    /// Create an empty aggregator for frames of the given stream.
    pub fn new(spec: &StreamSpec) -> Self {
        Self::with_shape(spec.frame_shape())
    }

    /// Create an empty aggregator for frames shaped `(height, width, channels)`.
    pub fn with_shape(shape: (usize, usize, usize)) -> Self {
        Self {
            shape,
            state: None,
            count: 0
        }
    }

    /// Number of frames folded in so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// The running statistics, `None` until the first frame has been folded in.
    pub fn state(&self) -> Option<&AggregationState> {
        self.state.as_ref()
    }

    /// Population variance of every sample, before any rescaling.
    pub fn variance(&self) -> Option<Array3<f64>> {
        self.state.as_ref().map(|s| &s.sum_sq_dev / self.count as f64)
    }

    /// Fold a frame into the running statistics.
    ///
    /// Fails with `DimensionMismatch` if the frame is not the declared shape, in which case the
    /// statistics are left untouched.
    pub fn update(&mut self, frame: &Frame) -> Result<()> {
        if frame.shape() != self.shape {
            return Err(Error::DimensionMismatch {
                expected: self.shape,
                found: frame.shape()
            });
        }

        if let Some(state) = self.state.as_mut() {
            let n = (self.count + 1) as f64;

            // The squared deviation needs the mean from before this frame (via delta) and after it
            Zip::from(&mut state.mean)
                .and(&mut state.sum_sq_dev)
                .and(&mut state.max_image)
                .and(&mut state.min_image)
                .and(frame.view())
                .apply(|mean, sum_sq_dev, max, min, &px| {
                    let x = f64::from(px);
                    let delta = x - *mean;

                    *mean += delta / n;
                    *sum_sq_dev += delta * (x - *mean);

                    if px > *max {
                        *max = px;
                    }
                    if px < *min {
                        *min = px;
                    }
                });
        }
        else {
            self.state = Some(AggregationState {
                mean: frame.view().mapv(f64::from),
                max_image: frame.view().to_owned(),
                min_image: frame.view().to_owned(),
                sum_sq_dev: Array3::zeros(self.shape)
            });
        }

        self.count += 1;

        Ok(())
    }

    /// Produce the composite images, consuming the aggregator.
    pub fn finalize(self) -> Result<Composites> {
        let state = match self.state {
            Some(s) if self.count > 0 => s,
            _ => return Err(Error::EmptyAggregation)
        };

        let timex = state.mean.mapv(to_output);

        let variance = &state.sum_sq_dev / self.count as f64;
        let (lo, hi) = variance.fold(
            (std::f64::INFINITY, std::f64::NEG_INFINITY),
            |(lo, hi), &v| (lo.min(v), hi.max(v))
        );

        // A uniform variance has no range to stretch over, so it maps to zero everywhere
        let range = hi - lo;
        let scaled = if range > 0.0 {
            variance.mapv(|v| to_output((v - lo) / range * f64::from(OUTPUT_MAX)))
        }
        else {
            Array3::zeros(variance.dim())
        };

        Ok(Composites {
            timex,
            brightest: state.max_image,
            darkest: state.min_image,
            variance: scaled,
            variance_range: (lo, hi),
            frame_count: self.count
        })
    }
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Truncate a working precision value into an output sample.
fn to_output(v: f64) -> u8 {
    if v <= 0.0 {
        0
    }
    else if v >= f64::from(OUTPUT_MAX) {
        OUTPUT_MAX
    }
    else {
        v as u8
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {

    use super::*;

    fn frame(values: &[u8]) -> Frame {
        Frame::from_raw(values.len() as u32, 1, 1, values.to_vec()).expect("Bad frame")
    }

    fn aggregate(frames: &[Frame]) -> Aggregator {
        let mut agg = Aggregator::with_shape(frames[0].shape());
        for f in frames {
            agg.update(f).expect("Update failed");
        }
        agg
    }

    #[test]
    fn test_count_tracks_updates() {
        let mut agg = Aggregator::with_shape((1, 3, 1));

        for n in 1..=7 {
            agg.update(&frame(&[n, n, n])).expect("Update failed");
            assert_eq!(agg.count(), n as u64);
        }
    }

    #[test]
    fn test_first_update_initialises_state() {
        let agg = aggregate(&[frame(&[4, 9, 200])]);
        let state = agg.state().expect("No state after an update");

        assert_eq!(state.mean.iter().cloned().collect::<Vec<_>>(), vec![4.0, 9.0, 200.0]);
        assert_eq!(state.max_image.iter().cloned().collect::<Vec<_>>(), vec![4, 9, 200]);
        assert_eq!(state.min_image.iter().cloned().collect::<Vec<_>>(), vec![4, 9, 200]);
        assert!(state.sum_sq_dev.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_mean_matches_arithmetic_mean() {
        let frames = vec![
            frame(&[1, 250, 17]),
            frame(&[3, 251, 99]),
            frame(&[8, 0, 45]),
            frame(&[200, 13, 46])
        ];

        let agg = aggregate(&frames);
        let mean = &agg.state().unwrap().mean;

        for i in 0..3 {
            let expected = frames.iter()
                .map(|f| f64::from(f.view()[[0, i, 0]]))
                .sum::<f64>() / frames.len() as f64;
            assert!((mean[[0, i, 0]] - expected).abs() < 1e-9);
        }
    }

    /// Folding the same frames in a different order gives the same mean and variance
    #[test]
    fn test_order_invariance() {
        let frames = vec![
            frame(&[12, 100, 7]),
            frame(&[40, 90, 3]),
            frame(&[33, 255, 0]),
            frame(&[1, 4, 9]),
            frame(&[77, 66, 55])
        ];
        let mut reversed = frames.clone();
        reversed.reverse();

        let a = aggregate(&frames);
        let b = aggregate(&reversed);

        Zip::from(&a.state().unwrap().mean)
            .and(&b.state().unwrap().mean)
            .apply(|x, y| assert!((x - y).abs() < 1e-9));
        Zip::from(&a.variance().unwrap())
            .and(&b.variance().unwrap())
            .apply(|x, y| assert!((x - y).abs() < 1e-9));
    }

    #[test]
    fn test_extrema() {
        let agg = aggregate(&[
            frame(&[5, 100, 30]),
            frame(&[50, 10, 30]),
            frame(&[25, 55, 31])
        ]);
        let state = agg.state().unwrap();

        assert_eq!(state.max_image.iter().cloned().collect::<Vec<_>>(), vec![50, 100, 31]);
        assert_eq!(state.min_image.iter().cloned().collect::<Vec<_>>(), vec![5, 10, 30]);
    }

    #[test]
    fn test_dimension_mismatch_leaves_state() {
        let mut agg = aggregate(&[frame(&[1, 2, 3])]);

        match agg.update(&frame(&[1, 2])) {
            Err(Error::DimensionMismatch { expected, found }) => {
                assert_eq!(expected, (1, 3, 1));
                assert_eq!(found, (1, 2, 1));
            },
            other => panic!("Expected DimensionMismatch, got {:?}", other)
        }

        assert_eq!(agg.count(), 1);
    }

    #[test]
    fn test_finalize_empty() {
        match Aggregator::with_shape((2, 2, 3)).finalize() {
            Err(Error::EmptyAggregation) => (),
            other => panic!("Expected EmptyAggregation, got {:?}", other)
        }
    }

    /// Constant frames of 10, 20 and 30 give a uniform variance which rescales to zero
    #[test]
    fn test_uniform_variance() {
        let agg = aggregate(&[
            Frame::filled(3, 3, 1, 10),
            Frame::filled(3, 3, 1, 20),
            Frame::filled(3, 3, 1, 30)
        ]);

        for &v in agg.variance().unwrap().iter() {
            assert!((v - 200.0 / 3.0).abs() < 1e-9);
        }

        let composites = agg.finalize().expect("Finalize failed");

        assert!(composites.timex.iter().all(|&v| v == 20));
        assert!(composites.brightest.iter().all(|&v| v == 30));
        assert!(composites.darkest.iter().all(|&v| v == 10));
        assert!(composites.variance.iter().all(|&v| v == 0));
        assert_eq!(composites.frame_count, 3);
    }

    #[test]
    fn test_variance_rescale() {
        // Variances are 0, 1 and 4
        let agg = aggregate(&[frame(&[7, 10, 20]), frame(&[7, 12, 24])]);

        let raw = agg.variance().unwrap();
        assert_eq!(raw.iter().cloned().collect::<Vec<_>>(), vec![0.0, 1.0, 4.0]);

        let composites = agg.finalize().unwrap();

        assert_eq!(composites.variance_range, (0.0, 4.0));
        assert_eq!(
            composites.variance.iter().cloned().collect::<Vec<_>>(),
            vec![0, 63, OUTPUT_MAX]
        );
    }

    #[test]
    fn test_timex_truncates() {
        let composites = aggregate(&[frame(&[1, 254]), frame(&[2, 255])]).finalize().unwrap();

        assert_eq!(composites.timex.iter().cloned().collect::<Vec<_>>(), vec![1, 254]);
    }
}
