//! Per-track aggregation of MFCC frames into a fingerprint

use crate::error::ExtractError;
use crate::fingerprint::Fingerprint;

/// Running element-wise mean of coefficient vectors
///
/// Uses the incremental form `mean += (x - mean) / n`, so no sum grows with
/// the track length and aggregating identical vectors returns them exactly.
#[derive(Debug, Clone)]
pub struct FingerprintAggregator {
    mean: Vec<f64>,
    count: usize,
}

impl FingerprintAggregator {
    pub fn new(dimension: usize) -> Self {
        Self {
            mean: vec![0.0; dimension],
            count: 0,
        }
    }

    pub fn dimension(&self) -> usize {
        self.mean.len()
    }

    /// Number of frames folded in so far
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn push(&mut self, coefficients: &[f64]) -> Result<(), ExtractError> {
        if coefficients.len() != self.mean.len() {
            return Err(ExtractError::DimensionMismatch {
                expected: self.mean.len(),
                found: coefficients.len(),
            });
        }

        self.count += 1;
        let n = self.count as f64;
        for (mean, &x) in self.mean.iter_mut().zip(coefficients) {
            *mean += (x - *mean) / n;
        }
        Ok(())
    }

    /// The mean vector, or `None` if no frame was pushed
    pub fn finish(self) -> Option<Fingerprint> {
        if self.count == 0 {
            None
        } else {
            Some(Fingerprint::new(self.mean))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_mean_of_frames() {
        let mut agg = FingerprintAggregator::new(2);
        agg.push(&[1.0, 10.0]).unwrap();
        agg.push(&[2.0, 20.0]).unwrap();
        agg.push(&[6.0, 0.0]).unwrap();
        assert_eq!(agg.count(), 3);

        let fp = agg.finish().unwrap();
        assert_abs_diff_eq!(fp.values()[0], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(fp.values()[1], 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_identical_frames_are_idempotent() {
        let frame = [0.1, -7.3, 1e-3, 42.0];
        let mut agg = FingerprintAggregator::new(frame.len());
        for _ in 0..1000 {
            agg.push(&frame).unwrap();
        }
        assert_eq!(agg.finish().unwrap().values(), &frame);
    }

    #[test]
    fn test_no_frames_gives_no_fingerprint() {
        assert!(FingerprintAggregator::new(13).finish().is_none());
    }

    #[test]
    fn test_wrong_length_is_rejected() {
        let mut agg = FingerprintAggregator::new(3);
        let err = agg.push(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, ExtractError::DimensionMismatch { expected: 3, found: 2 }));
        assert_eq!(agg.count(), 0);
    }
}
