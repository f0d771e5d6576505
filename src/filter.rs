// filter.rs — Interchangeable execution strategies for 2D convolution.
//
// Every strategy computes exactly `convolution::convolve2d`: same interior
// window, same flipped filter, zero borders. They differ only in where the
// arithmetic runs:
//
//   CpuFilter2d      — single-threaded reference (the authoritative result)
//   ParallelFilter2d — interior rows split across the rayon pool
//   GpuFilter2d      — f64 compute shader (see gpu/filter2d.rs)
//
// The timing harness takes two `&dyn Filter2d` and compares them, so a new
// backend only needs this trait.

use thiserror::Error;

use crate::convolution::{convolve2d, convolve2d_par, ConvolutionError};
use crate::gpu::device::GpuError;
use crate::matrix::Matrix;

/// Failure of a filter strategy.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error(transparent)]
    Shape(#[from] ConvolutionError),
    #[error(transparent)]
    Gpu(#[from] GpuError),
    /// Two strategies disagreed beyond the comparison tolerance.
    #[error("{strategy} differs from the reference by {max_diff:e}")]
    Mismatch { strategy: String, max_diff: f64 },
}

/// A 2D convolution backend.
pub trait Filter2d {
    /// Short human-readable name used in logs and reports.
    fn name(&self) -> &str;

    /// Convolve `image` with `filt`; see [`convolve2d`] for the exact contract.
    fn apply(&self, image: &Matrix, filt: &Matrix) -> Result<Matrix, FilterError>;
}

/// Single-threaded reference implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuFilter2d;

impl Filter2d for CpuFilter2d {
    fn name(&self) -> &str {
        "cpu"
    }

    fn apply(&self, image: &Matrix, filt: &Matrix) -> Result<Matrix, FilterError> {
        Ok(convolve2d(image, filt)?)
    }
}

/// Row-parallel implementation on the rayon global pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelFilter2d;

impl Filter2d for ParallelFilter2d {
    fn name(&self) -> &str {
        "cpu-parallel"
    }

    fn apply(&self, image: &Matrix, filt: &Matrix) -> Result<Matrix, FilterError> {
        Ok(convolve2d_par(image, filt)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_strategies_agree() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let img = Matrix::random(20, 24, &mut rng);
        let filt = Matrix::random(5, 7, &mut rng);
        let a = CpuFilter2d.apply(&img, &filt).unwrap();
        let b = ParallelFilter2d.apply(&img, &filt).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_shape_error_propagates() {
        let err = CpuFilter2d
            .apply(&Matrix::zeros(2, 2), &Matrix::zeros(3, 3))
            .unwrap_err();
        assert!(matches!(err, FilterError::Shape(ConvolutionError::FilterTooLarge { .. })));
    }

    #[test]
    fn test_names() {
        assert_eq!(CpuFilter2d.name(), "cpu");
        assert_eq!(ParallelFilter2d.name(), "cpu-parallel");
    }
}
