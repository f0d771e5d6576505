// timing.rs — Wall-clock timing and strategy comparison.
//
// The filter benchmark times the reference convolution once and an
// accelerated strategy twice. The first accelerated call is "cold": it may
// pay one-off costs (GPU shader compilation and buffer allocation, rayon
// pool start-up). The second is "warm" and is what the speedup is quoted
// against. Both accelerated outputs are checked against the reference.
//
// Criterion (benches/) gives statistically sound numbers; this module is
// the quick single-shot comparison the demo prints.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::filter::{Filter2d, FilterError};
use crate::matrix::{max_abs_diff, Matrix};

/// Run `f` and return its result with the elapsed wall time.
pub fn timed<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let out = f();
    (out, start.elapsed())
}

/// Sizes and seed for the filter benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterBenchConfig {
    /// Image shape `(rows, cols)`.
    pub image: (usize, usize),
    /// Filter shape `(rows, cols)`.
    pub filter: (usize, usize),
    /// Seed for the random image and filter.
    pub seed: u64,
}

impl Default for FilterBenchConfig {
    fn default() -> Self {
        FilterBenchConfig {
            image: (100, 100),
            filter: (50, 50),
            seed: 0x5eed,
        }
    }
}

impl FilterBenchConfig {
    /// Uniform [0, 1) image and filter drawn from the configured seed.
    pub fn inputs(&self) -> (Matrix, Matrix) {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let image = Matrix::random(self.image.0, self.image.1, &mut rng);
        let filt = Matrix::random(self.filter.0, self.filter.1, &mut rng);
        (image, filt)
    }
}

/// Relative tolerance when comparing strategy outputs. Reordered f64
/// summation over a 50×50 filter stays many orders of magnitude below it.
pub const MATCH_TOLERANCE: f64 = 1e-9;

/// Outcome of [`compare`].
#[derive(Debug, Clone)]
pub struct SpeedupReport {
    pub baseline_name: String,
    pub accelerated_name: String,
    pub baseline: Duration,
    /// First accelerated run.
    pub cold: Duration,
    /// Second accelerated run.
    pub warm: Duration,
    /// Largest absolute difference from the reference across both runs.
    pub max_diff: f64,
    /// Reference output, for printing.
    pub result: Matrix,
}

impl SpeedupReport {
    /// `baseline / warm`.
    pub fn speedup(&self) -> f64 {
        ratio(self.baseline, self.warm)
    }

    /// `baseline / cold`.
    pub fn cold_speedup(&self) -> f64 {
        ratio(self.baseline, self.cold)
    }
}

fn ratio(num: Duration, den: Duration) -> f64 {
    let d = den.as_secs_f64();
    if d == 0.0 {
        f64::INFINITY
    } else {
        num.as_secs_f64() / d
    }
}

/// Time `baseline` once and `accelerated` twice on the same inputs.
///
/// # Errors
/// Propagates any strategy failure, and returns
/// [`FilterError::Mismatch`] when an accelerated result differs from the
/// baseline by more than [`MATCH_TOLERANCE`] relative to the result scale.
pub fn compare(
    baseline: &dyn Filter2d,
    accelerated: &dyn Filter2d,
    image: &Matrix,
    filt: &Matrix,
) -> Result<SpeedupReport, FilterError> {
    let (reference, baseline_time) = timed(|| baseline.apply(image, filt));
    let reference = reference?;
    info!("2D filter took {:.6} seconds for {}", baseline_time.as_secs_f64(), baseline.name());

    let scale = reference.as_slice().iter().fold(1.0f64, |m, v| m.max(v.abs()));
    let mut max_diff = 0.0f64;
    let mut durations = [Duration::ZERO; 2];

    for (run, slot) in ["cold", "warm"].into_iter().zip(durations.iter_mut()) {
        let (out, elapsed) = timed(|| accelerated.apply(image, filt));
        let out = out?;
        *slot = elapsed;
        info!(
            run,
            "2D filter took {:.6} seconds for {}",
            elapsed.as_secs_f64(),
            accelerated.name()
        );

        let diff = max_abs_diff(&reference, &out).unwrap_or(f64::INFINITY);
        // Negated so a NaN diff fails the check.
        if !(diff <= MATCH_TOLERANCE * scale) {
            return Err(FilterError::Mismatch {
                strategy: accelerated.name().to_string(),
                max_diff: diff,
            });
        }
        max_diff = max_diff.max(diff);
    }

    let report = SpeedupReport {
        baseline_name: baseline.name().to_string(),
        accelerated_name: accelerated.name().to_string(),
        baseline: baseline_time,
        cold: durations[0],
        warm: durations[1],
        max_diff,
        result: reference,
    };
    info!(
        "{} is {:.2} times faster than {} (cold: {:.2})",
        report.accelerated_name,
        report.speedup(),
        report.baseline_name,
        report.cold_speedup()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{CpuFilter2d, ParallelFilter2d};

    /// A strategy that returns a perturbed result, to exercise the check.
    struct Skewed;

    impl Filter2d for Skewed {
        fn name(&self) -> &str {
            "skewed"
        }

        fn apply(&self, image: &Matrix, filt: &Matrix) -> Result<Matrix, FilterError> {
            let mut out = CpuFilter2d.apply(image, filt)?;
            let (r, c) = (out.rows() / 2, out.cols() / 2);
            out[(r, c)] += 1.0;
            Ok(out)
        }
    }

    /// A strategy that leaves one interior cell as NaN.
    struct Poisoned;

    impl Filter2d for Poisoned {
        fn name(&self) -> &str {
            "poisoned"
        }

        fn apply(&self, image: &Matrix, filt: &Matrix) -> Result<Matrix, FilterError> {
            let mut out = CpuFilter2d.apply(image, filt)?;
            let (r, c) = (out.rows() / 2, out.cols() / 2);
            out[(r, c)] = f64::NAN;
            Ok(out)
        }
    }

    fn small() -> FilterBenchConfig {
        FilterBenchConfig { image: (24, 20), filter: (5, 3), seed: 11 }
    }

    #[test]
    fn test_default_matches_reference_sizes() {
        let c = FilterBenchConfig::default();
        assert_eq!(c.image, (100, 100));
        assert_eq!(c.filter, (50, 50));
    }

    #[test]
    fn test_inputs_are_reproducible() {
        let (a, fa) = small().inputs();
        let (b, fb) = small().inputs();
        assert_eq!(a, b);
        assert_eq!(fa, fb);
        assert_eq!(a.shape(), (24, 20));
        assert_eq!(fa.shape(), (5, 3));
    }

    #[test]
    fn test_compare_parallel() {
        let (img, filt) = small().inputs();
        let report = compare(&CpuFilter2d, &ParallelFilter2d, &img, &filt).unwrap();
        assert_eq!(report.max_diff, 0.0);
        assert_eq!(report.accelerated_name, "cpu-parallel");
        assert_eq!(report.result.shape(), (24, 20));
        assert!(report.speedup() > 0.0);
    }

    #[test]
    fn test_compare_detects_mismatch() {
        let (img, filt) = small().inputs();
        let err = compare(&CpuFilter2d, &Skewed, &img, &filt).unwrap_err();
        assert!(matches!(err, FilterError::Mismatch { ref strategy, .. } if strategy == "skewed"));
    }

    #[test]
    fn test_compare_rejects_nan_output() {
        let (img, filt) = small().inputs();
        let err = compare(&CpuFilter2d, &Poisoned, &img, &filt).unwrap_err();
        match err {
            FilterError::Mismatch { strategy, max_diff } => {
                assert_eq!(strategy, "poisoned");
                assert!(max_diff.is_nan());
            }
            other => panic!("expected a mismatch, got {other}"),
        }
    }

    #[test]
    fn test_ratio_zero_denominator() {
        assert_eq!(ratio(Duration::from_millis(5), Duration::ZERO), f64::INFINITY);
        assert!((ratio(Duration::from_millis(10), Duration::from_millis(5)) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_timed_returns_value() {
        let (v, d) = timed(|| 41 + 1);
        assert_eq!(v, 42);
        assert!(d <= Duration::from_secs(1));
    }
}
