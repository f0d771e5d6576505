// histogram.rs — Uniform-bin histogram over f64 samples.
//
// The DOS pipeline needs numpy-style `histogram(samples, bins)` semantics
// over a few hundred million dispersion values. This module does it in one
// pass with arithmetic bin assignment instead of a search over edges:
//
//   width   = (max - min) / bins
//   edge[i] = min + i * width,   i in 0..=bins
//   edge[bins] = max             (exact; cumulative i * width drifts)
//
//   bin(x) = bins - 1                              if x == max
//          = floor(bins * (x - min) / (max - min)) otherwise
//
// The x == max rule closes the last bin on the right, the way numpy does.
// Every other bin is half-open [edge[i], edge[i+1]).
//
// A computed index outside [0, bins) is reported as `BinSlot::OutOfRange`
// and the sample is skipped, not counted and not an error. For samples
// drawn from the same slice that produced the edges this only happens
// through round-off; the counter is kept so callers can see it.

use thiserror::Error;
use tracing::debug;

/// Errors from building a histogram.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HistogramError {
    #[error("bin count must be at least 1")]
    ZeroBins,
    #[error("cannot histogram an empty sample sequence")]
    EmptySamples,
    #[error("sample {index} is not finite ({value})")]
    NonFinite { index: usize, value: f64 },
    /// Every sample has the same value, so the bin width is zero.
    #[error("degenerate range: all samples equal {value}")]
    DegenerateRange { value: f64 },
    /// `max - min` is not representable as a finite f64.
    #[error("sample range [{min}, {max}] overflows f64")]
    RangeOverflow { min: f64, max: f64 },
}

/// Outcome of assigning one value to a bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinSlot {
    /// The value belongs to bin `index`.
    Bin(usize),
    /// The value falls outside the histogram range and is not counted.
    OutOfRange,
}

/// A filled uniform histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// Per-bin sample counts. Length = bins.
    pub counts: Vec<u64>,
    /// Bin centres, index-aligned with `counts`.
    pub midpoints: Vec<f64>,
    /// Bin edges, length = bins + 1. The last edge is the exact maximum.
    pub edges: Vec<f64>,
    /// Uniform bin width.
    pub width: f64,
    /// Number of samples offered to the histogram.
    pub sample_count: usize,
    /// Samples whose computed bin fell outside [0, bins).
    pub dropped: usize,
}

impl Histogram {
    #[inline]
    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    /// Sum of all bin counts.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Range of a validated sample slice.
#[derive(Debug, Clone, Copy)]
struct Range {
    min: f64,
    max: f64,
}

/// Validate the inputs and find the sample range in one pass.
fn scan(samples: &[f64], bins: usize) -> Result<Range, HistogramError> {
    if bins == 0 {
        return Err(HistogramError::ZeroBins);
    }
    if samples.is_empty() {
        return Err(HistogramError::EmptySamples);
    }

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for (index, &value) in samples.iter().enumerate() {
        if !value.is_finite() {
            return Err(HistogramError::NonFinite { index, value });
        }
        min = min.min(value);
        max = max.max(value);
    }

    if min == max {
        return Err(HistogramError::DegenerateRange { value: min });
    }
    if !(max - min).is_finite() {
        return Err(HistogramError::RangeOverflow { min, max });
    }
    Ok(Range { min, max })
}

fn edges_for(range: Range, bins: usize) -> Vec<f64> {
    let width = (range.max - range.min) / bins as f64;
    let mut edges: Vec<f64> = (0..=bins).map(|i| range.min + i as f64 * width).collect();
    edges[bins] = range.max;
    edges
}

/// Uniform bin width `(max - min) / bins` for the given samples.
pub fn bin_width(samples: &[f64], bins: usize) -> Result<f64, HistogramError> {
    let range = scan(samples, bins)?;
    Ok((range.max - range.min) / bins as f64)
}

/// The `bins + 1` bin edges for the given samples.
///
/// Spacing is uniform except that the last edge is set to the exact sample
/// maximum, so the largest sample is never lost to round-off.
pub fn bin_edges(samples: &[f64], bins: usize) -> Result<Vec<f64>, HistogramError> {
    let range = scan(samples, bins)?;
    Ok(edges_for(range, bins))
}

/// The `bins` bin centres: left edge plus half the uniform width.
pub fn bin_midpoints(samples: &[f64], bins: usize) -> Result<Vec<f64>, HistogramError> {
    let range = scan(samples, bins)?;
    let width = (range.max - range.min) / bins as f64;
    Ok(midpoints_for(&edges_for(range, bins), width))
}

fn midpoints_for(edges: &[f64], width: f64) -> Vec<f64> {
    edges[..edges.len() - 1].iter().map(|e| e + 0.5 * width).collect()
}

/// Assign `x` to a bin given uniform `edges`.
///
/// `edges` should hold at least two strictly increasing values; the first
/// and last are the histogram range. A value equal to the last edge always
/// goes to the last bin. NaN maps to `OutOfRange`, and so does every value
/// when fewer than two edges are given.
#[inline]
pub fn compute_bin(x: f64, edges: &[f64]) -> BinSlot {
    if edges.len() < 2 {
        return BinSlot::OutOfRange;
    }
    let n = edges.len() - 1;
    let lo = edges[0];
    let hi = edges[n];

    if x == hi {
        return BinSlot::Bin(n - 1);
    }

    // Ratio first: n * (x - lo) can overflow on wide ranges.
    let pos = ((x - lo) / (hi - lo) * n as f64).floor();
    // `!(pos >= 0.0)` also catches NaN.
    if !(pos >= 0.0) || pos >= n as f64 {
        return BinSlot::OutOfRange;
    }
    BinSlot::Bin(pos as usize)
}

/// Histogram `samples` into `bins` uniform bins spanning [min, max].
///
/// Returns counts and midpoints (plus the edges and bookkeeping) in a
/// [`Histogram`].
///
/// # Errors
/// Fails on zero bins, empty input, any non-finite sample, or when all
/// samples are equal.
pub fn build_histogram(samples: &[f64], bins: usize) -> Result<Histogram, HistogramError> {
    let range = scan(samples, bins)?;
    let width = (range.max - range.min) / bins as f64;
    let edges = edges_for(range, bins);
    let midpoints = midpoints_for(&edges, width);

    debug!(
        bins,
        min = range.min,
        max = range.max,
        width,
        samples = samples.len(),
        "building histogram"
    );

    let mut counts = vec![0u64; bins];
    let mut dropped = 0usize;
    for &x in samples {
        match compute_bin(x, &edges) {
            BinSlot::Bin(i) => counts[i] += 1,
            BinSlot::OutOfRange => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!(dropped, "samples fell outside the histogram range");
    }

    Ok(Histogram {
        counts,
        midpoints,
        edges,
        width,
        sample_count: samples.len(),
        dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_to_nine() -> Vec<f64> {
        (0..10).map(f64::from).collect()
    }

    #[test]
    fn test_ten_integers_five_bins() {
        let h = build_histogram(&zero_to_nine(), 5).unwrap();
        assert!((h.width - 1.8).abs() < 1e-12);
        assert_eq!(h.counts, vec![2, 2, 2, 2, 2]);
        assert_eq!(h.dropped, 0);
    }

    #[test]
    fn test_edges_last_is_exact_max() {
        // 0.1 * 3 accumulates error; the last edge must still be exact.
        let samples = vec![0.0, 0.1, 0.2, 0.3];
        let edges = bin_edges(&samples, 3).unwrap();
        assert_eq!(edges.len(), 4);
        assert_eq!(edges[3], 0.3);
        assert_eq!(edges[0], 0.0);
    }

    #[test]
    fn test_midpoints() {
        let mids = bin_midpoints(&zero_to_nine(), 5).unwrap();
        let expected = [0.9, 2.7, 4.5, 6.3, 8.1];
        assert_eq!(mids.len(), 5);
        for (m, e) in mids.iter().zip(expected) {
            assert!((m - e).abs() < 1e-12, "{m} vs {e}");
        }
    }

    #[test]
    fn test_bin_width() {
        assert!((bin_width(&[2.0, 4.0], 4).unwrap() - 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_compute_bin_max_goes_last() {
        let edges = [0.0, 1.0, 2.0, 3.0];
        assert_eq!(compute_bin(3.0, &edges), BinSlot::Bin(2));
    }

    #[test]
    fn test_compute_bin_left_closed() {
        let edges = [0.0, 1.0, 2.0, 3.0];
        assert_eq!(compute_bin(0.0, &edges), BinSlot::Bin(0));
        assert_eq!(compute_bin(1.0, &edges), BinSlot::Bin(1));
        assert_eq!(compute_bin(1.999, &edges), BinSlot::Bin(1));
    }

    #[test]
    fn test_compute_bin_out_of_range() {
        let edges = [0.0, 1.0, 2.0];
        assert_eq!(compute_bin(-0.5, &edges), BinSlot::OutOfRange);
        assert_eq!(compute_bin(2.5, &edges), BinSlot::OutOfRange);
        assert_eq!(compute_bin(f64::NAN, &edges), BinSlot::OutOfRange);
    }

    #[test]
    fn test_compute_bin_too_few_edges() {
        assert_eq!(compute_bin(0.0, &[]), BinSlot::OutOfRange);
        assert_eq!(compute_bin(1.0, &[1.0]), BinSlot::OutOfRange);
    }

    #[test]
    fn test_range_overflow_rejected() {
        assert_eq!(
            build_histogram(&[-1e308, 0.0, 1e308], 4),
            Err(HistogramError::RangeOverflow { min: -1e308, max: 1e308 })
        );
        // Wide but representable ranges are still fine.
        let h = build_histogram(&[-1e307, 0.0, 1e307], 4).unwrap();
        assert_eq!(h.dropped, 0);
        assert_eq!(h.total(), 3);

        let h = build_histogram(&[-8e307, 0.0, 8e307], 350).unwrap();
        assert_eq!(h.counts[0], 1);
        assert_eq!(h.counts[175], 1);
        assert_eq!(h.counts[349], 1);
    }

    #[test]
    fn test_single_bin_holds_everything() {
        let h = build_histogram(&[1.0, 5.0, 3.0, 2.5], 1).unwrap();
        assert_eq!(h.counts, vec![4]);
        assert!((h.midpoints[0] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_bins() {
        assert_eq!(build_histogram(&[1.0, 2.0], 0), Err(HistogramError::ZeroBins));
    }

    #[test]
    fn test_empty() {
        assert_eq!(build_histogram(&[], 3), Err(HistogramError::EmptySamples));
    }

    #[test]
    fn test_degenerate() {
        assert_eq!(
            build_histogram(&[4.0; 5], 3),
            Err(HistogramError::DegenerateRange { value: 4.0 })
        );
    }

    #[test]
    fn test_non_finite() {
        let err = build_histogram(&[1.0, f64::INFINITY, 2.0], 3).unwrap_err();
        assert!(matches!(err, HistogramError::NonFinite { index: 1, .. }));
    }
}
