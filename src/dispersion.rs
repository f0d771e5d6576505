// dispersion.rs — 3D tight-binding dispersion sampled on a k-space grid.
//
// Simple-cubic nearest-neighbour tight binding:
//
//   E(kx, ky, kz) = -2t [cos(kx a) + cos(ky a) + cos(kz a)]
//
// The first Brillouin zone [-π/a, π/a) is sampled with n points per axis.
// Grid index m maps to
//
//   θ(m) = -π/a + m · 2π / (n a)
//
// and the sampler emits E for every (i, j, k) in [0, n)³ with i outermost
// and k innermost. Downstream histogramming does not care about order, but
// anything that plots or diffs raw samples does, so both the sequential and
// the rayon sampler produce exactly the same sequence.

use std::f64::consts::PI;

use rayon::prelude::*;
use thiserror::Error;
use tracing::debug;

/// Errors from invalid model or grid parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispersionError {
    #[error("grid must have at least one point per axis")]
    EmptyGrid,
    #[error("lattice constant must be finite and non-zero (got {0})")]
    InvalidLatticeConstant(f64),
    #[error("hopping term must be finite (got {0})")]
    InvalidHopping(f64),
    #[error("grid of {0}^3 points overflows usize")]
    GridTooLarge(usize),
}

/// Parameters of the tight-binding model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TightBinding {
    /// Nearest-neighbour hopping amplitude `t`.
    pub hopping: f64,
    /// Lattice constant `a`.
    pub lattice_constant: f64,
}

impl TightBinding {
    /// Validated constructor.
    pub fn new(hopping: f64, lattice_constant: f64) -> Result<Self, DispersionError> {
        if !hopping.is_finite() {
            return Err(DispersionError::InvalidHopping(hopping));
        }
        if !lattice_constant.is_finite() || lattice_constant == 0.0 {
            return Err(DispersionError::InvalidLatticeConstant(lattice_constant));
        }
        Ok(TightBinding { hopping, lattice_constant })
    }

    /// Wave-vector component of grid index `m` on an `n`-point axis.
    #[inline]
    pub fn theta(&self, m: usize, n: usize) -> f64 {
        let a = self.lattice_constant;
        -PI / a + m as f64 * (2.0 * PI) / (n as f64 * a)
    }

    /// Band energy at grid point (i, j, k).
    #[inline]
    pub fn energy(&self, i: usize, j: usize, k: usize, n: usize) -> f64 {
        -2.0 * self.hopping
            * (self.theta(i, n).cos() + self.theta(j, n).cos() + self.theta(k, n).cos())
    }

    /// Band width `12 |t|` of the simple-cubic band, `E ∈ [-6|t|, 6|t|]`.
    pub fn band_width(&self) -> f64 {
        12.0 * self.hopping.abs()
    }

    /// Sample every grid point sequentially. See [`sample_dispersion`].
    pub fn sample(&self, n: usize) -> Result<Vec<f64>, DispersionError> {
        let total = grid_len(n)?;
        // Each axis only has n distinct cosines; the inner loop is three
        // table lookups instead of three cos() calls.
        let cosines = self.axis_cosines(n);
        let scale = -2.0 * self.hopping;

        let mut out = Vec::with_capacity(total);
        for &ci in &cosines {
            for &cj in &cosines {
                for &ck in &cosines {
                    out.push(scale * (ci + cj + ck));
                }
            }
        }
        debug!(n, samples = out.len(), "sampled dispersion");
        Ok(out)
    }

    /// Sample every grid point with rayon, one i-slab per task.
    ///
    /// Output is identical (value and order) to [`TightBinding::sample`].
    pub fn sample_par(&self, n: usize) -> Result<Vec<f64>, DispersionError> {
        let total = grid_len(n)?;
        let cosines = self.axis_cosines(n);
        let scale = -2.0 * self.hopping;
        let slab = n * n;

        let mut out = vec![0.0f64; total];
        out.par_chunks_mut(slab)
            .zip(cosines.par_iter())
            .for_each(|(chunk, &ci)| {
                let mut idx = 0;
                for &cj in &cosines {
                    for &ck in &cosines {
                        chunk[idx] = scale * (ci + cj + ck);
                        idx += 1;
                    }
                }
            });
        debug!(n, samples = out.len(), "sampled dispersion (parallel)");
        Ok(out)
    }

    fn axis_cosines(&self, n: usize) -> Vec<f64> {
        (0..n).map(|m| self.theta(m, n).cos()).collect()
    }
}

fn grid_len(n: usize) -> Result<usize, DispersionError> {
    if n == 0 {
        return Err(DispersionError::EmptyGrid);
    }
    n.checked_mul(n)
        .and_then(|nn| nn.checked_mul(n))
        .ok_or(DispersionError::GridTooLarge(n))
}

/// Evaluate the dispersion on an `n × n × n` grid.
///
/// Returns `n³` energies in (i, j, k) nested-loop order, k fastest.
pub fn sample_dispersion(
    n: usize,
    hopping: f64,
    lattice_constant: f64,
) -> Result<Vec<f64>, DispersionError> {
    TightBinding::new(hopping, lattice_constant)?.sample(n)
}

/// Parallel variant of [`sample_dispersion`] with identical output.
pub fn sample_dispersion_par(
    n: usize,
    hopping: f64,
    lattice_constant: f64,
) -> Result<Vec<f64>, DispersionError> {
    TightBinding::new(hopping, lattice_constant)?.sample_par(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_point_grid() {
        // n = 1 → θ(0) = -π → E = -2(-1 - 1 - 1) = 6.
        let e = sample_dispersion(1, 1.0, 1.0).unwrap();
        assert_eq!(e.len(), 1);
        assert!((e[0] - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_length_is_cube() {
        assert_eq!(sample_dispersion(7, 1.0, 1.0).unwrap().len(), 343);
    }

    #[test]
    fn test_order_k_fastest() {
        let tb = TightBinding::new(0.7, 2.0).unwrap();
        let n = 4;
        let e = tb.sample(n).unwrap();
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    let got = e[(i * n + j) * n + k];
                    let want = tb.energy(i, j, k, n);
                    assert!((got - want).abs() < 1e-12, "({i},{j},{k}): {got} vs {want}");
                }
            }
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let tb = TightBinding::new(1.3, 0.5).unwrap();
        assert_eq!(tb.sample(9).unwrap(), tb.sample_par(9).unwrap());
    }

    #[test]
    fn test_energies_within_band() {
        let tb = TightBinding::new(2.0, 1.0).unwrap();
        let half = tb.band_width() / 2.0;
        for e in tb.sample(10).unwrap() {
            assert!(e.abs() <= half + 1e-12);
        }
    }

    #[test]
    fn test_theta_spans_zone() {
        let tb = TightBinding::new(1.0, 1.0).unwrap();
        assert!((tb.theta(0, 8) + PI).abs() < 1e-15);
        // Index n lands on +π; the grid itself stops one step before it.
        assert!((tb.theta(8, 8) - PI).abs() < 1e-12);
        assert!(tb.theta(7, 8) < PI);
    }

    #[test]
    fn test_invalid_parameters() {
        assert_eq!(sample_dispersion(0, 1.0, 1.0), Err(DispersionError::EmptyGrid));
        assert_eq!(
            sample_dispersion(3, 1.0, 0.0),
            Err(DispersionError::InvalidLatticeConstant(0.0))
        );
        assert!(matches!(
            sample_dispersion(3, f64::NAN, 1.0),
            Err(DispersionError::InvalidHopping(_))
        ));
    }
}
