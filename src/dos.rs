// dos.rs — Density of states from a dispersion histogram.
//
// A histogram of band energies is turned into a probability density by
// dividing each count by (total samples × bin width):
//
//   g(E_i) = counts[i] / (N · ΔE)
//
// so that Σ g(E_i) ΔE = 1 when no sample was dropped. N is the number of
// samples offered to the histogram (n³ for an n-point grid), not the number
// that landed in a bin.

use std::time::Duration;

use tracing::info;

use crate::dispersion::{DispersionError, TightBinding};
use crate::histogram::{build_histogram, Histogram, HistogramError};
use crate::timing::timed;

/// Parameters of one DOS run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DosConfig {
    /// k-points per axis; the grid has `grid_size³` samples.
    pub grid_size: usize,
    /// Hopping amplitude `t`.
    pub hopping: f64,
    /// Lattice constant `a`.
    pub lattice_constant: f64,
    /// Number of histogram bins.
    pub bins: usize,
    /// Sample the grid with rayon instead of a single thread.
    pub parallel: bool,
}

impl Default for DosConfig {
    fn default() -> Self {
        DosConfig {
            grid_size: 550,
            hopping: 1.0,
            lattice_constant: 1.0,
            bins: 350,
            parallel: false,
        }
    }
}

/// Failure of any stage of the DOS pipeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DosError {
    #[error(transparent)]
    Dispersion(#[from] DispersionError),
    #[error(transparent)]
    Histogram(#[from] HistogramError),
}

/// A normalised density-of-states curve.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityOfStates {
    energies: Vec<f64>,
    densities: Vec<f64>,
    width: f64,
}

impl DensityOfStates {
    /// Normalise a histogram into a probability density.
    pub fn from_histogram(hist: &Histogram) -> Self {
        let norm = hist.sample_count as f64 * hist.width;
        let densities = hist.counts.iter().map(|&c| c as f64 / norm).collect();
        DensityOfStates {
            energies: hist.midpoints.clone(),
            densities,
            width: hist.width,
        }
    }

    /// Bin-centre energies.
    pub fn energies(&self) -> &[f64] {
        &self.energies
    }

    /// Density at each energy.
    pub fn densities(&self) -> &[f64] {
        &self.densities
    }

    /// Energy bin width.
    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn len(&self) -> usize {
        self.energies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energies.is_empty()
    }

    /// `(energy, density)` pairs in ascending energy order.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.energies.iter().copied().zip(self.densities.iter().copied())
    }

    /// Riemann sum Σ g ΔE. Equals 1 up to round-off when nothing was dropped.
    pub fn integral(&self) -> f64 {
        self.densities.iter().sum::<f64>() * self.width
    }

    /// Energy of the largest density value. `None` for an empty curve.
    pub fn peak(&self) -> Option<(f64, f64)> {
        self.points()
            .fold(None, |best: Option<(f64, f64)>, p| match best {
                Some(b) if b.1 >= p.1 => Some(b),
                _ => Some(p),
            })
    }
}

/// Result of [`compute_dos`].
#[derive(Debug, Clone)]
pub struct DosRun {
    pub dos: DensityOfStates,
    pub histogram: Histogram,
    /// Wall time spent sampling the dispersion.
    pub sampling_time: Duration,
}

/// Sample the dispersion, histogram it and normalise.
pub fn compute_dos(config: &DosConfig) -> Result<DosRun, DosError> {
    let model = TightBinding::new(config.hopping, config.lattice_constant)?;

    let (samples, sampling_time) = timed(|| {
        if config.parallel {
            model.sample_par(config.grid_size)
        } else {
            model.sample(config.grid_size)
        }
    });
    let samples = samples?;
    info!(
        grid = config.grid_size,
        parallel = config.parallel,
        "DOS of 3d tight binding model took {:.3} seconds",
        sampling_time.as_secs_f64()
    );

    let histogram = build_histogram(&samples, config.bins)?;
    let dos = DensityOfStates::from_histogram(&histogram);
    Ok(DosRun { dos, histogram, sampling_time })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_reference_constants() {
        let c = DosConfig::default();
        assert_eq!(c.grid_size, 550);
        assert_eq!(c.bins, 350);
        assert_eq!(c.hopping, 1.0);
        assert_eq!(c.lattice_constant, 1.0);
    }

    #[test]
    fn test_density_normalisation() {
        let samples: Vec<f64> = (0..10).map(f64::from).collect();
        let hist = build_histogram(&samples, 5).unwrap();
        let dos = DensityOfStates::from_histogram(&hist);
        // 2 / (10 * 1.8)
        for &d in dos.densities() {
            assert!((d - 2.0 / 18.0).abs() < 1e-12);
        }
        assert!((dos.integral() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_small_run_integrates_to_one() {
        let config = DosConfig { grid_size: 12, bins: 24, ..DosConfig::default() };
        let run = compute_dos(&config).unwrap();
        assert_eq!(run.histogram.sample_count, 12 * 12 * 12);
        assert_eq!(run.dos.len(), 24);
        assert!((run.dos.integral() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_parallel_run_matches_sequential() {
        let seq = compute_dos(&DosConfig { grid_size: 10, bins: 16, ..DosConfig::default() })
            .unwrap();
        let par = compute_dos(&DosConfig {
            grid_size: 10,
            bins: 16,
            parallel: true,
            ..DosConfig::default()
        })
        .unwrap();
        assert_eq!(seq.histogram, par.histogram);
    }

    #[test]
    fn test_single_point_grid_is_degenerate() {
        let config = DosConfig { grid_size: 1, ..DosConfig::default() };
        assert!(matches!(
            compute_dos(&config),
            Err(DosError::Histogram(HistogramError::DegenerateRange { .. }))
        ));
    }

    #[test]
    fn test_peak() {
        let samples = vec![0.0, 1.0, 1.1, 1.2, 3.0];
        let hist = build_histogram(&samples, 3).unwrap();
        let dos = DensityOfStates::from_histogram(&hist);
        let (e, _) = dos.peak().unwrap();
        assert!((e - 1.5).abs() < 1e-12);
    }
}
