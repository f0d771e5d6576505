// tests/test_dos.rs — Integration tests for the density-of-states pipeline.

use tightbind::dispersion::DispersionError;
use tightbind::dos::{compute_dos, DensityOfStates, DosConfig, DosError};
use tightbind::histogram::{build_histogram, HistogramError};

fn small(grid_size: usize, bins: usize) -> DosConfig {
    DosConfig { grid_size, bins, ..DosConfig::default() }
}

#[test]
fn density_integrates_to_one() {
    let run = compute_dos(&small(24, 40)).unwrap();
    assert_eq!(run.histogram.sample_count, 24 * 24 * 24);
    assert_eq!(run.histogram.dropped, 0);
    assert_eq!(run.dos.len(), 40);
    assert!((run.dos.integral() - 1.0).abs() < 1e-9, "∫g = {}", run.dos.integral());
}

#[test]
fn energies_span_the_band() {
    let run = compute_dos(&small(20, 30)).unwrap();
    let e = run.dos.energies();
    assert!(e.windows(2).all(|w| w[0] < w[1]));
    assert!(e[0] > -6.0 && e[e.len() - 1] <= 6.0);
    assert!(run.dos.densities().iter().all(|&g| g >= 0.0));
    // The θ = -π corner sits exactly on the band top.
    assert_eq!(*run.histogram.edges.last().unwrap(), 6.0);
}

#[test]
fn parallel_sampling_gives_same_curve() {
    let seq = compute_dos(&small(18, 25)).unwrap();
    let par = compute_dos(&DosConfig { parallel: true, ..small(18, 25) }).unwrap();
    assert_eq!(seq.dos, par.dos);
    assert_eq!(seq.histogram, par.histogram);
}

#[test]
fn peak_is_a_curve_point() {
    let run = compute_dos(&small(16, 20)).unwrap();
    let (energy, density) = run.dos.peak().unwrap();
    assert!(run.dos.points().any(|p| p == (energy, density)));
    assert!(run.dos.densities().iter().all(|&g| g <= density));
}

#[test]
fn normalisation_uses_offered_samples() {
    let samples: Vec<f64> = (0..10).map(f64::from).collect();
    let hist = build_histogram(&samples, 5).unwrap();
    let dos = DensityOfStates::from_histogram(&hist);
    for &g in dos.densities() {
        assert!((g - 2.0 / 18.0).abs() < 1e-12);
    }
    assert!((dos.width() - 1.8).abs() < 1e-12);
}

#[test]
fn stage_errors_propagate() {
    assert_eq!(
        compute_dos(&small(0, 10)).unwrap_err(),
        DosError::Dispersion(DispersionError::EmptyGrid)
    );
    assert_eq!(compute_dos(&small(8, 0)).unwrap_err(), DosError::Histogram(HistogramError::ZeroBins));
    // One k-point is a single energy: no range to bin.
    assert_eq!(
        compute_dos(&small(1, 10)).unwrap_err(),
        DosError::Histogram(HistogramError::DegenerateRange { value: 6.0 })
    );
}
