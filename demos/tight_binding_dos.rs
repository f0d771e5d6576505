// demos/tight_binding_dos.rs — Density of states of the 3D tight-binding model.
//
// Samples the dispersion on a 550³ k-grid (t = 1, a = 1), histograms it into
// 350 bins, normalises to a probability density, plots the curve with
// plotters and shows it in a minifb window. The (energy, density) table is
// logged as well.
//
// USAGE
// ─────
//   cargo run --release --example tight_binding_dos
//
// Raise the max level below to DEBUG to see the histogram parameters.

use tightbind::dos::{compute_dos, DosConfig};
use tightbind::plot::{plot_curve, Canvas, PlotStyle};
use tracing::info;

const WIDTH: usize = 800;
const HEIGHT: usize = 500;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let config = DosConfig { parallel: true, ..DosConfig::default() };
    info!(?config, "computing density of states");

    let run = compute_dos(&config)?;
    let dos = &run.dos;

    info!(
        bins = dos.len(),
        width = dos.width(),
        dropped = run.histogram.dropped,
        integral = dos.integral(),
        "normalised histogram"
    );
    if let Some((energy, density)) = dos.peak() {
        info!(energy, density, "peak");
    }
    for (energy, density) in dos.points().step_by(25) {
        info!("E = {energy:>8.4}  g(E) = {density:.6}");
    }

    let title = format!(
        "DOS, 3D tight binding: {}³ k-points, {} bins",
        config.grid_size, config.bins
    );
    let style = PlotStyle { caption: Some(title.clone()), ..PlotStyle::default() };
    let mut canvas = Canvas::new(WIDTH, HEIGHT);
    let bounds = plot_curve(&mut canvas, dos.energies(), dos.densities(), &style)?;
    info!(?bounds, "plot range");
    let pixels = canvas.to_0rgb();
    let mut window = minifb::Window::new(
        &title,
        WIDTH,
        HEIGHT,
        minifb::WindowOptions { resize: false, ..Default::default() },
    )?;
    window.set_target_fps(60);

    info!("window open, press Escape or close to exit");
    while window.is_open() && !window.is_key_down(minifb::Key::Escape) {
        window.update_with_buffer(&pixels, WIDTH, HEIGHT)?;
    }
    Ok(())
}
