// demos/filter2d_bench.rs — CPU vs accelerated 2D convolution.
//
// Convolves a random 100×100 image with a random 50×50 filter on the
// single-threaded reference path, then runs each accelerated strategy
// twice (cold, warm) and prints the speedup.
//
//   cpu-parallel  always available (rayon)
//   gpu           only with an adapter that supports f64 shaders
//
// USAGE
// ─────
//   cargo run --release --example filter2d_bench
//   TIGHTBIND_WGPU_BACKEND=vulkan cargo run --release --example filter2d_bench

use tightbind::filter::{CpuFilter2d, Filter2d, ParallelFilter2d};
use tightbind::gpu::filter2d::GpuFilter2d;
use tightbind::timing::{compare, FilterBenchConfig};
use tracing::{info, warn};

fn main() -> tightbind::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let config = FilterBenchConfig::default();
    let (image, filt) = config.inputs();
    info!(image = ?image.shape(), filter = ?filt.shape(), "inputs");

    let mut strategies: Vec<Box<dyn Filter2d>> = vec![Box::new(ParallelFilter2d)];
    match GpuFilter2d::with_default_device() {
        Ok(gpu) => {
            info!(device = %gpu.device(), "GPU strategy enabled");
            strategies.push(Box::new(gpu));
        }
        Err(e) => warn!("skipping GPU strategy: {e}"),
    }

    for accelerated in &strategies {
        let report = compare(&CpuFilter2d, accelerated.as_ref(), &image, &filt)?;
        println!("{:?}", report.result);
        println!(
            "{}: baseline {:.6}s, cold {:.6}s, warm {:.6}s, max |diff| {:e}",
            report.accelerated_name,
            report.baseline.as_secs_f64(),
            report.cold.as_secs_f64(),
            report.warm.as_secs_f64(),
            report.max_diff,
        );
        println!(
            "{} is {:.2} times faster than {}",
            report.accelerated_name,
            report.speedup(),
            report.baseline_name
        );
    }
    Ok(())
}
