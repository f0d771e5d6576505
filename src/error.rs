// error.rs — Crate-level error for programs driving both pipelines.
//
// Library functions return their own module error; this enum lets a demo
// `main` use `?` across modules.

use thiserror::Error;

use crate::convolution::ConvolutionError;
use crate::dispersion::DispersionError;
use crate::dos::DosError;
use crate::filter::FilterError;
use crate::gpu::device::GpuError;
use crate::histogram::HistogramError;
use crate::matrix::MatrixError;
use crate::plot::PlotError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("histogram: {0}")]
    Histogram(#[from] HistogramError),
    #[error("dispersion: {0}")]
    Dispersion(#[from] DispersionError),
    #[error("dos: {0}")]
    Dos(#[from] DosError),
    #[error("matrix: {0}")]
    Matrix(#[from] MatrixError),
    #[error("convolution: {0}")]
    Convolution(#[from] ConvolutionError),
    #[error("filter: {0}")]
    Filter(#[from] FilterError),
    #[error("gpu: {0}")]
    Gpu(#[from] GpuError),
    #[error("plot: {0}")]
    Plot(#[from] PlotError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
