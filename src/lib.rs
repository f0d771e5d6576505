// tightbind: tight-binding density of states and 2D convolution benchmarks.
//
// Two independent pipelines share this crate:
//
//   dispersion → histogram → dos → plot        (density of states)
//   matrix → convolution → filter → timing     (filter2d CPU vs accelerated)
//
// CPU functions are the reference implementations. The rayon variants and
// the wgpu kernels in `gpu` are alternate execution strategies that must
// reproduce them.

pub mod error;
pub mod matrix;

pub mod dispersion;
pub mod dos;
pub mod histogram;
pub mod plot;

pub mod convolution;
pub mod filter;
pub mod gpu;
pub mod timing;

pub use error::{Error, Result};
