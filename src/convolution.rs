// convolution.rs — Valid-region 2D convolution of a matrix with a kernel.
//
// For an M×N image and an Mf×Nf filter with half sizes Mf2 = Mf/2 and
// Nf2 = Nf/2 (floor), every interior cell
//
//   Mf2 <= i < M - Mf2,   Nf2 <= j < N - Nf2
//
// receives
//
//   out[i][j] = Σ_ii Σ_jj filt[Mf-1-ii][Nf-1-jj] · img[i-Mf2+ii][j-Nf2+jj]
//
// The filter is read back-to-front, which makes this a true convolution
// rather than a cross-correlation. Taps are summed ii-outer, jj-inner; the
// parallel variant keeps that order so its output is bit-identical.
//
// BORDER HANDLING: none. Cells within a half filter of an edge are not
// computed and stay 0.0. There is no padding or clamping, unlike the
// separable clamp-to-edge convolution one would use for blurring.
//
// For even filter sizes the window is not centred: it spans
// [i - Mf2, i - Mf2 + Mf), one row/column further up-left than down-right.

use rayon::prelude::*;
use thiserror::Error;
use tracing::debug;

use crate::matrix::Matrix;

/// Shape errors for [`convolve2d`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvolutionError {
    #[error("filter is empty ({rows}x{cols})")]
    EmptyFilter { rows: usize, cols: usize },
    #[error("filter {filter:?} is larger than image {image:?}")]
    FilterTooLarge { image: (usize, usize), filter: (usize, usize) },
}

/// The interior window of a convolution: rows `row_start..row_end` and
/// columns `col_start..col_end` are written, everything else stays zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interior {
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
}

impl Interior {
    /// Whether (r, c) is computed by the convolution.
    #[inline]
    pub fn contains(&self, r: usize, c: usize) -> bool {
        (self.row_start..self.row_end).contains(&r) && (self.col_start..self.col_end).contains(&c)
    }
}

/// Validate shapes and return the interior window.
pub fn interior(image: &Matrix, filt: &Matrix) -> Result<Interior, ConvolutionError> {
    let (m, n) = image.shape();
    let (mf, nf) = filt.shape();
    if mf == 0 || nf == 0 {
        return Err(ConvolutionError::EmptyFilter { rows: mf, cols: nf });
    }
    if mf > m || nf > n {
        return Err(ConvolutionError::FilterTooLarge { image: (m, n), filter: (mf, nf) });
    }
    let (mf2, nf2) = (mf / 2, nf / 2);
    Ok(Interior {
        row_start: mf2,
        row_end: m - mf2,
        col_start: nf2,
        col_end: n - nf2,
    })
}

/// Convolution sum for one interior cell.
///
/// # Safety
/// `(i, j)` must lie inside the window returned by [`interior`] for these
/// two matrices, which keeps every image access in bounds.
#[inline(always)]
unsafe fn cell(image: &Matrix, filt: &Matrix, i: usize, j: usize) -> f64 {
    let (mf, nf) = filt.shape();
    let (mf2, nf2) = (mf / 2, nf / 2);
    let mut acc = 0.0f64;
    for ii in 0..mf {
        for jj in 0..nf {
            acc += filt.get_unchecked(mf - 1 - ii, nf - 1 - jj)
                * image.get_unchecked(i - mf2 + ii, j - nf2 + jj);
        }
    }
    acc
}

/// Convolve `image` with `filt` over the valid region.
///
/// The result has the image's shape; border cells are 0.0.
///
/// # Errors
/// Fails if the filter is empty or larger than the image along either axis.
pub fn convolve2d(image: &Matrix, filt: &Matrix) -> Result<Matrix, ConvolutionError> {
    let win = interior(image, filt)?;
    debug!(image = ?image.shape(), filter = ?filt.shape(), "convolve2d");

    let mut out = Matrix::zeros(image.rows(), image.cols());
    for i in win.row_start..win.row_end {
        for j in win.col_start..win.col_end {
            // SAFETY: (i, j) is inside the validated interior window.
            let v = unsafe { cell(image, filt, i, j) };
            out[(i, j)] = v;
        }
    }
    Ok(out)
}

/// [`convolve2d`] with interior rows computed in parallel.
///
/// Each cell uses the same summation order as the sequential path, so the
/// two results are bit-identical.
pub fn convolve2d_par(image: &Matrix, filt: &Matrix) -> Result<Matrix, ConvolutionError> {
    let win = interior(image, filt)?;
    debug!(image = ?image.shape(), filter = ?filt.shape(), "convolve2d (parallel)");

    let cols = image.cols();
    let mut out = Matrix::zeros(image.rows(), cols);
    if cols == 0 {
        return Ok(out);
    }
    out.as_mut_slice()
        .par_chunks_mut(cols)
        .enumerate()
        .filter(|(i, _)| (win.row_start..win.row_end).contains(i))
        .for_each(|(i, row)| {
            for j in win.col_start..win.col_end {
                // SAFETY: (i, j) is inside the validated interior window.
                row[j] = unsafe { cell(image, filt, i, j) };
            }
        });
    Ok(out)
}
