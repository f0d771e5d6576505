// matrix.rs — Runtime-sized dense f64 matrix.
//
// Every 2D quantity in the filter benchmark is one of these: the input
// image, the filter kernel, and the convolution result. Storage is a
// single row-major Vec<f64>; element (r, c) lives at index r * cols + c.
//
//   data index:  0  1  2  3 | 4  5  6  7 | 8  9 10 11
//   row:         |-- row 0 --| |-- row 1 --| |-- row 2 --|
//
// Addressing is (row, col), matching the maths in convolution.rs
// (image[i][j], i = row). Out-of-bounds access panics; it is a
// programming error, not an input error.

use std::fmt;

use rand::Rng;
use thiserror::Error;

/// Errors from constructing a `Matrix` out of caller-supplied data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatrixError {
    /// Row `row` has `found` elements where `expected` were required.
    #[error("ragged input: row {row} has {found} columns, expected {expected}")]
    Ragged { row: usize, expected: usize, found: usize },
    /// Flat data length does not equal `rows * cols`.
    #[error("data length {len} does not match {rows}x{cols}")]
    LengthMismatch { rows: usize, cols: usize, len: usize },
}

/// A dense 2D grid of f64 values with runtime dimensions.
#[derive(Clone, PartialEq)]
pub struct Matrix {
    /// Elements in row-major order. Length = rows * cols.
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl Matrix {
    // --- Constructors ---

    /// Create a zero-filled matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            data: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    /// Wrap an existing row-major buffer.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, MatrixError> {
        if data.len() != rows * cols {
            return Err(MatrixError::LengthMismatch { rows, cols, len: data.len() });
        }
        Ok(Matrix { data, rows, cols })
    }

    /// Build a matrix from nested rows, rejecting ragged input.
    ///
    /// An empty slice yields a 0×0 matrix.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, MatrixError> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (r, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(MatrixError::Ragged { row: r, expected: cols, found: row.len() });
            }
            data.extend_from_slice(row);
        }
        Ok(Matrix { data, rows: rows.len(), cols })
    }

    /// Fill a matrix with uniform samples from [0, 1).
    pub fn random<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Self {
        let data = (0..rows * cols).map(|_| rng.random::<f64>()).collect();
        Matrix { data, rows, cols }
    }

    // --- Accessors ---

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the element at (r, c).
    ///
    /// # Panics
    /// Panics if (r, c) is out of bounds.
    #[inline]
    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.bounds_check(r, c);
        self.data[r * self.cols + c]
    }

    /// Set the element at (r, c).
    ///
    /// # Panics
    /// Panics if (r, c) is out of bounds.
    #[inline]
    pub fn set(&mut self, r: usize, c: usize, value: f64) {
        self.bounds_check(r, c);
        self.data[r * self.cols + c] = value;
    }

    /// Get an element without bounds checking.
    ///
    /// # Safety
    /// Caller must guarantee r < rows and c < cols.
    #[inline(always)]
    pub unsafe fn get_unchecked(&self, r: usize, c: usize) -> f64 {
        debug_assert!(r < self.rows && c < self.cols,
            "get_unchecked({r},{c}) out of bounds for {}x{}", self.rows, self.cols);
        *self.data.get_unchecked(r * self.cols + c)
    }

    /// Borrow one row as a slice.
    #[inline]
    pub fn row(&self, r: usize) -> &[f64] {
        assert!(r < self.rows, "row {r} out of bounds (rows {})", self.rows);
        let start = r * self.cols;
        &self.data[start..start + self.cols]
    }

    /// Mutable borrow of one row.
    #[inline]
    pub fn row_mut(&mut self, r: usize) -> &mut [f64] {
        assert!(r < self.rows, "row {r} out of bounds (rows {})", self.rows);
        let start = r * self.cols;
        &mut self.data[start..start + self.cols]
    }

    /// Iterate over all elements as `(row, col, value)`.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.rows).flat_map(move |r| {
            (0..self.cols).map(move |c| (r, c, self.data[r * self.cols + c]))
        })
    }

    /// The row-major backing buffer.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Mutable access to the row-major backing buffer.
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    #[inline]
    fn bounds_check(&self, r: usize, c: usize) {
        assert!(
            r < self.rows && c < self.cols,
            "element ({r}, {c}) out of bounds for {}x{} matrix",
            self.rows,
            self.cols,
        );
    }
}

/// Largest element-wise absolute difference between two equally shaped
/// matrices. Returns `None` if the shapes differ.
///
/// NaN is sticky: if any pair differs by NaN the result is NaN, so a
/// broken output never compares as equal.
pub fn max_abs_diff(a: &Matrix, b: &Matrix) -> Option<f64> {
    if a.shape() != b.shape() {
        return None;
    }
    Some(
        a.as_slice()
            .iter()
            .zip(b.as_slice())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, |m: f64, d| if d.is_nan() || d > m { d } else { m }),
    )
}

impl std::ops::Index<(usize, usize)> for Matrix {
    type Output = f64;

    #[inline]
    fn index(&self, (r, c): (usize, usize)) -> &f64 {
        self.bounds_check(r, c);
        &self.data[r * self.cols + c]
    }
}

impl std::ops::IndexMut<(usize, usize)> for Matrix {
    #[inline]
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut f64 {
        self.bounds_check(r, c);
        &mut self.data[r * self.cols + c]
    }
}

// Previews at most 6 rows × 6 columns; full dumps of a 100×100 result
// are not useful on a terminal.
impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PREVIEW: usize = 6;
        writeln!(f, "Matrix {}x{} [", self.rows, self.cols)?;
        for r in 0..self.rows.min(PREVIEW) {
            write!(f, "  [")?;
            for c in 0..self.cols.min(PREVIEW) {
                if c > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{:.6}", self.data[r * self.cols + c])?;
            }
            if self.cols > PREVIEW {
                write!(f, ", ...")?;
            }
            writeln!(f, "]")?;
        }
        if self.rows > PREVIEW {
            writeln!(f, "  ...")?;
        }
        write!(f, "]")
    }
}
