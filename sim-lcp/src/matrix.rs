//! Dense row-major matrix storage with a padded row stride.
//!
//! The solvers in this crate walk matrix rows in tight inner loops. To keep
//! every row start aligned for SIMD-friendly access, rows are stored with a
//! stride of [`pad`]`(n)` scalars, of which only the first `n` carry data.
//! Row `i` of an `n x n` system therefore starts at index `i * nskip`.
//!
//! The padding columns are kept zeroed but are never read by solver
//! arithmetic; all loops run `j in 0..n`.

/// SIMD lane count the row stride is rounded up to.
const PAD_MULTIPLE: usize = 4;

/// Round `n` up to the padded row stride, the next multiple of 4.
///
/// Only `n == 0` maps to 0; every other dimension pads up, so `pad(1)`
/// is 4.
#[must_use]
pub const fn pad(n: usize) -> usize {
    if n == 0 {
        0
    } else {
        ((n - 1) | (PAD_MULTIPLE - 1)) + 1
    }
}

/// Square dense matrix with padded row stride.
///
/// Owns `(data, n, nskip)` and hands out row slices; raw buffers do not
/// escape the solver crates.
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedMatrix {
    data: Vec<f64>,
    n: usize,
    nskip: usize,
}

impl PaddedMatrix {
    /// Create an `n x n` zero matrix.
    #[must_use]
    pub fn zeros(n: usize) -> Self {
        let nskip = pad(n);
        Self {
            data: vec![0.0; n * nskip],
            n,
            nskip,
        }
    }

    /// Create from unpadded row-major data of length `n * n`.
    ///
    /// # Panics
    ///
    /// Panics if `rows.len() != n * n`.
    #[must_use]
    pub fn from_rows(n: usize, rows: &[f64]) -> Self {
        assert_eq!(rows.len(), n * n, "expected {} elements", n * n);
        let mut m = Self::zeros(n);
        for i in 0..n {
            m.row_mut(i).copy_from_slice(&rows[i * n..(i + 1) * n]);
        }
        m
    }

    /// Create from a dense `nalgebra` matrix.
    ///
    /// # Panics
    ///
    /// Panics if `dense` is not square.
    #[must_use]
    pub fn from_dense(dense: &nalgebra::DMatrix<f64>) -> Self {
        assert_eq!(dense.nrows(), dense.ncols(), "matrix must be square");
        let n = dense.nrows();
        let mut m = Self::zeros(n);
        for i in 0..n {
            for j in 0..n {
                m.set(i, j, dense[(i, j)]);
            }
        }
        m
    }

    /// Convert the meaningful `n x n` block to a dense `nalgebra` matrix.
    #[must_use]
    pub fn to_dense(&self) -> nalgebra::DMatrix<f64> {
        nalgebra::DMatrix::from_fn(self.n, self.n, |i, j| self.get(i, j))
    }

    /// Matrix dimension `n`.
    #[must_use]
    pub const fn n(&self) -> usize {
        self.n
    }

    /// Padded row stride.
    #[must_use]
    pub const fn nskip(&self) -> usize {
        self.nskip
    }

    /// Element at `(i, j)`.
    #[inline]
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.nskip + j]
    }

    /// Set element at `(i, j)`.
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.nskip + j] = value;
    }

    /// The meaningful `n`-element prefix of row `i`.
    #[inline]
    #[must_use]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.nskip..i * self.nskip + self.n]
    }

    /// Mutable meaningful prefix of row `i`.
    #[inline]
    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        let start = i * self.nskip;
        let n = self.n;
        &mut self.data[start..start + n]
    }

    /// Scale the meaningful part of row `i` by `factor`.
    ///
    /// The padding stays zero, so scaling the prefix is enough.
    #[inline]
    pub fn scale_row(&mut self, i: usize, factor: f64) {
        for value in self.row_mut(i) {
            *value *= factor;
        }
    }

    /// The full backing buffer, padding included.
    ///
    /// Intended for in-crate solver arithmetic that indexes `i * nskip + j`.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Mutable backing buffer, padding included.
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }
}
