//! In-place LDL^T factorization and solve on padded storage.
//!
//! Used as the fast path when every variable of a boxed LCP is unbounded
//! (`nub >= n`): the complementarity conditions collapse to the linear
//! system `A x = b`, which a symmetric factorization answers directly.
//! The direct pivoting solver also leans on this for its free-variable
//! subsystem solves.
//!
//! The factorization is the classic root-free Cholesky variant: `A = L D L^T`
//! with `L` unit lower triangular (stored in the strict lower triangle of
//! `A`) and `D` diagonal (stored in a caller-provided buffer). `A` must be
//! symmetric positive-definite up to the solver tolerance; the upper
//! triangle is left untouched.

use crate::matrix::PaddedMatrix;

/// Pivots smaller than this are treated as zero rather than divided by.
const DIAG_EPSILON: f64 = 1e-9;

/// Factor the leading `n x n` block of `a` into `L D L^T`, in place.
///
/// On return the strict lower triangle of `a` holds `L` (unit diagonal
/// implicit) and `diag` holds `D`. `diag` is resized to `n`.
pub fn factor_in_place(a: &mut PaddedMatrix, diag: &mut Vec<f64>) {
    let n = a.n();
    diag.clear();
    diag.resize(n, 0.0);

    for i in 0..n {
        for j in 0..i {
            let mut sum = a.get(i, j);
            for k in 0..j {
                sum -= a.get(i, k) * diag[k] * a.get(j, k);
            }
            let l_ij = if diag[j].abs() > DIAG_EPSILON {
                sum / diag[j]
            } else {
                0.0
            };
            a.set(i, j, l_ij);
        }

        let mut sum = a.get(i, i);
        for k in 0..i {
            sum -= a.get(i, k) * a.get(i, k) * diag[k];
        }
        diag[i] = sum;
    }
}

/// Solve `L D L^T x = rhs` in place, given a factored matrix.
///
/// `rhs` holds the solution on return.
pub fn solve_in_place(a: &PaddedMatrix, diag: &[f64], rhs: &mut [f64]) {
    let n = a.n();
    debug_assert_eq!(diag.len(), n);
    debug_assert_eq!(rhs.len(), n);

    // Forward substitution with the unit lower factor.
    for i in 0..n {
        let mut sum = rhs[i];
        for j in 0..i {
            sum -= a.get(i, j) * rhs[j];
        }
        rhs[i] = sum;
    }

    // Diagonal scaling.
    for i in 0..n {
        if diag[i].abs() > DIAG_EPSILON {
            rhs[i] /= diag[i];
        } else {
            rhs[i] = 0.0;
        }
    }

    // Back substitution with the transposed factor.
    for i in (0..n).rev() {
        let mut sum = rhs[i];
        for j in i + 1..n {
            sum -= a.get(j, i) * rhs[j];
        }
        rhs[i] = sum;
    }
}

/// Factor `a` and solve `A x = rhs` in one call.
///
/// `rhs` holds the solution on return; `a` holds the factored form and
/// `diag_scratch` the pivots, so repeated solves against the same matrix
/// can call [`solve_in_place`] directly.
pub fn factor_and_solve(a: &mut PaddedMatrix, rhs: &mut [f64], diag_scratch: &mut Vec<f64>) {
    factor_in_place(a, diag_scratch);
    solve_in_place(a, diag_scratch, rhs);
}
