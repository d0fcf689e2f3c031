//! Assertion aids for LCP instances.
//!
//! These predicates back the `can_solve` checks of the solvers and the
//! `debug_assert!`s in group assembly. They are ordinary functions so tests
//! can call them in any build; release callers reach them only through
//! debug assertions.

use std::fmt::Write as _;

use crate::matrix::PaddedMatrix;

/// Tolerance for the pairwise symmetry comparison.
pub const SYMMETRY_EPSILON: f64 = 1e-6;

/// Diagonal entries below this count as inactive rows.
pub const DIAGONAL_EPSILON: f64 = 1e-9;

/// Check `|A[i,j] - A[j,i]| <= SYMMETRY_EPSILON` over the whole matrix.
///
/// On failure the offending pair and the full matrix are logged at debug
/// level.
#[must_use]
pub fn is_symmetric(a: &PaddedMatrix) -> bool {
    is_symmetric_in(a, 0, a.n().saturating_sub(1))
}

/// Symmetry check restricted to rows and columns `begin..=end`.
#[must_use]
pub fn is_symmetric_in(a: &PaddedMatrix, begin: usize, end: usize) -> bool {
    if a.n() == 0 {
        return true;
    }
    let last = end.min(a.n() - 1);
    for i in begin..=last {
        for j in begin..=last {
            if (a.get(i, j) - a.get(j, i)).abs() > SYMMETRY_EPSILON {
                tracing::debug!(
                    i,
                    j,
                    a_ij = a.get(i, j),
                    a_ji = a.get(j, i),
                    matrix = %dump_matrix(a),
                    "matrix is not symmetric"
                );
                return false;
            }
        }
    }
    true
}

/// Check that every diagonal entry clears [`DIAGONAL_EPSILON`].
#[must_use]
pub fn has_positive_diagonal(a: &PaddedMatrix) -> bool {
    (0..a.n()).all(|i| a.get(i, i) >= DIAGONAL_EPSILON)
}

/// Shared prerequisite test for the boxed solvers: positive diagonal and
/// symmetry.
#[must_use]
pub fn is_well_posed(a: &PaddedMatrix) -> bool {
    for i in 0..a.n() {
        if a.get(i, i) < DIAGONAL_EPSILON {
            return false;
        }
        for j in 0..a.n() {
            if (a.get(i, j) - a.get(j, i)).abs() > DIAGONAL_EPSILON {
                return false;
            }
        }
    }
    true
}

/// Format the padded matrix, one stride-wide row per line.
#[must_use]
pub fn dump_matrix(a: &PaddedMatrix) -> String {
    let mut out = String::new();
    let data = a.as_slice();
    for i in 0..a.n() {
        for j in 0..a.nskip() {
            let _ = write!(out, "{:.4} ", data[i * a.nskip() + j]);
        }
        out.push('\n');
    }
    out
}

/// Format a full LCP instance, residual included, for debug logging.
///
/// The final two lines print `A x` against `b + w`; for a solved instance
/// they agree row by row.
#[must_use]
pub fn dump_lcp(
    a: &PaddedMatrix,
    x: &[f64],
    b: &[f64],
    w: &[f64],
    findex: &[i32],
) -> String {
    let n = a.n();
    let mut out = String::new();

    let _ = writeln!(out, "A:");
    out.push_str(&dump_matrix(a));

    let dump_vec = |out: &mut String, label: &str, values: &[f64]| {
        let _ = write!(out, "{label}: ");
        for v in values {
            let _ = write!(out, "{v:.4} ");
        }
        out.push('\n');
    };

    dump_vec(&mut out, "b", b);
    dump_vec(&mut out, "w", w);
    dump_vec(&mut out, "x", x);

    let _ = write!(out, "findex: ");
    for f in findex {
        let _ = write!(out, "{f} ");
    }
    out.push('\n');

    let mut ax = vec![0.0; n];
    for (i, ax_i) in ax.iter_mut().enumerate() {
        for j in 0..n {
            *ax_i += a.get(i, j) * x[j];
        }
    }
    dump_vec(&mut out, "Ax   ", &ax);

    let sum: Vec<f64> = b.iter().zip(w.iter()).map(|(bi, wi)| bi + wi).collect();
    dump_vec(&mut out, "b + w", &sum);

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_matrix_passes() {
        let a = PaddedMatrix::from_rows(2, &[4.0, 1.0, 1.0, 3.0]);
        assert!(is_symmetric(&a));
        assert!(has_positive_diagonal(&a));
        assert!(is_well_posed(&a));
    }

    #[test]
    fn test_asymmetric_matrix_fails() {
        let a = PaddedMatrix::from_rows(2, &[4.0, 1.0, 2.0, 3.0]);
        assert!(!is_symmetric(&a));
        assert!(!is_well_posed(&a));
    }

    #[test]
    fn test_symmetry_within_tolerance() {
        let a = PaddedMatrix::from_rows(2, &[4.0, 1.0, 1.0 + 1e-7, 3.0]);
        assert!(is_symmetric(&a));
    }

    #[test]
    fn test_range_restriction_skips_other_rows() {
        // Asymmetry sits in row 0; the restricted check over row 1 passes.
        let a = PaddedMatrix::from_rows(2, &[4.0, 9.0, 1.0, 3.0]);
        assert!(!is_symmetric(&a));
        assert!(is_symmetric_in(&a, 1, 1));
    }

    #[test]
    fn test_zero_diagonal_rejected() {
        let a = PaddedMatrix::from_rows(2, &[0.0, 0.0, 0.0, 2.0]);
        assert!(!has_positive_diagonal(&a));
        assert!(!is_well_posed(&a));
    }

    #[test]
    fn test_empty_matrix_is_trivially_symmetric() {
        let a = PaddedMatrix::zeros(0);
        assert!(is_symmetric(&a));
        assert!(has_positive_diagonal(&a));
    }

    #[test]
    fn test_dump_contains_residual_rows() {
        let a = PaddedMatrix::from_rows(2, &[2.0, 0.0, 0.0, 2.0]);
        let text = dump_lcp(&a, &[1.0, 2.0], &[2.0, 4.0], &[0.0, 0.0], &[-1, -1]);

        assert!(text.contains("Ax"));
        assert!(text.contains("b + w"));
        assert!(text.contains("findex"));
    }
}
