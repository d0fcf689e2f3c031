//! Direct boxed LCP solver based on principal pivoting.
//!
//! Where [`PgsSolver`](crate::PgsSolver) iterates toward a solution, this
//! solver pivots toward an exactly complementary one: variables are
//! partitioned into a free set (interior, `w = 0`) and sets clamped at
//! their lower or upper bound, the free subsystem is solved directly by
//! LDL^T, and variables change sets until no row violates its box or the
//! sign condition on its slack.
//!
//! Set changes are applied in bulk while that makes progress, then one at a
//! time by lowest index, which rules out cycling on the positive-definite
//! matrices produced by constraint assembly.
//!
//! Friction rows (`findex[i] >= 0`) couple their bounds to the impulse of a
//! normal row, so the box itself moves during the solve. The coupling is
//! resolved by re-deriving the effective bounds `+-hi[i] * |x[findex[i]]|`
//! from the current normal impulses and re-solving until the bounds
//! stabilize.
//!
//! Use this solver when an exactly complementary answer is worth more than
//! iteration speed; it is the default choice of the constraint-group
//! solver.

use crate::boxed::{BoxedLcpSolver, LcpProblem};
use crate::diagnostics;
use crate::ldlt;
use crate::matrix::PaddedMatrix;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Friction bounds are considered stable once they move less than this
/// between outer passes.
const FRICTION_BOUND_TOLERANCE: f64 = 1e-9;

/// Configuration for the direct pivoting solver.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DantzigSolverConfig {
    /// Upper bound on pivot steps per solve. On exhaustion the last iterate
    /// is returned.
    pub max_pivots: usize,

    /// Upper bound on friction-coupling passes (effective-bound updates).
    pub friction_iterations: usize,

    /// Slack tolerance for the complementarity sign tests and box checks.
    pub complementarity_tolerance: f64,

    /// Diagonal guard: rows with `A[i,i]` below this are treated as
    /// inactive (`x[i] = 0`).
    pub epsilon_for_division: f64,
}

impl Default for DantzigSolverConfig {
    fn default() -> Self {
        Self {
            max_pivots: 500,
            friction_iterations: 10,
            complementarity_tolerance: 1e-10,
            epsilon_for_division: 1e-9,
        }
    }
}

impl DantzigSolverConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error string if any value is out of range.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.max_pivots == 0 {
            return Err("max_pivots must be at least 1");
        }
        if self.friction_iterations == 0 {
            return Err("friction_iterations must be at least 1");
        }
        if self.complementarity_tolerance <= 0.0 {
            return Err("complementarity_tolerance must be positive");
        }
        if self.epsilon_for_division <= 0.0 {
            return Err("epsilon_for_division must be positive");
        }
        Ok(())
    }
}

/// Which set a row currently belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowState {
    /// Interior: solved for `w = 0`.
    Free,
    /// Clamped at the lower bound; requires `w >= 0`.
    Lower,
    /// Clamped at the upper bound; requires `w <= 0`.
    Upper,
    /// Negligible diagonal; pinned to `x = 0` and never touched.
    Ignored,
}

/// Direct boxed LCP solver (principal pivoting).
#[derive(Debug)]
pub struct DantzigSolver {
    config: DantzigSolverConfig,

    // Scratch, reused across solves.
    states: Vec<RowState>,
    slack: Vec<f64>,
    eff_lo: Vec<f64>,
    eff_hi: Vec<f64>,
    free_rows: Vec<usize>,
    sub_rhs: Vec<f64>,
    cache_d: Vec<f64>,
}

impl Default for DantzigSolver {
    fn default() -> Self {
        Self::new(DantzigSolverConfig::default())
    }
}

impl DantzigSolver {
    /// Create a solver with the given configuration.
    #[must_use]
    pub fn new(config: DantzigSolverConfig) -> Self {
        Self {
            config,
            states: Vec::new(),
            slack: Vec::new(),
            eff_lo: Vec::new(),
            eff_hi: Vec::new(),
            free_rows: Vec::new(),
            sub_rhs: Vec::new(),
            cache_d: Vec::new(),
        }
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &DantzigSolverConfig {
        &self.config
    }

    /// Get mutable configuration.
    pub fn config_mut(&mut self) -> &mut DantzigSolverConfig {
        &mut self.config
    }

    /// Pivot on a fixed box until every row is complementary.
    fn solve_fixed_bounds(&mut self, a: &PaddedMatrix, x: &mut [f64], b: &[f64], nub: usize) {
        let n = a.n();
        let tol = self.config.complementarity_tolerance;

        self.states.clear();
        for i in 0..n {
            let state = if a.get(i, i) < self.config.epsilon_for_division {
                x[i] = 0.0;
                RowState::Ignored
            } else if i < nub {
                RowState::Free
            } else if self.eff_hi[i] - self.eff_lo[i] <= tol {
                // Degenerate box: the row is pinned at its only feasible
                // value and never enters the free set.
                x[i] = self.eff_lo[i];
                RowState::Lower
            } else {
                RowState::Free
            };
            self.states.push(state);
        }

        self.slack.resize(n, 0.0);

        for pivot in 0..self.config.max_pivots {
            self.solve_free_subsystem(a, x, b);
            self.compute_slack(a, x, b);

            // Collect set changes. Rows below nub are unbounded and rows
            // with a degenerate box are pinned; neither ever moves.
            let pinned =
                |i: usize| i < nub || self.eff_hi[i] - self.eff_lo[i] <= tol;

            let mut changes: Vec<(usize, RowState)> = Vec::new();
            for i in 0..n {
                if self.states[i] == RowState::Ignored || pinned(i) {
                    continue;
                }
                match self.states[i] {
                    RowState::Free => {
                        if x[i] > self.eff_hi[i] + tol {
                            changes.push((i, RowState::Upper));
                        } else if x[i] < self.eff_lo[i] - tol {
                            changes.push((i, RowState::Lower));
                        }
                    }
                    RowState::Lower => {
                        if self.slack[i] < -tol {
                            changes.push((i, RowState::Free));
                        }
                    }
                    RowState::Upper => {
                        if self.slack[i] > tol {
                            changes.push((i, RowState::Free));
                        }
                    }
                    RowState::Ignored => {}
                }
            }

            if changes.is_empty() {
                return;
            }

            // Bulk pivots make fast progress; past n + 10 steps fall back to
            // single lowest-index pivots to rule out cycling.
            let apply = if pivot < n + 10 {
                changes.as_slice()
            } else {
                &changes[..1]
            };
            for &(i, next) in apply {
                self.states[i] = next;
                match next {
                    RowState::Lower => x[i] = self.eff_lo[i],
                    RowState::Upper => x[i] = self.eff_hi[i],
                    RowState::Free | RowState::Ignored => {}
                }
            }
        }

        tracing::debug!(
            n,
            max_pivots = self.config.max_pivots,
            "pivot budget exhausted; returning last iterate"
        );
    }

    /// Solve `A_FF x_F = b_F - A_FN x_N` for the current free set.
    fn solve_free_subsystem(&mut self, a: &PaddedMatrix, x: &mut [f64], b: &[f64]) {
        let n = a.n();

        self.free_rows.clear();
        let states = &self.states;
        self.free_rows
            .extend((0..n).filter(|&i| states[i] == RowState::Free));
        let m = self.free_rows.len();
        if m == 0 {
            return;
        }

        let mut sub_a = PaddedMatrix::zeros(m);
        self.sub_rhs.clear();
        for (si, &i) in self.free_rows.iter().enumerate() {
            for (sj, &j) in self.free_rows.iter().enumerate() {
                sub_a.set(si, sj, a.get(i, j));
            }
            let mut rhs = b[i];
            for j in 0..n {
                if self.states[j] != RowState::Free {
                    rhs -= a.get(i, j) * x[j];
                }
            }
            self.sub_rhs.push(rhs);
        }

        ldlt::factor_and_solve(&mut sub_a, &mut self.sub_rhs, &mut self.cache_d);

        for (si, &i) in self.free_rows.iter().enumerate() {
            x[i] = self.sub_rhs[si];
        }
    }

    /// Compute `w = A x - b` for every row.
    fn compute_slack(&mut self, a: &PaddedMatrix, x: &[f64], b: &[f64]) {
        let n = a.n();
        for i in 0..n {
            let row = a.row(i);
            let mut sum = -b[i];
            for j in 0..n {
                sum += row[j] * x[j];
            }
            self.slack[i] = sum;
        }
    }
}

impl BoxedLcpSolver for DantzigSolver {
    fn solve(&mut self, problem: LcpProblem<'_>) {
        let LcpProblem {
            a,
            x,
            b,
            nub,
            lo,
            hi,
            findex,
        } = problem;
        let n = a.n();
        if n == 0 {
            return;
        }

        // All variables unbounded: factor, solve, done.
        if nub >= n {
            ldlt::factor_in_place(a, &mut self.cache_d);
            ldlt::solve_in_place(a, &self.cache_d, b);
            x.copy_from_slice(b);
            return;
        }

        self.eff_lo.clear();
        self.eff_lo.extend_from_slice(lo);
        self.eff_hi.clear();
        self.eff_hi.extend_from_slice(hi);

        let has_friction = findex.iter().any(|&f| f >= 0);
        let outer_passes = if has_friction {
            self.config.friction_iterations
        } else {
            1
        };

        for pass in 0..outer_passes {
            // Re-derive the moving friction box from the current normal
            // impulses. The first pass sees x = 0, pinning friction rows
            // until their normal rows have an impulse.
            let mut bounds_stable = true;
            for i in 0..n {
                if findex[i] >= 0 {
                    #[allow(clippy::cast_sign_loss)]
                    let limit = hi[i] * x[findex[i] as usize].abs();
                    if (limit - self.eff_hi[i]).abs() > FRICTION_BOUND_TOLERANCE {
                        bounds_stable = false;
                    }
                    self.eff_hi[i] = limit;
                    self.eff_lo[i] = -limit;
                }
            }
            if pass > 0 && bounds_stable {
                break;
            }

            self.solve_fixed_bounds(a, x, b, nub);
        }
    }

    fn can_solve(&self, a: &PaddedMatrix) -> bool {
        diagnostics::is_well_posed(a)
    }

    fn name(&self) -> &'static str {
        "dantzig"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const INF: f64 = f64::INFINITY;

    fn solve_raw(
        solver: &mut DantzigSolver,
        a: &mut PaddedMatrix,
        b: &mut [f64],
        nub: usize,
        lo: &mut [f64],
        hi: &mut [f64],
        findex: &[i32],
    ) -> Vec<f64> {
        let mut x = vec![0.0; a.n()];
        solver.solve(LcpProblem::new(a, &mut x, b, nub, lo, hi, findex));
        x
    }

    /// Componentwise complementarity check for an already-solved instance.
    fn assert_complementary(a: &PaddedMatrix, x: &[f64], b: &[f64], lo: &[f64], hi: &[f64]) {
        let n = a.n();
        for i in 0..n {
            let mut w = -b[i];
            for j in 0..n {
                w += a.get(i, j) * x[j];
            }

            let at_lower = (x[i] - lo[i]).abs() < 1e-8;
            let at_upper = (x[i] - hi[i]).abs() < 1e-8;
            let interior = x[i] > lo[i] - 1e-8 && x[i] < hi[i] + 1e-8;

            assert!(
                (at_lower && w >= -1e-8)
                    || (at_upper && w <= 1e-8)
                    || (interior && w.abs() < 1e-8),
                "row {i} violates complementarity: x = {}, w = {w}",
                x[i]
            );
        }
    }

    #[test]
    fn test_unbounded_1x1() {
        let mut a = PaddedMatrix::from_rows(1, &[2.0]);
        let mut solver = DantzigSolver::default();
        let x = solve_raw(
            &mut solver,
            &mut a,
            &mut [4.0],
            0,
            &mut [-INF],
            &mut [INF],
            &[-1],
        );
        assert_relative_eq!(x[0], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_box_clipped_1x1() {
        let mut a = PaddedMatrix::from_rows(1, &[1.0]);
        let mut solver = DantzigSolver::default();
        let x = solve_raw(
            &mut solver,
            &mut a,
            &mut [5.0],
            0,
            &mut [-1.0],
            &mut [1.0],
            &[-1],
        );
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_unbounded_fast_path_2x2() {
        let mut a = PaddedMatrix::from_rows(2, &[4.0, 1.0, 1.0, 3.0]);
        let mut solver = DantzigSolver::default();
        let x = solve_raw(
            &mut solver,
            &mut a,
            &mut [1.0, 2.0],
            2,
            &mut [-INF, -INF],
            &mut [INF, INF],
            &[-1, -1],
        );
        assert_relative_eq!(x[0], 1.0 / 11.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 7.0 / 11.0, epsilon = 1e-12);
    }

    #[test]
    fn test_box_2x2() {
        let mut a = PaddedMatrix::from_rows(2, &[2.0, 0.0, 0.0, 2.0]);
        let b = [3.0, -3.0];
        let lo = [0.0, 0.0];
        let hi = [1.0, 1.0];

        let mut solver = DantzigSolver::default();
        let x = solve_raw(
            &mut solver,
            &mut a,
            &mut b.clone(),
            0,
            &mut lo.clone(),
            &mut hi.clone(),
            &[-1, -1],
        );

        assert_relative_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 0.0, epsilon = 1e-12);
        assert_complementary(&a, &x, &b, &lo, &hi);
    }

    #[test]
    fn test_friction_rows_track_normal_impulse() {
        let mut a = PaddedMatrix::from_rows(3, &[
            1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, //
            0.0, 0.0, 1.0,
        ]);
        let mut solver = DantzigSolver::default();
        let x = solve_raw(
            &mut solver,
            &mut a,
            &mut [10.0, 8.0, -8.0],
            0,
            &mut [-INF, 0.0, 0.0],
            &mut [INF, 0.5, 0.5],
            &[-1, 0, 0],
        );

        assert_relative_eq!(x[0], 10.0, epsilon = 1e-10);
        assert_relative_eq!(x[1], 5.0, epsilon = 1e-10);
        assert_relative_eq!(x[2], -5.0, epsilon = 1e-10);
    }

    #[test]
    fn test_degenerate_row_pinned_to_zero() {
        let mut a = PaddedMatrix::from_rows(2, &[0.0, 0.0, 0.0, 2.0]);
        let mut solver = DantzigSolver::default();
        let x = solve_raw(
            &mut solver,
            &mut a,
            &mut [7.0, 4.0],
            0,
            &mut [-INF, -INF],
            &mut [INF, INF],
            &[-1, -1],
        );

        assert_relative_eq!(x[0], 0.0, epsilon = 1e-15);
        assert_relative_eq!(x[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_complementarity_on_random_boxed_systems() {
        use rand::{rngs::StdRng, Rng, SeedableRng};
        let mut rng = StdRng::seed_from_u64(19);

        for n in [2_usize, 4, 7, 10] {
            let dense = {
                let m = nalgebra::DMatrix::from_fn(n, n, |_, _| rng.gen_range(-1.0..1.0));
                &m * m.transpose() + nalgebra::DMatrix::identity(n, n) * 2.0
            };
            let a = PaddedMatrix::from_dense(&dense);
            let b: Vec<f64> = (0..n).map(|_| rng.gen_range(-3.0..3.0)).collect();
            let lo = vec![-0.5; n];
            let hi = vec![0.5; n];
            let findex = vec![-1; n];

            let mut solver = DantzigSolver::default();
            let mut a_work = a.clone();
            let x = solve_raw(
                &mut solver,
                &mut a_work,
                &mut b.clone(),
                0,
                &mut lo.clone(),
                &mut hi.clone(),
                &findex,
            );

            assert_complementary(&a, &x, &b, &lo, &hi);
        }
    }

    #[test]
    fn test_agrees_with_pgs_on_boxed_spd() {
        use crate::pgs::{PgsSolver, PgsSolverConfig};

        let dense = nalgebra::DMatrix::from_row_slice(3, 3, &[
            4.0, 1.0, 0.5, //
            1.0, 3.0, 0.2, //
            0.5, 0.2, 5.0,
        ]);
        let b = [1.0, -2.0, 3.0];
        let lo = [-0.4; 3];
        let hi = [0.4; 3];
        let findex = [-1; 3];

        let mut dantzig = DantzigSolver::default();
        let mut a1 = PaddedMatrix::from_dense(&dense);
        let x_direct = solve_raw(
            &mut dantzig,
            &mut a1,
            &mut b.clone(),
            0,
            &mut lo.clone(),
            &mut hi.clone(),
            &findex,
        );

        let mut pgs = PgsSolver::new(PgsSolverConfig::high_accuracy());
        let mut a2 = PaddedMatrix::from_dense(&dense);
        let mut x_iterative = vec![0.0; 3];
        pgs.solve(LcpProblem::new(
            &mut a2,
            &mut x_iterative,
            &mut b.clone(),
            0,
            &mut lo.clone(),
            &mut hi.clone(),
            &findex,
        ));

        for i in 0..3 {
            assert_relative_eq!(x_direct[i], x_iterative[i], epsilon = 1e-5);
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(DantzigSolverConfig::default().validate().is_ok());

        let mut config = DantzigSolverConfig::default();
        config.max_pivots = 0;
        assert!(config.validate().is_err());

        config = DantzigSolverConfig::default();
        config.friction_iterations = 0;
        assert!(config.validate().is_err());
    }
}
