//! Boxed LCP solvers for constraint-impulse dynamics.
//!
//! This crate solves the mixed linear complementarity problems that arise
//! when a group of velocity-level constraints (contacts, joints, friction
//! cones) is resolved in a single step: find impulses `x` with
//!
//! ```text
//! w = A x - b,   lo <= x <= hi,   (x_i - lo_i)(hi_i - x_i) w_i = 0
//! ```
//!
//! where `A` is the symmetric positive-(semi)definite effective-mass matrix
//! of the group and rows may be friction-coupled: `findex[i] = k` bounds
//! row `i` by `+-hi[i] * x[k]`, the Coulomb cone around the normal impulse
//! of row `k`.
//!
//! # Solvers
//!
//! Two interchangeable implementations of [`BoxedLcpSolver`]:
//!
//! - [`PgsSolver`]: projected Gauss-Seidel iteration with row
//!   normalization, optional randomized sweep order, and friction-aware
//!   projection. Bounded cost, approximate answer.
//! - [`DantzigSolver`]: direct principal pivoting. Exactly complementary
//!   answer, preferred when correctness beats iteration speed.
//!
//! Both take the same [`LcpProblem`] view over padded dense storage
//! ([`PaddedMatrix`]) and fall back to an in-place LDL^T solve ([`ldlt`])
//! when every variable is unbounded.
//!
//! # Example
//!
//! ```
//! use sim_lcp::{BoxedLcpSolver, DantzigSolver, LcpProblem, PaddedMatrix};
//!
//! // A 2x2 box-constrained system: both rows want to exceed the box.
//! let mut a = PaddedMatrix::from_rows(2, &[2.0, 0.0, 0.0, 2.0]);
//! let mut x = [0.0; 2];
//! let mut b = [3.0, -3.0];
//! let (mut lo, mut hi) = ([0.0; 2], [1.0; 2]);
//!
//! let mut solver = DantzigSolver::default();
//! solver.solve(LcpProblem::new(
//!     &mut a, &mut x, &mut b, 0, &mut lo, &mut hi, &[-1, -1],
//! ));
//!
//! assert!((x[0] - 1.0).abs() < 1e-12); // clipped high
//! assert!(x[1].abs() < 1e-12); // clipped low
//! ```
//!
//! # Scope
//!
//! In-memory, single-threaded, stateless between solves apart from scratch
//! buffers. No warm-starting, no sparse factorization, no GPU path.

#![doc(html_root_url = "https://docs.rs/sim-lcp/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod boxed;
mod dantzig;
pub mod diagnostics;
pub mod ldlt;
mod matrix;
mod pgs;

pub use boxed::{BoxedLcpSolver, BoxedLcpSolverPtr, LcpProblem};
pub use dantzig::{DantzigSolver, DantzigSolverConfig};
pub use matrix::{pad, PaddedMatrix};
pub use pgs::{PgsSolver, PgsSolverConfig, SweepDirection};
