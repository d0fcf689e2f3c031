//! Constraint-group assembly and impulse application for rigid-body
//! dynamics.
//!
//! This crate turns a group of velocity-level constraints (contacts,
//! joints, friction cones) into one mixed LCP, solves it through a
//! [`sim_lcp`] boxed solver, and applies the resulting impulses so the
//! post-step velocities satisfy every non-penetration, joint, and
//! Coulomb-friction condition at once.
//!
//! # Pipeline
//!
//! 1. The simulator hands a [`ConstrainedGroup`] of borrowed
//!    [`Constraint`]s to [`ImpulseConstraintSolver::solve_constrained_group`].
//! 2. Assembly probes each constraint row with a unit impulse and reads
//!    the velocity responses of every coupled constraint, producing the
//!    effective-mass matrix plus bias, bounds, and friction indices.
//! 3. The boxed LCP solver (direct pivoting by default, PGS on request)
//!    computes the impulses.
//! 4. Each constraint applies its impulse slice and is left excited so
//!    downstream consumers can read the final velocities.
//!
//! # Example
//!
//! ```no_run
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use sim_impulse::{ConstrainedGroup, ImpulseConstraintSolver};
//! use sim_lcp::PgsSolver;
//!
//! let mut solver = ImpulseConstraintSolver::new(1.0 / 240.0);
//!
//! // Prefer the iterative backend for this scene.
//! solver.set_boxed_lcp_solver(Rc::new(RefCell::new(PgsSolver::default())));
//!
//! let mut group = ConstrainedGroup::new();
//! // group.add_constraint(&mut contact);
//! solver.solve_constrained_group(&mut group)?;
//! # Ok::<(), sim_impulse::SolveError>(())
//! ```
//!
//! # Scope
//!
//! Single-threaded per solve; no suspension, no cancellation, no state
//! carried between steps. Group buffers are allocated per call and
//! released on every exit path.

#![doc(html_root_url = "https://docs.rs/sim-impulse/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod constraint;
mod group;
mod solver;

pub use constraint::{Constraint, ConstraintInfo};
pub use group::ConstrainedGroup;
pub use solver::{ImpulseConstraintSolver, SolveError};

// Re-export the solver handle types callers configure us with.
pub use sim_lcp::{BoxedLcpSolver, BoxedLcpSolverPtr};
