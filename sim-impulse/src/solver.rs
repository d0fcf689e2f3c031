//! Constraint-group assembly and impulse application.
//!
//! One [`ImpulseConstraintSolver::solve_constrained_group`] call marshals a
//! group of constraints into a single boxed LCP, dispatches it to the
//! configured [`BoxedLcpSolver`], and commits the solved impulses back to
//! the constraints.
//!
//! # Assembly by impulse probing
//!
//! Constraints contribute to the system matrix through their
//! Jacobian-inverse-mass contractions, but the engine only stores the
//! articulated-body equations of motion. Applying a unit impulse along one
//! constraint row and reading the velocity responses of every coupled
//! constraint yields the corresponding matrix row without exposing any
//! internal dynamics. Responses of later constraints fill the upper
//! triangle; blocks against earlier constraints are mirrored from the rows
//! already probed, which keeps the matrix symmetric by construction.

use std::cell::RefCell;
use std::rc::Rc;

use sim_lcp::{
    diagnostics, BoxedLcpSolverPtr, DantzigSolver, LcpProblem, PaddedMatrix,
};
use thiserror::Error;

use crate::constraint::ConstraintInfo;
use crate::group::ConstrainedGroup;

/// Errors surfaced by group solving.
///
/// The numeric core itself is no-throw; only malformed groups are rejected
/// at this boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SolveError {
    /// A constraint reported a dimension of zero.
    #[error("constraint {index} reports zero dimension")]
    ZeroDimensionConstraint {
        /// Position of the offending constraint within the group.
        index: usize,
    },
}

/// The assembled LCP terms of one group, sized by its total dimension.
///
/// Ephemeral: lives for the duration of one solve call and is dropped on
/// exit, success or not.
struct LcpTerms {
    a: PaddedMatrix,
    x: Vec<f64>,
    b: Vec<f64>,
    w: Vec<f64>,
    lo: Vec<f64>,
    hi: Vec<f64>,
    findex: Vec<i32>,
    offsets: Vec<usize>,
    dimensions: Vec<usize>,
}

/// Solves constrained groups by sequential impulses over a boxed LCP.
///
/// Owns the time step and a shared handle to the boxed LCP solver. The
/// handle is reference-counted so configuration code can retune or replace
/// the solver while this instance observes the change; swapping in a new
/// solver releases the previous reference.
pub struct ImpulseConstraintSolver {
    time_step: f64,
    boxed_lcp_solver: BoxedLcpSolverPtr,
}

impl ImpulseConstraintSolver {
    /// Create a solver with the default boxed LCP backend (direct
    /// pivoting).
    ///
    /// `time_step` is the simulation step the constraints' bias terms are
    /// scaled by; it must be positive.
    #[must_use]
    pub fn new(time_step: f64) -> Self {
        Self::with_boxed_lcp_solver(time_step, Rc::new(RefCell::new(DantzigSolver::default())))
    }

    /// Create a solver around an explicit boxed LCP backend.
    #[must_use]
    pub fn with_boxed_lcp_solver(time_step: f64, boxed_lcp_solver: BoxedLcpSolverPtr) -> Self {
        debug_assert!(time_step > 0.0, "time step must be positive");
        Self {
            time_step,
            boxed_lcp_solver,
        }
    }

    /// The simulation time step.
    #[must_use]
    pub const fn time_step(&self) -> f64 {
        self.time_step
    }

    /// Set the simulation time step.
    pub fn set_time_step(&mut self, time_step: f64) {
        debug_assert!(time_step > 0.0, "time step must be positive");
        self.time_step = time_step;
    }

    /// The boxed LCP solver in use.
    #[must_use]
    pub fn boxed_lcp_solver(&self) -> BoxedLcpSolverPtr {
        Rc::clone(&self.boxed_lcp_solver)
    }

    /// Replace the boxed LCP solver.
    ///
    /// Takes effect on the next group solve; the previous solver is
    /// released.
    pub fn set_boxed_lcp_solver(&mut self, boxed_lcp_solver: BoxedLcpSolverPtr) {
        self.boxed_lcp_solver = boxed_lcp_solver;
    }

    /// Assemble, solve, and apply one constrained group.
    ///
    /// Constraints are left in the excited state afterwards so downstream
    /// consumers can read the post-impulse velocities.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::ZeroDimensionConstraint`] if a constraint
    /// reports no rows. Non-convergence of the LCP backend is not an
    /// error; the last iterate is applied.
    pub fn solve_constrained_group(
        &mut self,
        group: &mut ConstrainedGroup<'_>,
    ) -> Result<(), SolveError> {
        if group.is_empty() || group.total_dimension() == 0 {
            return Ok(());
        }

        let mut terms = assemble(group, 1.0 / self.time_step)?;

        {
            let mut solver = self.boxed_lcp_solver.borrow_mut();
            debug_assert!(
                solver.can_solve(&terms.a),
                "assembled group fails the {} solver prerequisites",
                solver.name()
            );
            solver.solve(LcpProblem::new(
                &mut terms.a,
                &mut terms.x,
                &mut terms.b,
                0,
                &mut terms.lo,
                &mut terms.hi,
                &terms.findex,
            ));
        }

        tracing::trace!(
            n = terms.x.len(),
            lcp = %diagnostics::dump_lcp(&terms.a, &terms.x, &terms.b, &terms.w, &terms.findex),
            "solved constrained group"
        );

        // Commit impulses; constraints stay excited on purpose so the final
        // velocities remain observable.
        for i in 0..group.num_constraints() {
            let offset = terms.offsets[i];
            let dim = terms.dimensions[i];
            let constraint = group.constraint_mut(i);
            constraint.apply_impulse(&terms.x[offset..offset + dim]);
            constraint.excite();
        }

        Ok(())
    }
}

/// Build the LCP terms of a group by unit-impulse probing.
///
/// Leaves every constraint in the activation state it arrived in: each one
/// is excited for its own probing pass and unexcited right after.
fn assemble(group: &mut ConstrainedGroup<'_>, inv_time_step: f64) -> Result<LcpTerms, SolveError> {
    let num_constraints = group.num_constraints();

    // Prefix-sum the offsets.
    let mut offsets = Vec::with_capacity(num_constraints);
    let mut dimensions = Vec::with_capacity(num_constraints);
    let mut n = 0_usize;
    for i in 0..num_constraints {
        let dim = group.constraint_mut(i).dimension();
        if dim == 0 {
            return Err(SolveError::ZeroDimensionConstraint { index: i });
        }
        offsets.push(n);
        dimensions.push(dim);
        n += dim;
    }

    let mut terms = LcpTerms {
        a: PaddedMatrix::zeros(n),
        x: vec![0.0; n],
        b: vec![0.0; n],
        w: vec![0.0; n],
        lo: vec![0.0; n],
        hi: vec![0.0; n],
        findex: vec![-1; n],
        offsets,
        dimensions,
    };

    for i in 0..num_constraints {
        let offset = terms.offsets[i];
        let dim = terms.dimensions[i];

        // Fill the vector slices this constraint owns.
        {
            let mut info = ConstraintInfo {
                x: &mut terms.x[offset..offset + dim],
                lo: &mut terms.lo[offset..offset + dim],
                hi: &mut terms.hi[offset..offset + dim],
                b: &mut terms.b[offset..offset + dim],
                w: &mut terms.w[offset..offset + dim],
                findex: &mut terms.findex[offset..offset + dim],
                inv_time_step,
            };
            group.constraint_mut(i).update_info(&mut info);
        }

        // Friction indices arrive relative to the constraint; shift them to
        // global row numbers.
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        for j in 0..dim {
            if terms.findex[offset + j] >= 0 {
                terms.findex[offset + j] += offset as i32;
            }
        }

        // Fill the matrix rows by impulse tests.
        group.constraint_mut(i).excite();
        for j in 0..dim {
            group.constraint_mut(i).apply_unit_impulse(j);

            let row_index = offset + j;

            // The probing constraint's own block carries the bias.
            {
                let row = terms.a.row_mut(row_index);
                group
                    .constraint_mut(i)
                    .velocity_change(&mut row[offset..offset + dim], true);
            }

            // Responses of later constraints fill the upper triangle.
            for k in i + 1..num_constraints {
                let peer_offset = terms.offsets[k];
                let peer_dim = terms.dimensions[k];
                let row = terms.a.row_mut(row_index);
                group
                    .constraint_mut(k)
                    .velocity_change(&mut row[peer_offset..peer_offset + peer_dim], false);
            }

            // Blocks against earlier constraints mirror rows already
            // probed.
            for k in 0..i {
                let peer_offset = terms.offsets[k];
                for l in 0..terms.dimensions[k] {
                    let mirrored = terms.a.get(peer_offset + l, row_index);
                    terms.a.set(row_index, peer_offset + l, mirrored);
                }
            }
        }

        debug_assert!(
            diagnostics::is_symmetric_in(&terms.a, offset, offset + dim - 1),
            "constraint {i} produced an asymmetric diagonal block"
        );

        group.constraint_mut(i).unexcite();
    }

    debug_assert!(
        diagnostics::is_symmetric(&terms.a),
        "assembled matrix is not symmetric"
    );

    Ok(terms)
}
