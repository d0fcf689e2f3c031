//! The constraint interface consumed by group assembly.
//!
//! A constraint couples one or more articulated bodies through some number
//! of scalar rows (a contact normal, two friction directions, the locked
//! axes of a joint). The group solver never sees the bodies or their
//! equations of motion; it learns everything it needs by probing the
//! constraint with unit impulses and reading the velocity responses back.

/// View into the group-level LCP buffers owned by one constraint.
///
/// Every slice has the constraint's dimension; indices are relative to the
/// constraint (the group solver shifts friction indices to global row
/// numbers after [`Constraint::update_info`] returns).
pub struct ConstraintInfo<'a> {
    /// Impulse slots (zeroed; solvers treat them as the starting iterate).
    pub x: &'a mut [f64],
    /// Lower impulse bounds to fill in.
    pub lo: &'a mut [f64],
    /// Upper impulse bounds to fill in. For friction rows this is the
    /// friction coefficient.
    pub hi: &'a mut [f64],
    /// Velocity bias (right-hand side) to fill in.
    pub b: &'a mut [f64],
    /// Slack slots (zeroed).
    pub w: &'a mut [f64],
    /// Friction indices to fill in, relative to this constraint:
    /// `-1` for independent rows, `0..dim` to reference a sibling row.
    pub findex: &'a mut [i32],
    /// Reciprocal of the simulation time step.
    pub inv_time_step: f64,
}

/// A velocity-level constraint over externally owned bodies.
///
/// Borrowed mutably for the duration of one group solve. The group solver
/// drives the excitation protocol: `excite` before probing, one
/// `apply_unit_impulse` + `velocity_change` round per row, `unexcite`
/// after, and a final `apply_impulse` + `excite` once impulses are solved.
pub trait Constraint {
    /// Number of scalar rows. Must be positive.
    fn dimension(&self) -> usize;

    /// Fill in this constraint's bias, bounds, and friction indices.
    fn update_info(&mut self, info: &mut ConstraintInfo<'_>);

    /// Mark the constraint active as the source of impulse probing.
    fn excite(&mut self);

    /// Clear the activation mark.
    fn unexcite(&mut self);

    /// Apply a unit impulse along row `index` to the underlying bodies.
    fn apply_unit_impulse(&mut self, index: usize);

    /// Write the velocity response of this constraint's rows into `delta`
    /// (length `dimension()`). `with_bias` is true only when the probing
    /// constraint reads its own diagonal block.
    fn velocity_change(&mut self, delta: &mut [f64], with_bias: bool);

    /// Commit the solved impulses for this constraint's rows.
    fn apply_impulse(&mut self, impulses: &[f64]);
}
