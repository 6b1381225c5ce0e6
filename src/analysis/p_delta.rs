//! P-Delta analysis
//!
//! Fixed-point iteration on `(K + K_g(N))·U = F`: member axial forces from
//! the current displacements rebuild the geometric stiffness until the
//! displacement change falls below the tolerance.

use crate::assembly::{self, ElementFrame};
use crate::error::{SolverError, SolverResult};
use crate::math::{self, Mat, Vec12, Vector};
use crate::model::StructuralModel;
use crate::results::{Diagnostics, StaticResult};

use super::dispatcher::{Milestone, SolveContext};
use super::linear::{solve_displacements, solve_scaled, StaticParams, StaticSystem};

/// Outcome of one geometric iteration at a fixed load level
pub(crate) struct GeometricState {
    pub u: Vector,
    /// Tangent stiffness `K + K_g` the final `u` satisfies
    pub k_t: Mat,
    pub iterations: usize,
    /// Relative displacement change of the last iteration
    pub residual: f64,
    pub converged: bool,
}

/// Member axial forces (tension positive) at displacements `u`, with
/// fixed-end forces scaled by `load_factor`
pub(crate) fn axial_forces(
    frames: &[ElementFrame<'_>],
    fers: &[Vec12],
    u: &Vector,
    load_factor: f64,
) -> Vec<f64> {
    frames
        .iter()
        .zip(fers)
        .map(|(frame, fer)| ElementFrame::axial_force(&frame.end_forces(u, &(fer * load_factor))))
        .collect()
}

/// Iterate the geometric stiffness from `u_start` at `load_factor` times
/// the combination loads
pub(crate) fn iterate_geometric(
    system: &StaticSystem<'_>,
    load_factor: f64,
    u_start: Vector,
    ctx: &SolveContext<'_>,
    diagnostics: &mut Diagnostics,
) -> SolverResult<GeometricState> {
    let options = ctx.options;
    let p = &system.p * load_factor;
    let mut u = u_start;
    let mut k_t = system.k.clone();
    let mut residual = f64::INFINITY;
    let mut scratch = Diagnostics::quiet();
    let free = system.dofs.free_dofs();
    let elastic_stable = math::submatrix(&system.k, free).cholesky().is_some();

    for iteration in 1..=options.max_iterations.max(1) {
        ctx.checkpoint(|| format!("geometric iteration {iteration}"))?;

        let axial = axial_forces(&system.frames, &system.fers, &u, load_factor);
        k_t = &system.k + assembly::assemble_geometric_stiffness(&system.frames, &system.dofs, &axial);
        if elastic_stable && math::submatrix(&k_t, free).cholesky().is_none() {
            log::warn!("Tangent stiffness is not positive definite at load factor {load_factor:.4}");
            diagnostics.absorb(scratch);
            return Ok(GeometricState {
                u,
                k_t,
                iterations: iteration,
                residual: f64::INFINITY,
                converged: false,
            });
        }

        scratch = Diagnostics::quiet();
        let u_next = solve_scaled(&k_t, &p, &system.dofs, load_factor, options, &mut scratch)?;
        let change = (&u_next - &u).norm();
        let scale = u_next.norm();
        residual = if scale > 0.0 { change / scale } else { change };
        u = u_next;
        log::debug!("Geometric iteration {iteration}: relative change {residual:.3e}");

        if residual <= options.tolerance {
            diagnostics.absorb(scratch);
            return Ok(GeometricState {
                u,
                k_t,
                iterations: iteration,
                residual,
                converged: true,
            });
        }
    }

    diagnostics.absorb(scratch);
    Ok(GeometricState {
        u,
        k_t,
        iterations: options.max_iterations.max(1),
        residual,
        converged: false,
    })
}

/// Run a P-Delta analysis at full load
pub fn run(
    model: &StructuralModel,
    params: &StaticParams,
    ctx: &mut SolveContext<'_>,
) -> SolverResult<(StaticResult, Diagnostics)> {
    let system = StaticSystem::build(model, params.combination.as_deref(), ctx)?;
    let mut diagnostics = Diagnostics::for_dofs(&system.dofs);

    ctx.milestone(Milestone::Solving);
    // First pass: linear solution
    let u0 = solve_displacements(&system.k, &system.p, &system.dofs, ctx.options, &mut Diagnostics::default())?;
    let state = iterate_geometric(&system, 1.0, u0, ctx, &mut diagnostics)?;
    if !state.converged {
        log::warn!(
            "P-Delta did not converge: relative change {:.3e} after {} iterations",
            state.residual,
            state.iterations
        );
        return Err(SolverError::ConvergenceFailed(state.iterations));
    }
    diagnostics.iterations = state.iterations;

    ctx.milestone(Milestone::PostProcessing);
    let result = system.recover(model, &state.k_t, &state.u, 1.0, ctx.options, &mut diagnostics);
    log::info!(
        "P-Delta converged in {} iterations: max displacement {:.6e}",
        state.iterations,
        diagnostics.max_displacement
    );
    Ok((result, diagnostics))
}
