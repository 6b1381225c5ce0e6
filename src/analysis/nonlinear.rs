//! Nonlinear static analysis
//!
//! Loads are applied in increments; within each increment the tangent
//! stiffness `K + K_g(N)` is iterated to convergence. Member end moments are
//! checked against `fy·Z` to record plastic hinge formation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::assembly::ElementFrame;
use crate::error::{SolverError, SolverResult, SolverWarning};
use crate::math::{Vec12, Vector};
use crate::model::StructuralModel;
use crate::results::{self, Diagnostics, LoadStepRecord, MemberEnd, NonlinearResult, PlasticHinge};

use super::dispatcher::{Milestone, SolveContext};
use super::linear::{solve_scaled, StaticSystem};
use super::p_delta::{iterate_geometric, GeometricState};

/// Load increment schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStepping {
    /// Equal increments
    #[default]
    Linear,
    /// Large early increments shrinking toward full load
    Exponential,
}

impl LoadStepping {
    /// Load factor reached after `step` of `steps` increments
    pub fn factor(self, step: usize, steps: usize) -> f64 {
        let x = step as f64 / steps as f64;
        match self {
            Self::Linear => x,
            Self::Exponential => (1.0 - (-3.0 * x).exp()) / (1.0 - (-3.0_f64).exp()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NonlinearParams {
    pub combination: Option<String>,
    pub load_steps: usize,
    pub stepping: LoadStepping,
    /// Iterate the geometric stiffness within each step
    pub geometric_nonlinearity: bool,
    pub detect_hinges: bool,
}

impl Default for NonlinearParams {
    fn default() -> Self {
        Self {
            combination: None,
            load_steps: 10,
            stepping: LoadStepping::Linear,
            geometric_nonlinearity: true,
            detect_hinges: true,
        }
    }
}

/// Run an incremental nonlinear static analysis
pub fn run(
    model: &StructuralModel,
    params: &NonlinearParams,
    ctx: &mut SolveContext<'_>,
) -> SolverResult<(NonlinearResult, Diagnostics)> {
    if params.load_steps == 0 {
        return Err(SolverError::InvalidInput("load_steps must be at least 1".into()));
    }
    let system = StaticSystem::build(model, params.combination.as_deref(), ctx)?;
    let mut diagnostics = Diagnostics::for_dofs(&system.dofs);
    ctx.milestone(Milestone::Solving);

    let n = params.load_steps;
    let mut steps = Vec::with_capacity(n);
    let mut hinges = Vec::new();
    let mut hinged = BTreeSet::new();
    let mut last: Option<(f64, GeometricState)> = None;

    for step in 1..=n {
        ctx.checkpoint(|| format!("load step {step} of {n}"))?;
        let load_factor = params.stepping.factor(step, n);

        let state = if params.geometric_nonlinearity {
            let u_start = match &last {
                Some((previous, state)) if *previous > 0.0 => &state.u * (load_factor / previous),
                _ => {
                    let mut predictor = Diagnostics::quiet();
                    let u = solve_scaled(
                        &system.k,
                        &(&system.p * load_factor),
                        &system.dofs,
                        load_factor,
                        ctx.options,
                        &mut predictor,
                    )?;
                    diagnostics.absorb(predictor);
                    u
                }
            };
            iterate_geometric(&system, load_factor, u_start, ctx, &mut diagnostics)?
        } else {
            let u = solve_scaled(
                &system.k,
                &(&system.p * load_factor),
                &system.dofs,
                load_factor,
                ctx.options,
                &mut diagnostics,
            )?;
            GeometricState {
                u,
                k_t: system.k.clone(),
                iterations: 1,
                residual: 0.0,
                converged: true,
            }
        };
        diagnostics.iterations += state.iterations;

        let record = LoadStepRecord {
            step,
            load_factor,
            iterations: state.iterations,
            residual: state.residual,
            converged: state.converged,
            max_displacement: max_translation(&system, &state.u),
        };
        log::debug!(
            "Load step {step}/{n}: factor {load_factor:.4}, {} iterations, residual {:.3e}",
            state.iterations,
            state.residual
        );
        steps.push(record);

        if !state.converged {
            diagnostics.converged = false;
            diagnostics.warn(SolverWarning::StepNotConverged {
                step,
                residual: state.residual,
            });
            break;
        }

        if params.detect_hinges {
            for hinge in detect_hinges(&system.frames, &system.fers, &state.u, load_factor, step) {
                if hinged.insert((hinge.element.clone(), hinge.end)) {
                    log::info!(
                        "Plastic hinge at {} end {:?} in step {} (|M| = {:.3e} > {:.3e})",
                        hinge.element,
                        hinge.end,
                        step,
                        hinge.moment.abs(),
                        hinge.capacity
                    );
                    hinges.push(hinge);
                }
            }
        }
        last = Some((load_factor, state));
    }

    let Some((final_load_factor, state)) = last else {
        return Err(SolverError::ConvergenceFailed(ctx.options.max_iterations));
    };

    ctx.milestone(Milestone::PostProcessing);
    let final_state = system.recover(model, &state.k_t, &state.u, final_load_factor, ctx.options, &mut diagnostics);
    log::info!(
        "Nonlinear static finished at load factor {:.4} ({} of {} steps, {} hinges)",
        final_load_factor,
        steps.iter().filter(|s| s.converged).count(),
        n,
        hinges.len()
    );
    Ok((
        NonlinearResult {
            final_state,
            steps,
            hinges,
            final_load_factor,
        },
        diagnostics,
    ))
}

fn max_translation(system: &StaticSystem<'_>, u: &Vector) -> f64 {
    results::max_displacement(&results::node_vector_map(&system.dofs, u)).0
}

/// Member ends whose bending moment exceeds `fy·Z` about either axis
fn detect_hinges(
    frames: &[ElementFrame<'_>],
    fers: &[Vec12],
    u: &Vector,
    load_factor: f64,
    step: usize,
) -> Vec<PlasticHinge> {
    let mut found = Vec::new();
    for (frame, fer) in frames.iter().zip(fers) {
        let (Some(fy), Some((zy, zz))) = (frame.material.fy, frame.section.capacity_moduli()) else {
            continue;
        };
        let forces = frame.end_forces(u, &(fer * load_factor));
        for (end, my, mz) in [
            (MemberEnd::I, forces[4], forces[5]),
            (MemberEnd::J, forces[10], forces[11]),
        ] {
            let (cap_y, cap_z) = (fy * zy, fy * zz);
            let ratio_y = if cap_y > 0.0 { my.abs() / cap_y } else { 0.0 };
            let ratio_z = if cap_z > 0.0 { mz.abs() / cap_z } else { 0.0 };
            let (ratio, moment, capacity) = if ratio_y >= ratio_z {
                (ratio_y, my, cap_y)
            } else {
                (ratio_z, mz, cap_z)
            };
            if ratio > 1.0 {
                found.push(PlasticHinge {
                    element: frame.name.to_string(),
                    end,
                    step,
                    moment,
                    capacity,
                });
            }
        }
    }
    found
}
