//! Linear buckling analysis
//!
//! Member axial forces from a linear solve of the reference combination give
//! `K_g`; `K·φ = λ·(−K_g)·φ` is then solved for the smallest positive load
//! factors.

use serde::{Deserialize, Serialize};

use crate::assembly;
use crate::error::{SolverError, SolverResult};
use crate::loads::nodal_load_vector;
use crate::math;
use crate::model::StructuralModel;
use crate::results::{BucklingMode, BucklingResult, CriticalLoad, Diagnostics};

use super::dispatcher::{Milestone, SolveContext};
use super::linear::{solve_displacements, StaticSystem};
use super::modal::{expand, normalized_shape};
use super::p_delta::axial_forces;

/// Eigenvalues at or below this fraction of the largest are dropped
const RELATIVE_CUTOFF: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucklingParams {
    /// Reference load combination
    pub combination: Option<String>,
    pub num_modes: usize,
}

impl Default for BucklingParams {
    fn default() -> Self {
        Self {
            combination: None,
            num_modes: 5,
        }
    }
}

/// Run a linear buckling analysis
pub fn run(
    model: &StructuralModel,
    params: &BucklingParams,
    ctx: &mut SolveContext<'_>,
) -> SolverResult<(BucklingResult, Diagnostics)> {
    if params.num_modes == 0 {
        return Err(SolverError::InvalidInput("num_modes must be at least 1".into()));
    }
    let system = StaticSystem::build(model, params.combination.as_deref(), ctx)?;
    let mut diagnostics = Diagnostics::for_dofs(&system.dofs);

    ctx.milestone(Milestone::Solving);
    let u = solve_displacements(&system.k, &system.p, &system.dofs, ctx.options, &mut diagnostics)?;
    let axial = axial_forces(&system.frames, &system.fers, &u, 1.0);
    let kg = assembly::assemble_geometric_stiffness(&system.frames, &system.dofs, &axial);

    let free = system.dofs.free_dofs();
    let k_ff = math::submatrix(&system.k, free);
    let kg_ff = math::submatrix(&kg, free);
    let eig = math::generalized_eigen(&k_ff, &(-kg_ff)).ok_or_else(|| {
        SolverError::AnalysisFailed(
            "stiffness matrix is not positive definite; buckling needs a stable structure".into(),
        )
    })?;

    // μ = 1/λ, descending, so the smallest positive λ come first
    let mu_max = eig.values.iter().fold(0.0_f64, |acc, mu| acc.max(mu.abs()));
    let selected: Vec<(usize, f64)> = eig
        .values
        .iter()
        .enumerate()
        .filter(|(_, &mu)| mu > RELATIVE_CUTOFF * mu_max && mu > 0.0)
        .map(|(i, &mu)| (i, mu.recip()))
        .take(params.num_modes)
        .collect();

    ctx.milestone(Milestone::PostProcessing);
    let applied = nodal_load_vector(&model.loads, &system.combination, &system.dofs)?;
    let applied: Vec<(String, crate::dof::Dof, f64)> = applied
        .iter()
        .enumerate()
        .filter(|(_, v)| **v != 0.0)
        .filter_map(|(i, v)| {
            let (node, dof) = system.dofs.locate(i)?;
            Some((node.to_string(), dof, *v))
        })
        .collect();

    let modes: Vec<BucklingMode> = selected
        .iter()
        .enumerate()
        .map(|(k, &(column, load_factor))| {
            let phi = expand(&system.dofs, &eig.vectors.column(column).into_owned());
            BucklingMode {
                mode: k + 1,
                load_factor,
                critical_loads: applied
                    .iter()
                    .map(|(node, dof, value)| CriticalLoad {
                        node: node.clone(),
                        dof: *dof,
                        applied: *value,
                        critical: load_factor * value,
                    })
                    .collect(),
                shape: normalized_shape(&system.dofs, &phi),
            }
        })
        .collect();

    let critical_factor = modes.first().map(|m| m.load_factor);
    match critical_factor {
        Some(factor) => log::info!(
            "Buckling: {} modes, critical load factor {:.6e}",
            modes.len(),
            factor
        ),
        None => log::warn!("Buckling: no member in compression, no positive load factor"),
    }
    Ok((
        BucklingResult {
            modes,
            critical_factor,
        },
        diagnostics,
    ))
}
