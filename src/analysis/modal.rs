//! Modal analysis: `K·φ = ω²·M·φ` on the free DOFs
//!
//! The generalized problem is reduced through the Cholesky factor of `K`
//! (mass may be singular on rotational DOFs); when `K` is not positive
//! definite the mass matrix is used as the metric instead.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::assembly::{self, ElementFrame};
use crate::dof::DofManager;
use crate::error::{SolverError, SolverResult, SolverWarning};
use crate::math::{self, Mat, Vector};
use crate::model::StructuralModel;
use crate::results::{Diagnostics, ModalResult, ModeResult, NodeDisplacement};

use super::dispatcher::{Milestone, SolveContext};
use super::Direction;

/// Eigenvalues at or below this fraction of the largest are dropped
const RELATIVE_CUTOFF: f64 = 1e-8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModalParams {
    /// Modes requested; clamped to the modes the model has
    pub num_modes: usize,
}

impl Default for ModalParams {
    fn default() -> Self {
        Self { num_modes: 10 }
    }
}

/// Mass-normalized modes of a model, reused by the dynamic solvers
pub(crate) struct ModalBasis<'m> {
    pub dofs: DofManager,
    pub frames: Vec<ElementFrame<'m>>,
    /// Angular frequencies, ascending
    pub omegas: Vec<f64>,
    /// Free-DOF shapes, one column per mode, `φᵀ·M·φ = 1`
    pub shapes: Mat,
    /// Participation factor per mode and direction
    pub participation: Vec<[f64; 3]>,
    /// Translational mass on the free DOFs per direction
    pub total_mass: [f64; 3],
}

impl<'m> ModalBasis<'m> {
    pub fn compute(
        model: &'m StructuralModel,
        num_modes: usize,
        ctx: &mut SolveContext<'_>,
    ) -> SolverResult<(Self, Diagnostics)> {
        if num_modes == 0 {
            return Err(SolverError::InvalidInput("num_modes must be at least 1".into()));
        }

        let dofs = assembly::build_dof_manager(model)?;
        ctx.milestone(Milestone::Initialized);

        let frames = assembly::element_frames(model, &dofs)?;
        let k = assembly::assemble_stiffness(model, &frames, &dofs)?;
        let m = assembly::assemble_mass_matrix(model, &frames, &dofs, ctx.options.mass)?;
        ctx.milestone(Milestone::ModelBuilt);

        let free = dofs.free_dofs();
        if free.is_empty() {
            return Err(SolverError::AnalysisFailed(
                "model has no free degrees of freedom".into(),
            ));
        }
        let k_ff = math::submatrix(&k, free);
        let m_ff = math::submatrix(&m, free);
        if m_ff.iter().all(|v| *v == 0.0) {
            return Err(SolverError::AnalysisFailed(
                "model has no mass on its free degrees of freedom".into(),
            ));
        }

        ctx.milestone(Milestone::Solving);
        let (mut omegas, shapes) = natural_modes(&k_ff, &m_ff)?;

        let mut diagnostics = Diagnostics::for_dofs(&dofs);
        let returned = num_modes.min(omegas.len());
        if returned < num_modes {
            diagnostics.warn(SolverWarning::ModesClamped {
                requested: num_modes,
                returned,
            });
        }
        omegas.truncate(returned);
        let shapes = shapes.columns(0, returned).into_owned();

        let mut participation = vec![[0.0; 3]; returned];
        let mut total_mass = [0.0; 3];
        for direction in Direction::ALL {
            let r = influence_vector(&dofs, direction);
            let mr = &m_ff * &r;
            total_mass[direction.index()] = r.dot(&mr);
            for (mode, gamma) in participation.iter_mut().enumerate() {
                gamma[direction.index()] = shapes.column(mode).dot(&mr);
            }
        }

        log::info!(
            "Modal solve: {} modes, f1 = {:.4} Hz",
            returned,
            omegas.first().map_or(0.0, |w| w / (2.0 * PI))
        );

        Ok((
            Self {
                dofs,
                frames,
                omegas,
                shapes,
                participation,
                total_mass,
            },
            diagnostics,
        ))
    }

    pub fn len(&self) -> usize {
        self.omegas.len()
    }

    /// Full-length shape vector of one mode
    pub fn mode_vector(&self, mode: usize) -> Vector {
        expand(&self.dofs, &self.shapes.column(mode).into_owned())
    }
}

/// Run a modal analysis
pub fn run(
    model: &StructuralModel,
    params: &ModalParams,
    ctx: &mut SolveContext<'_>,
) -> SolverResult<(ModalResult, Diagnostics)> {
    let (basis, diagnostics) = ModalBasis::compute(model, params.num_modes, ctx)?;
    ctx.milestone(Milestone::PostProcessing);

    let mut cumulative = [0.0; 3];
    let mut modes = Vec::with_capacity(basis.len());
    for (i, &omega) in basis.omegas.iter().enumerate() {
        let gamma = basis.participation[i];
        let ratios: [f64; 3] = std::array::from_fn(|d| {
            if basis.total_mass[d] > 0.0 {
                gamma[d] * gamma[d] / basis.total_mass[d]
            } else {
                0.0
            }
        });
        for d in 0..3 {
            cumulative[d] += ratios[d];
        }
        modes.push(ModeResult {
            mode: i + 1,
            eigenvalue: omega * omega,
            angular_frequency: omega,
            frequency: omega / (2.0 * PI),
            period: 2.0 * PI / omega,
            participation_factors: gamma,
            effective_mass_ratios: ratios,
            cumulative_mass_ratios: cumulative,
            shape: normalized_shape(&basis.dofs, &basis.mode_vector(i)),
        });
    }

    Ok((
        ModalResult {
            modes,
            total_mass: basis.total_mass,
        },
        diagnostics,
    ))
}

/// Angular frequencies (ascending) and mass-normalized free-DOF shapes
pub(crate) fn natural_modes(k_ff: &Mat, m_ff: &Mat) -> SolverResult<(Vec<f64>, Mat)> {
    let mut omegas = Vec::new();
    let mut columns = Vec::new();

    if let Some(eig) = math::generalized_eigen(k_ff, m_ff) {
        // μ = 1/ω² descending; φᵀKφ = 1 so φᵀMφ = μ
        let mu_max = eig.values.first().copied().unwrap_or(0.0);
        for (i, &mu) in eig.values.iter().enumerate() {
            if mu > RELATIVE_CUTOFF * mu_max && mu > 0.0 {
                omegas.push(mu.recip().sqrt());
                columns.push(eig.vectors.column(i) / mu.sqrt());
            }
        }
    } else {
        log::debug!("Stiffness not positive definite; using the mass matrix as metric");
        let eig = math::generalized_eigen(m_ff, k_ff).ok_or_else(|| {
            SolverError::AnalysisFailed(
                "stiffness and mass matrices are both singular on the free DOFs".into(),
            )
        })?;
        // λ = ω² descending; φᵀMφ = 1
        let lambda_max = eig.values.first().copied().unwrap_or(0.0).max(0.0);
        for (i, &lambda) in eig.values.iter().enumerate().rev() {
            if lambda > RELATIVE_CUTOFF * lambda_max {
                omegas.push(lambda.sqrt());
                columns.push(eig.vectors.column(i).into_owned());
            }
        }
    }

    if columns.is_empty() {
        return Err(SolverError::AnalysisFailed(
            "no vibration mode with a positive frequency".into(),
        ));
    }
    Ok((omegas, Mat::from_columns(&columns)))
}

/// Unit translation along `direction` on the free DOFs
pub(crate) fn influence_vector(dofs: &DofManager, direction: Direction) -> Vector {
    let free = dofs.free_dofs();
    Vector::from_fn(free.len(), |i, _| match dofs.locate(free[i]) {
        Some((_, dof)) if dof == direction.dof() => 1.0,
        _ => 0.0,
    })
}

/// Scatter a free-DOF vector into a full one (constrained DOFs zero)
pub(crate) fn expand(dofs: &DofManager, x_free: &Vector) -> Vector {
    let mut full = Vector::zeros(dofs.total_dofs());
    for (i, &dof) in dofs.free_dofs().iter().enumerate() {
        full[dof] = x_free[i];
    }
    full
}

/// Per-node shape scaled so the largest translation is +1.0
///
/// Pure rotational shapes are scaled on their largest rotation.
pub(crate) fn normalized_shape(dofs: &DofManager, shape: &Vector) -> BTreeMap<String, NodeDisplacement> {
    let peak = |translations: bool| {
        (0..shape.len())
            .filter(|&i| dofs.locate(i).is_some_and(|(_, d)| d.is_translation() == translations))
            .map(|i| shape[i])
            .fold(0.0_f64, |acc, v| if v.abs() > acc.abs() { v } else { acc })
    };
    let mut reference = peak(true);
    if reference.abs() < 1e-12 * shape.amax().max(f64::MIN_POSITIVE) {
        reference = peak(false);
    }
    let scale = if reference != 0.0 { reference.recip() } else { 1.0 };
    crate::results::node_vector_map(dofs, &(shape * scale))
}
