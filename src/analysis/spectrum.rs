//! Response-spectrum analysis
//!
//! Each mode responds with `q = Γ·Sa(T)·scale / ω²`; peak modal responses
//! are combined by SRSS, CQC or absolute sum.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{SolverError, SolverResult, SolverWarning};
use crate::math::{Mat, Vec12, Vector};
use crate::model::StructuralModel;
use crate::results::{self, Diagnostics, ElementForces, SpectrumResult};

use super::dispatcher::{Milestone, SolveContext};
use super::modal::ModalBasis;
use super::Direction;

/// Modal combination rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModalCombination {
    /// Square root of the sum of squares
    #[default]
    Srss,
    /// Complete quadratic combination
    Cqc,
    /// Sum of absolute values
    Abs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumParams {
    pub num_modes: usize,
    /// `(period [s], Sa)` pairs, periods strictly increasing
    pub spectrum: Vec<(f64, f64)>,
    pub spectrum_scale: f64,
    pub direction: Direction,
    pub combination_rule: ModalCombination,
    /// Modal damping ratio used by CQC correlation
    pub damping_ratio: f64,
}

impl Default for SpectrumParams {
    fn default() -> Self {
        Self {
            num_modes: 10,
            spectrum: Vec::new(),
            spectrum_scale: 1.0,
            direction: Direction::X,
            combination_rule: ModalCombination::Srss,
            damping_ratio: 0.05,
        }
    }
}

impl SpectrumParams {
    fn validate(&self) -> SolverResult<()> {
        if self.spectrum.is_empty() {
            return Err(SolverError::InvalidInput("response spectrum has no points".into()));
        }
        if self.spectrum.windows(2).any(|w| w[1].0 <= w[0].0) {
            return Err(SolverError::InvalidInput(
                "spectrum periods must be strictly increasing".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.damping_ratio) {
            return Err(SolverError::InvalidInput(format!(
                "damping ratio {} outside [0, 1)",
                self.damping_ratio
            )));
        }
        Ok(())
    }
}

/// Run a response-spectrum analysis
pub fn run(
    model: &StructuralModel,
    params: &SpectrumParams,
    ctx: &mut SolveContext<'_>,
) -> SolverResult<(SpectrumResult, Diagnostics)> {
    params.validate()?;
    let (basis, mut diagnostics) = ModalBasis::compute(model, params.num_modes, ctx)?;
    let d = params.direction.index();
    let n_modes = basis.len();

    let mut spectral_accelerations = Vec::with_capacity(n_modes);
    let mut modal_base_shears = Vec::with_capacity(n_modes);
    let mut modal_displacements = Vec::with_capacity(n_modes);
    let mut modal_forces: Vec<Vec<Vec12>> = Vec::with_capacity(n_modes);

    for (i, &omega) in basis.omegas.iter().enumerate() {
        let period = 2.0 * PI / omega;
        let (sa, extrapolated) = interpolate(&params.spectrum, period);
        if extrapolated {
            diagnostics.warn(SolverWarning::SpectrumExtrapolated { period });
        }
        let sa = sa * params.spectrum_scale;
        let gamma = basis.participation[i][d];

        let u = basis.mode_vector(i) * (gamma * sa / (omega * omega));
        modal_forces.push(
            basis
                .frames
                .iter()
                .map(|frame| frame.end_forces(&u, &Vec12::zeros()))
                .collect(),
        );
        modal_displacements.push(u);
        spectral_accelerations.push(sa);
        // Effective modal mass times Sa
        modal_base_shears.push(gamma * gamma * sa);
    }
    ctx.milestone(Milestone::PostProcessing);

    let rho = correlation_matrix(params.combination_rule, &basis.omegas, params.damping_ratio);
    let rule = params.combination_rule;

    let total = basis.dofs.total_dofs();
    let displacement = Vector::from_fn(total, |k, _| {
        combine(rule, &rho, modal_displacements.iter().map(|u| u[k]))
    });
    let displacements = results::node_vector_map(&basis.dofs, &displacement);

    let mut element_forces = BTreeMap::new();
    for (e, frame) in basis.frames.iter().enumerate() {
        let local = Vec12::from_fn(|k, _| combine(rule, &rho, modal_forces.iter().map(|f| f[e][k])));
        element_forces.insert(frame.name.to_string(), ElementForces::envelope(&local));
    }

    let base_shear = combine(rule, &rho, modal_base_shears.iter().copied());
    diagnostics.max_displacement = results::max_displacement(&displacements).0;
    diagnostics.max_stress = results::max_stress(&basis.frames, &element_forces);
    log::info!(
        "Response spectrum ({:?}, {:?}): {} modes, base shear {:.3}",
        params.direction,
        rule,
        n_modes,
        base_shear
    );

    Ok((
        SpectrumResult {
            direction: params.direction,
            combination_rule: rule,
            modes_used: n_modes,
            displacements,
            element_forces,
            base_shear,
            modal_base_shears,
            spectral_accelerations,
        },
        diagnostics,
    ))
}

/// Linear interpolation of `Sa` at `period`, clamped to the end values.
/// The flag is set when the period lies outside the table.
pub fn interpolate(spectrum: &[(f64, f64)], period: f64) -> (f64, bool) {
    let (Some(&(t_first, sa_first)), Some(&(t_last, sa_last))) = (spectrum.first(), spectrum.last())
    else {
        return (0.0, true);
    };
    if period < t_first {
        return (sa_first, true);
    }
    if period > t_last {
        return (sa_last, true);
    }
    for w in spectrum.windows(2) {
        let ((t0, s0), (t1, s1)) = (w[0], w[1]);
        if period <= t1 {
            return (s0 + (s1 - s0) * (period - t0) / (t1 - t0), false);
        }
    }
    (sa_last, false)
}

/// Der Kiureghian correlation coefficient for equal modal damping
pub fn cqc_correlation(omega_i: f64, omega_j: f64, xi: f64) -> f64 {
    let r = omega_j / omega_i;
    let num = 8.0 * xi * xi * (1.0 + r) * r.powf(1.5);
    let den = (1.0 - r * r).powi(2) + 4.0 * xi * xi * r * (1.0 + r).powi(2);
    if den <= 0.0 {
        1.0
    } else {
        num / den
    }
}

fn correlation_matrix(rule: ModalCombination, omegas: &[f64], xi: f64) -> Mat {
    let n = omegas.len();
    match rule {
        ModalCombination::Cqc => Mat::from_fn(n, n, |i, j| {
            if i == j {
                1.0
            } else {
                cqc_correlation(omegas[i], omegas[j], xi)
            }
        }),
        _ => Mat::identity(n, n),
    }
}

/// Combine one response quantity over all modes
pub fn combine(rule: ModalCombination, rho: &Mat, values: impl Iterator<Item = f64>) -> f64 {
    let values: Vec<f64> = values.collect();
    match rule {
        ModalCombination::Srss => values.iter().map(|v| v * v).sum::<f64>().sqrt(),
        ModalCombination::Abs => values.iter().map(|v| v.abs()).sum(),
        ModalCombination::Cqc => {
            let mut sum = 0.0;
            for (i, vi) in values.iter().enumerate() {
                for (j, vj) in values.iter().enumerate() {
                    sum += vi * rho[(i, j)] * vj;
                }
            }
            sum.abs().sqrt()
        }
    }
}
