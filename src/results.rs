//! Result types and the result formatter
//!
//! Solvers work on flat global vectors; the helpers here map them back to
//! named per-node and per-element quantities.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::AnalysisType;
use crate::assembly::ElementFrame;
use crate::dof::DofManager;
use crate::error::SolverWarning;
use crate::math::{Vec12, Vector};
use crate::model::StructuralModel;

/// Displacements at a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDisplacement {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
}

impl NodeDisplacement {
    /// From `[DX, DY, DZ, RX, RY, RZ]`
    pub fn from_array(arr: [f64; 6]) -> Self {
        Self {
            dx: arr[0],
            dy: arr[1],
            dz: arr[2],
            rx: arr[3],
            ry: arr[4],
            rz: arr[5],
        }
    }

    pub fn as_array(&self) -> [f64; 6] {
        [self.dx, self.dy, self.dz, self.rx, self.ry, self.rz]
    }

    pub fn translation_magnitude(&self) -> f64 {
        (self.dx.powi(2) + self.dy.powi(2) + self.dz.powi(2)).sqrt()
    }

    /// Largest absolute translational component
    pub fn max_translation(&self) -> f64 {
        self.dx.abs().max(self.dy.abs()).max(self.dz.abs())
    }
}

/// Support reactions at a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Reactions {
    pub fx: f64,
    pub fy: f64,
    pub fz: f64,
    pub mx: f64,
    pub my: f64,
    pub mz: f64,
}

impl Reactions {
    /// From `[FX, FY, FZ, MX, MY, MZ]`
    pub fn from_array(arr: [f64; 6]) -> Self {
        Self {
            fx: arr[0],
            fy: arr[1],
            fz: arr[2],
            mx: arr[3],
            my: arr[4],
            mz: arr[5],
        }
    }

    pub fn as_array(&self) -> [f64; 6] {
        [self.fx, self.fy, self.fz, self.mx, self.my, self.mz]
    }

    pub fn force_magnitude(&self) -> f64 {
        (self.fx.powi(2) + self.fy.powi(2) + self.fz.powi(2)).sqrt()
    }
}

/// Section forces at one member end, in local axes
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberForces {
    /// Positive in tension
    pub axial: f64,
    pub shear_y: f64,
    pub shear_z: f64,
    pub torsion: f64,
    pub moment_y: f64,
    pub moment_z: f64,
}

impl MemberForces {
    /// Internal forces at the i-end from the local end-force vector
    pub fn at_i_end(forces: &[f64; 12]) -> Self {
        Self {
            axial: -forces[0],
            shear_y: forces[1],
            shear_z: forces[2],
            torsion: -forces[3],
            moment_y: forces[4],
            moment_z: forces[5],
        }
    }

    /// Internal forces at the j-end
    pub fn at_j_end(forces: &[f64; 12]) -> Self {
        Self {
            axial: forces[6],
            shear_y: -forces[7],
            shear_z: -forces[8],
            torsion: forces[9],
            moment_y: forces[10],
            moment_z: forces[11],
        }
    }
}

/// End forces of one element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementForces {
    /// Local end-force vector `[Fx_i .. Mz_i, Fx_j .. Mz_j]`
    pub local: [f64; 12],
    pub i_end: MemberForces,
    pub j_end: MemberForces,
}

impl ElementForces {
    pub fn from_local(local: &Vec12) -> Self {
        let arr: [f64; 12] = std::array::from_fn(|i| local[i]);
        Self {
            local: arr,
            i_end: MemberForces::at_i_end(&arr),
            j_end: MemberForces::at_j_end(&arr),
        }
    }

    /// Unsigned peak end forces from a modal combination
    ///
    /// Combined peaks carry no direction, so both ends report the magnitudes
    /// as they stand instead of applying the internal-force sign convention.
    pub fn envelope(peaks: &Vec12) -> Self {
        let arr: [f64; 12] = std::array::from_fn(|i| peaks[i].abs());
        let end = |o: usize| MemberForces {
            axial: arr[o],
            shear_y: arr[o + 1],
            shear_z: arr[o + 2],
            torsion: arr[o + 3],
            moment_y: arr[o + 4],
            moment_z: arr[o + 5],
        };
        Self {
            local: arr,
            i_end: end(0),
            j_end: end(6),
        }
    }

    /// Axial force, tension positive
    pub fn axial(&self) -> f64 {
        self.j_end.axial
    }

    /// Largest absolute bending moment at either end
    pub fn max_moment(&self) -> f64 {
        [self.local[4], self.local[5], self.local[10], self.local[11]]
            .iter()
            .fold(0.0_f64, |acc, m| acc.max(m.abs()))
    }
}

/// Linear static (or P-Delta) response to one combination
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticResult {
    pub combination: String,
    pub displacements: BTreeMap<String, NodeDisplacement>,
    pub reactions: BTreeMap<String, Reactions>,
    pub element_forces: BTreeMap<String, ElementForces>,
}

/// One natural vibration mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeResult {
    /// 1-based mode number, ascending frequency
    pub mode: usize,
    pub eigenvalue: f64,
    pub angular_frequency: f64,
    pub frequency: f64,
    pub period: f64,
    /// Participation factor per global X/Y/Z
    pub participation_factors: [f64; 3],
    /// Effective modal mass ratio per X/Y/Z
    pub effective_mass_ratios: [f64; 3],
    pub cumulative_mass_ratios: [f64; 3],
    /// Shape scaled to a maximum translation of 1.0
    pub shape: BTreeMap<String, NodeDisplacement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModalResult {
    pub modes: Vec<ModeResult>,
    /// Total translational mass per X/Y/Z on free DOFs
    pub total_mass: [f64; 3],
}

/// Peak response from a response-spectrum analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectrumResult {
    pub direction: crate::analysis::Direction,
    pub combination_rule: crate::analysis::ModalCombination,
    pub modes_used: usize,
    pub displacements: BTreeMap<String, NodeDisplacement>,
    pub element_forces: BTreeMap<String, ElementForces>,
    /// Combined base shear in the excitation direction
    pub base_shear: f64,
    pub modal_base_shears: Vec<f64>,
    /// Spectral acceleration used per mode
    pub spectral_accelerations: Vec<f64>,
}

/// Displacement histories from direct integration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeHistoryResult {
    pub time: Vec<f64>,
    /// Per node: one `[DX..RZ]` sample per time point
    pub displacements: BTreeMap<String, Vec<[f64; 6]>>,
    pub peak_displacements: BTreeMap<String, NodeDisplacement>,
    pub max_displacement: f64,
    pub max_displacement_time: f64,
    /// Rayleigh coefficients actually used
    pub rayleigh_alpha: f64,
    pub rayleigh_beta: f64,
}

/// Convergence record of one nonlinear load step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadStepRecord {
    /// 1-based
    pub step: usize,
    pub load_factor: f64,
    pub iterations: usize,
    pub residual: f64,
    pub converged: bool,
    pub max_displacement: f64,
}

/// Member end
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MemberEnd {
    I,
    J,
}

/// Plastic hinge detected at a member end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlasticHinge {
    pub element: String,
    pub end: MemberEnd,
    /// Load step at which the moment first exceeded capacity
    pub step: usize,
    pub moment: f64,
    pub capacity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NonlinearResult {
    /// State at the last converged step
    pub final_state: StaticResult,
    pub steps: Vec<LoadStepRecord>,
    pub hinges: Vec<PlasticHinge>,
    pub final_load_factor: f64,
}

/// Critical load of one applied nodal load component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalLoad {
    pub node: String,
    pub dof: crate::dof::Dof,
    pub applied: f64,
    pub critical: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucklingMode {
    pub mode: usize,
    pub load_factor: f64,
    pub critical_loads: Vec<CriticalLoad>,
    pub shape: BTreeMap<String, NodeDisplacement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucklingResult {
    pub modes: Vec<BucklingMode>,
    /// Smallest positive load factor
    pub critical_factor: Option<f64>,
}

/// Typed result payload, one variant per analysis type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResultPayload {
    LinearStatic(StaticResult),
    PDelta(StaticResult),
    Modal(ModalResult),
    ResponseSpectrum(SpectrumResult),
    TimeHistory(TimeHistoryResult),
    NonlinearStatic(NonlinearResult),
    Buckling(BucklingResult),
}

impl ResultPayload {
    /// Static displacement field, when the payload carries one
    pub fn static_result(&self) -> Option<&StaticResult> {
        match self {
            Self::LinearStatic(r) | Self::PDelta(r) => Some(r),
            Self::NonlinearStatic(r) => Some(&r.final_state),
            _ => None,
        }
    }
}

/// Solver diagnostics attached to every result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub converged: bool,
    pub iterations: usize,
    pub solve_time: f64,
    pub max_displacement: f64,
    pub max_stress: f64,
    pub rank_deficient: bool,
    pub total_dofs: usize,
    pub free_dofs: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statics_residual: Option<f64>,
    #[serde(default)]
    pub warnings: Vec<SolverWarning>,
    /// Collect warnings without logging them (inner iterations)
    #[serde(skip)]
    pub(crate) quiet: bool,
}

impl Diagnostics {
    pub(crate) fn for_dofs(dofs: &DofManager) -> Self {
        Self {
            converged: true,
            total_dofs: dofs.total_dofs(),
            free_dofs: dofs.free_dofs().len(),
            ..Default::default()
        }
    }

    /// Diagnostics for an inner solve whose warnings are merged later
    pub(crate) fn quiet() -> Self {
        Self { quiet: true, ..Default::default() }
    }

    /// Record a warning; an identical warning already recorded is dropped
    pub(crate) fn warn(&mut self, warning: SolverWarning) {
        if self.warnings.contains(&warning) {
            return;
        }
        if !self.quiet {
            log::warn!("{}", warning);
        }
        self.warnings.push(warning);
    }

    /// Fold the flags and warnings of an inner solve into this one
    pub(crate) fn absorb(&mut self, inner: Diagnostics) {
        self.rank_deficient |= inner.rank_deficient;
        for warning in inner.warnings {
            self.warn(warning);
        }
    }
}

/// Result of one analysis case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub case_id: Uuid,
    pub case_name: String,
    pub analysis_type: AnalysisType,
    pub payload: ResultPayload,
    pub diagnostics: Diagnostics,
}

/// Per-node split of a global vector
pub fn node_vector_map(dofs: &DofManager, v: &Vector) -> BTreeMap<String, NodeDisplacement> {
    dofs.nodes()
        .filter_map(|node| {
            let d = dofs.node_dofs(node).ok()?;
            Some((node.to_string(), NodeDisplacement::from_array(d.map(|i| v[i]))))
        })
        .collect()
}

/// Reactions at supported nodes
///
/// `r` holds `K·U − F`; elastic supports report `-k·u` on their spring DOFs.
pub fn reaction_map(
    model: &StructuralModel,
    dofs: &DofManager,
    r: &Vector,
    u: &Vector,
) -> BTreeMap<String, Reactions> {
    let mut out = BTreeMap::new();
    for (node, support) in &model.supports {
        let Ok(d) = dofs.node_dofs(node) else {
            continue;
        };
        let mut arr = [0.0; 6];
        for k in 0..6 {
            if support.restraints[k] {
                arr[k] = r[d[k]];
            }
        }
        for (k, stiffness) in support.active_springs() {
            arr[k] = -stiffness * u[d[k]];
        }
        out.insert(node.clone(), Reactions::from_array(arr));
    }
    out
}

/// Element end forces `k_local·T·u + FER` for every frame
pub fn element_force_map(
    frames: &[ElementFrame<'_>],
    u: &Vector,
    fers: &[Vec12],
) -> BTreeMap<String, ElementForces> {
    frames
        .iter()
        .enumerate()
        .map(|(i, frame)| {
            let fer = fers.get(i).copied().unwrap_or_else(Vec12::zeros);
            (frame.name.to_string(), ElementForces::from_local(&frame.end_forces(u, &fer)))
        })
        .collect()
}

/// Largest translation magnitude and the node where it occurs
pub fn max_displacement(map: &BTreeMap<String, NodeDisplacement>) -> (f64, Option<&str>) {
    map.iter()
        .map(|(name, d)| (d.translation_magnitude(), name.as_str()))
        .fold((0.0, None), |best, (value, name)| {
            if value > best.0 {
                (value, Some(name))
            } else {
                best
            }
        })
}

/// Extreme-fibre stress `|N|/A + |My|/Sy + |Mz|/Sz` over all elements;
/// bending terms need the section outline
pub fn max_stress(frames: &[ElementFrame<'_>], forces: &BTreeMap<String, ElementForces>) -> f64 {
    let mut worst = 0.0_f64;
    for frame in frames {
        let Some(f) = forces.get(frame.name) else {
            continue;
        };
        let moduli = frame.section.elastic_moduli();
        for end in [f.i_end, f.j_end] {
            let mut sigma = end.axial.abs() / frame.section.a;
            if let Some((sy, sz)) = moduli {
                if sy > 0.0 {
                    sigma += end.moment_y.abs() / sy;
                }
                if sz > 0.0 {
                    sigma += end.moment_z.abs() / sz;
                }
            }
            worst = worst.max(sigma);
        }
    }
    worst
}

/// Envelope of a static result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub max_displacement: f64,
    pub max_displacement_node: String,
    pub max_reaction: f64,
    pub max_reaction_node: String,
    pub max_axial: f64,
    pub max_axial_element: String,
    pub max_moment: f64,
    pub max_moment_element: String,
    pub num_nodes: usize,
    pub num_elements: usize,
    pub total_dofs: usize,
    pub free_dofs: usize,
}

impl AnalysisSummary {
    pub fn from_static(result: &StaticResult, diagnostics: &Diagnostics) -> Self {
        let mut summary = Self {
            num_nodes: result.displacements.len(),
            num_elements: result.element_forces.len(),
            total_dofs: diagnostics.total_dofs,
            free_dofs: diagnostics.free_dofs,
            ..Default::default()
        };

        let (max_disp, node) = max_displacement(&result.displacements);
        summary.max_displacement = max_disp;
        summary.max_displacement_node = node.unwrap_or_default().to_string();

        for (name, r) in &result.reactions {
            if r.force_magnitude() > summary.max_reaction {
                summary.max_reaction = r.force_magnitude();
                summary.max_reaction_node = name.clone();
            }
        }
        for (name, f) in &result.element_forces {
            if f.axial().abs() > summary.max_axial {
                summary.max_axial = f.axial().abs();
                summary.max_axial_element = name.clone();
            }
            if f.max_moment() > summary.max_moment {
                summary.max_moment = f.max_moment();
                summary.max_moment_element = name.clone();
            }
        }
        summary
    }
}
