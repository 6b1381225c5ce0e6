//! Load assembler: nodal loads and statically equivalent span loads
//!
//! Span loads are reduced to fixed-end reactions (FER) in local axes. The
//! global load vector receives `-Tᵀ·FER`; the same FER is added back to
//! `k_local·T·u` when element end forces are recovered.

use crate::assembly::ElementFrame;
use crate::dof::DofManager;
use crate::error::{SolverError, SolverResult};
use crate::geometry::LocalAxes;
use crate::math::{self, Vec12, Vector};
use crate::model::StructuralModel;

use super::{DistributedLoad, Load, LoadCombination, LoadKind};

/// Sum the nodal loads of a combination into a global vector
pub fn nodal_load_vector(
    loads: &[Load],
    combination: &LoadCombination,
    dofs: &DofManager,
) -> SolverResult<Vector> {
    let mut p = Vector::zeros(dofs.total_dofs());
    for load in loads {
        let LoadKind::Nodal(nodal) = &load.kind else {
            continue;
        };
        let factor = combination.factor(&load.case);
        if factor == 0.0 {
            continue;
        }
        let node_dofs = dofs.node_dofs(&nodal.node)?;
        for (dof, value) in node_dofs.iter().zip(nodal.components) {
            p[*dof] += factor * value;
        }
    }
    Ok(p)
}

/// Equivalent nodal loads of one span load, in local axes
pub fn local_equivalent_loads(kind: &LoadKind, axes: &LocalAxes, length: f64) -> SolverResult<Vec12> {
    let mut f = Vec12::zeros();
    match kind {
        LoadKind::Nodal(_) => {
            return Err(SolverError::InvalidInput(
                "nodal loads have no span equivalent".into(),
            ))
        }
        LoadKind::Point(point) => {
            for (action, magnitude) in point.direction.resolve(point.magnitude, axes) {
                f += math::equivalent_point_action(action, magnitude, point.position, length);
            }
        }
        LoadKind::Distributed(line) => {
            f = line_equivalent(line, axes, length)?;
        }
        LoadKind::Area(area) => {
            f = line_equivalent(&area.as_line_load(), axes, length)?;
        }
    }
    Ok(f)
}

fn line_equivalent(load: &DistributedLoad, axes: &LocalAxes, length: f64) -> SolverResult<Vec12> {
    let mut f = Vec12::zeros();
    for (w1, w2, x1, x2) in load.segments(length)? {
        // Fixed direction: components scale linearly between the ends
        for (action, unit) in load.direction.resolve(1.0, axes) {
            f += math::equivalent_linear_load(action, w1 * unit, w2 * unit, x1, x2, length);
        }
    }
    Ok(f)
}

/// Convert a distributed load into equivalent end forces in global axes
///
/// The result sums to the resultant of the line load and reproduces its
/// moment about either end.
pub fn distributed_to_nodal(load: &DistributedLoad, axes: &LocalAxes, length: f64) -> SolverResult<Vec12> {
    let local = line_equivalent(load, axes, length)?;
    Ok(axes.transformation().transpose() * local)
}

/// Fixed-end reactions of an element under a combination, local axes, with
/// end releases condensed out
pub fn element_fixed_end_forces(
    frame: &ElementFrame<'_>,
    loads: &[Load],
    combination: &LoadCombination,
) -> SolverResult<Vec12> {
    let mut fer = Vec12::zeros();
    for load in loads {
        if load.target_element() != Some(frame.name) {
            continue;
        }
        let factor = combination.factor(&load.case);
        if factor == 0.0 {
            continue;
        }
        fer -= local_equivalent_loads(&load.kind, &frame.axes, frame.length)? * factor;
    }

    if frame.element.releases.any() {
        fer = math::apply_fer_releases(&fer, &frame.k_full, &frame.element.releases.as_array());
    }
    Ok(fer)
}

/// Global load vector of a combination: nodal loads plus `-Tᵀ·FER` of every
/// loaded element. Returns the vector and the per-frame FER.
pub fn assemble_load_vector(
    model: &StructuralModel,
    frames: &[ElementFrame<'_>],
    dofs: &DofManager,
    combination: &LoadCombination,
) -> SolverResult<(Vector, Vec<Vec12>)> {
    let mut p = nodal_load_vector(&model.loads, combination, dofs)?;

    let mut fers = Vec::with_capacity(frames.len());
    for frame in frames {
        let fer = element_fixed_end_forces(frame, &model.loads, combination)?;
        if fer.iter().any(|v| *v != 0.0) {
            let global = frame.t.transpose() * fer;
            for (i, &dof) in frame.dofs.iter().enumerate() {
                p[dof] -= global[i];
            }
        }
        fers.push(fer);
    }

    for case in combination.cases() {
        if !model.loads.iter().any(|l| l.case == case) {
            log::warn!("Combination '{}' references case '{}' with no loads", combination.name, case);
        }
    }
    Ok((p, fers))
}
