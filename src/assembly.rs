//! Global matrix assembly
//!
//! Element kernels are evaluated per element (optionally in parallel with the
//! `parallel` feature) into an [`ElementFrame`]; the scatter into the global
//! matrix is always a single sequential pass so shared DOFs accumulate
//! without synchronization.

use nalgebra_sparse::CsrMatrix;

use crate::dof::{Dof, DofManager};
use crate::elements::{Element, Material, Section};
use crate::error::SolverResult;
use crate::geometry::{self, LocalAxes};
use crate::math::{self, Mat, Mat12, SparseMatrixBuilder, Vec12, Vector};
use crate::model::StructuralModel;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Mass matrix formulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MassFormulation {
    #[default]
    Consistent,
    Lumped,
}

/// Per-element geometry, transformation and local stiffness for one run
#[derive(Debug, Clone)]
pub struct ElementFrame<'m> {
    pub name: &'m str,
    pub element: &'m Element,
    pub material: &'m Material,
    pub section: &'m Section,
    pub length: f64,
    pub axes: LocalAxes,
    /// Global-to-local transformation
    pub t: Mat12,
    /// Local stiffness before release condensation
    pub k_full: Mat12,
    /// Local stiffness with end releases condensed out
    pub k_local: Mat12,
    /// Global DOF indices, i-node first
    pub dofs: [usize; 12],
}

impl<'m> ElementFrame<'m> {
    fn build(
        name: &'m str,
        element: &'m Element,
        model: &'m StructuralModel,
        dofs: &DofManager,
    ) -> SolverResult<Self> {
        let material = model.material(&element.material)?;
        let section = model.section(&element.section)?;
        let start = model.node(&element.i_node)?.coords();
        let end = model.node(&element.j_node)?.coords();

        let length = geometry::element_length(&start, &end)?;
        let axes = geometry::local_axes(&start, &end, element.reference_vector, element.rotation)?;

        let k = if element.is_axial_only() {
            math::local_truss_stiffness(material.e, section.a, length)
        } else {
            math::local_beam_stiffness(
                material.e, material.g, section.a, section.iy, section.iz, section.j, length,
            )
        };
        let k_local = if element.releases.any() {
            math::apply_releases(&k, &element.releases.as_array())
        } else {
            k
        };

        Ok(Self {
            name,
            element,
            material,
            section,
            length,
            axes,
            t: axes.transformation(),
            k_full: k,
            k_local,
            dofs: dofs.element_dofs(&element.i_node, &element.j_node)?,
        })
    }

    /// Element stiffness in global axes
    pub fn k_global(&self) -> Mat12 {
        transform_to_global(&self.k_local, &self.t)
    }

    /// Element displacements in local axes, gathered from a global vector
    pub fn local_displacements(&self, u: &Vector) -> Vec12 {
        let u_global = Vec12::from_fn(|i, _| u[self.dofs[i]]);
        self.t * u_global
    }

    /// Local end forces `k_local T u + FER`
    pub fn end_forces(&self, u: &Vector, fer: &Vec12) -> Vec12 {
        self.k_local * self.local_displacements(u) + fer
    }

    /// Axial force, tension positive, from local end forces
    pub fn axial_force(forces: &Vec12) -> f64 {
        forces[6]
    }

    /// Local geometric stiffness for axial force `p` (tension positive)
    pub fn kg_local(&self, p: f64) -> Mat12 {
        if self.element.is_axial_only() {
            return math::local_truss_geometric_stiffness(p, self.length);
        }
        let kg = math::local_geometric_stiffness(p, self.section.a, self.section.iy, self.section.iz, self.length);
        if self.element.releases.any() {
            math::apply_releases(&kg, &self.element.releases.as_array())
        } else {
            kg
        }
    }

    /// Line mass: explicit override or `rho * A`
    pub fn mass_per_length(&self) -> f64 {
        self.element
            .mass_per_length
            .unwrap_or(self.material.rho * self.section.a)
    }

    /// Local mass matrix for the chosen formulation
    pub fn m_local(&self, formulation: MassFormulation) -> Mat12 {
        let m = self.mass_per_length();
        let axial_only = self.element.is_axial_only();
        match (formulation, axial_only) {
            (MassFormulation::Consistent, false) => {
                math::local_consistent_mass(m, self.section.ip() / self.section.a, self.length)
            }
            (MassFormulation::Consistent, true) => math::local_truss_mass(m, self.length),
            (MassFormulation::Lumped, false) => {
                math::local_lumped_mass(m, m * self.section.ip() / self.section.a, self.length)
            }
            (MassFormulation::Lumped, true) => math::local_lumped_mass(m, 0.0, self.length),
        }
    }
}

/// `Tᵀ · K · T`
pub fn transform_to_global(k_local: &Mat12, t: &Mat12) -> Mat12 {
    t.transpose() * k_local * t
}

/// Register every node, apply supports and settlements, and finalize
pub fn build_dof_manager(model: &StructuralModel) -> SolverResult<DofManager> {
    let mut dofs = DofManager::new();
    for name in model.nodes.keys() {
        dofs.assign_node_dofs(name)?;
    }
    for (node, support) in &model.supports {
        dofs.apply_boundary_conditions(node, support.restraints)?;
        for (dof, settlement) in Dof::ALL.iter().zip(support.settlements) {
            if let Some(value) = settlement {
                dofs.prescribe(node, *dof, value)?;
            }
        }
    }
    dofs.finalize_dof_mapping();
    Ok(dofs)
}

/// Kernel evaluation for every element
pub fn element_frames<'m>(
    model: &'m StructuralModel,
    dofs: &DofManager,
) -> SolverResult<Vec<ElementFrame<'m>>> {
    #[cfg(feature = "parallel")]
    let frames = model
        .elements
        .par_iter()
        .map(|(name, element)| ElementFrame::build(name, element, model, dofs))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let frames = model
        .elements
        .iter()
        .map(|(name, element)| ElementFrame::build(name, element, model, dofs))
        .collect();

    frames
}

#[inline]
fn scatter(global: &mut Mat, dofs: &[usize; 12], m: &Mat12) {
    for (i, &gi) in dofs.iter().enumerate() {
        for (j, &gj) in dofs.iter().enumerate() {
            global[(gi, gj)] += m[(i, j)];
        }
    }
}

fn map_elements<'m, F>(frames: &[ElementFrame<'m>], f: F) -> Vec<Mat12>
where
    F: Fn(&ElementFrame<'m>) -> Mat12 + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        frames.par_iter().map(f).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        frames.iter().map(f).collect()
    }
}

/// Global elastic stiffness, including support springs
pub fn assemble_stiffness(model: &StructuralModel, frames: &[ElementFrame<'_>], dofs: &DofManager) -> SolverResult<Mat> {
    let n = dofs.total_dofs();
    let mut k = Mat::zeros(n, n);

    let contributions = map_elements(frames, ElementFrame::k_global);
    for (frame, ke) in frames.iter().zip(&contributions) {
        scatter(&mut k, &frame.dofs, ke);
    }

    for (node, support) in &model.supports {
        let node_dofs = dofs.node_dofs(node)?;
        for (local, stiffness) in support.active_springs() {
            k[(node_dofs[local], node_dofs[local])] += stiffness;
        }
    }
    Ok(k)
}

/// Build the DOF mapping and the global stiffness matrix for a model
///
/// The returned [`DofManager`] is finalized and indexes the matrix.
pub fn assemble_global_stiffness(model: &StructuralModel) -> SolverResult<(Mat, DofManager)> {
    let dofs = build_dof_manager(model)?;
    let frames = element_frames(model, &dofs)?;
    let k = assemble_stiffness(model, &frames, &dofs)?;
    log::info!(
        "Assembled stiffness: {} elements, {} DOFs ({} free)",
        frames.len(),
        dofs.total_dofs(),
        dofs.free_dofs().len()
    );
    Ok((k, dofs))
}

/// Global geometric stiffness for the given element axial forces
/// (tension positive, one per frame)
pub fn assemble_geometric_stiffness(frames: &[ElementFrame<'_>], dofs: &DofManager, axial: &[f64]) -> Mat {
    let n = dofs.total_dofs();
    let mut kg = Mat::zeros(n, n);

    let contributions: Vec<Mat12> = frames
        .iter()
        .zip(axial)
        .map(|(frame, &p)| transform_to_global(&frame.kg_local(p), &frame.t))
        .collect();
    for (frame, kge) in frames.iter().zip(&contributions) {
        scatter(&mut kg, &frame.dofs, kge);
    }
    kg
}

/// Global mass matrix including nodal masses
pub fn assemble_mass_matrix(
    model: &StructuralModel,
    frames: &[ElementFrame<'_>],
    dofs: &DofManager,
    formulation: MassFormulation,
) -> SolverResult<Mat> {
    let n = dofs.total_dofs();
    let mut m = Mat::zeros(n, n);

    let contributions = map_elements(frames, |frame| {
        transform_to_global(&frame.m_local(formulation), &frame.t)
    });
    for (frame, me) in frames.iter().zip(&contributions) {
        scatter(&mut m, &frame.dofs, me);
    }

    for (name, node) in &model.nodes {
        if node.mass > 0.0 {
            let node_dofs = dofs.node_dofs(name)?;
            for &d in &node_dofs[..3] {
                m[(d, d)] += node.mass;
            }
        }
    }
    Ok(m)
}

/// Free-free block of a global matrix in sparse form
pub fn sparse_free_block(global: &Mat, dofs: &DofManager) -> CsrMatrix<f64> {
    let free = dofs.free_dofs();
    let mut builder = SparseMatrixBuilder::new(free.len());
    for (j, &gj) in free.iter().enumerate() {
        for (i, &gi) in free.iter().enumerate() {
            builder.add(i, j, global[(gi, gj)]);
        }
    }
    log::debug!(
        "Sparse free block: {} x {}, {} non-zeros ({:.1}% sparse)",
        free.len(),
        free.len(),
        builder.nnz(),
        builder.sparsity() * 100.0
    );
    builder.to_csr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Element, Node, Support};
    use approx::assert_relative_eq;

    fn portal() -> StructuralModel {
        let mut model = StructuralModel::new();
        model.add_node("A", Node::new(0.0, 0.0, 0.0)).unwrap();
        model.add_node("B", Node::new(0.0, 4.0, 0.0)).unwrap();
        model.add_node("C", Node::new(6.0, 4.0, 0.0)).unwrap();
        model.add_node("D", Node::new(6.0, 0.0, 0.0).with_mass(500.0)).unwrap();
        model.add_material("steel", Material::steel()).unwrap();
        model.add_section("sec", Section::rectangular(0.3, 0.4)).unwrap();
        model.add_element("C1", Element::new("A", "B", "steel", "sec")).unwrap();
        model.add_element("B1", Element::new("B", "C", "steel", "sec")).unwrap();
        model.add_element("C2", Element::new("D", "C", "steel", "sec")).unwrap();
        model.add_support("A", Support::fixed()).unwrap();
        model.add_support("D", Support::fixed()).unwrap();
        model
    }

    #[test]
    fn global_stiffness_is_symmetric() {
        let (k, dofs) = assemble_global_stiffness(&portal()).unwrap();
        assert_eq!(k.nrows(), 24);
        assert_eq!(dofs.free_dofs().len(), 12);
        assert_relative_eq!(k.clone(), k.transpose(), epsilon = 1e-3);
    }

    #[test]
    fn shared_node_accumulates_both_members() {
        let model = portal();
        let dofs = build_dof_manager(&model).unwrap();
        let frames = element_frames(&model, &dofs).unwrap();
        let k = assemble_stiffness(&model, &frames, &dofs).unwrap();

        let b = dofs.node_dofs("B").unwrap();
        let expected: f64 = frames
            .iter()
            .filter(|f| f.dofs.contains(&b[0]))
            .map(|f| {
                let pos = f.dofs.iter().position(|&d| d == b[0]).unwrap();
                f.k_global()[(pos, pos)]
            })
            .sum();
        assert_relative_eq!(k[(b[0], b[0])], expected, max_relative = 1e-12);
    }

    #[test]
    fn mass_matrix_carries_total_mass() {
        let model = portal();
        let dofs = build_dof_manager(&model).unwrap();
        let frames = element_frames(&model, &dofs).unwrap();
        let member_mass = 7850.0 * 0.12 * (4.0 + 6.0 + 4.0);

        for formulation in [MassFormulation::Consistent, MassFormulation::Lumped] {
            let m = assemble_mass_matrix(&model, &frames, &dofs, formulation).unwrap();
            // Rigid translation along global X
            let mut r = Vector::zeros(dofs.total_dofs());
            for node in ["A", "B", "C", "D"] {
                r[dofs.dof_index(node, Dof::Dx).unwrap()] = 1.0;
            }
            let total = r.dot(&(&m * &r));
            assert_relative_eq!(total, member_mass + 500.0, max_relative = 1e-10);
        }
    }

    #[test]
    fn springs_stiffen_free_dofs_only() {
        let mut model = portal();
        model
            .add_support("C", Support::default().with_spring(Dof::Dx, 1e7))
            .unwrap();
        let (k_spring, dofs) = assemble_global_stiffness(&model).unwrap();
        let (k_plain, _) = assemble_global_stiffness(&portal()).unwrap();
        let cx = dofs.dof_index("C", Dof::Dx).unwrap();
        assert_relative_eq!(k_spring[(cx, cx)] - k_plain[(cx, cx)], 1e7, max_relative = 1e-9);
    }
}
