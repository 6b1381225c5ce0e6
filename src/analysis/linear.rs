//! Linear static analysis
//!
//! `K_ff·U_f = F_f − K_fc·U_c`, with a pseudo-inverse fallback when `K_ff` is
//! singular. Reactions are `R = K·U − F`; element end forces are
//! `k_local·T·u + FER`.

use serde::{Deserialize, Serialize};

use crate::assembly::{self, ElementFrame};
use crate::dof::DofManager;
use crate::error::{SolverResult, SolverWarning};
use crate::loads::{assemble_load_vector, LoadCombination};
use crate::math::{self, Mat, Vec12, Vector};
use crate::model::StructuralModel;
use crate::results::{self, Diagnostics, StaticResult};

use super::dispatcher::{Milestone, SolveContext};
use super::options::{AnalysisOptions, LinearSolver};

/// Parameters shared by linear static and P-Delta runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticParams {
    /// Load combination to analyze; the first defined (or the default
    /// `"Combo 1"`) when absent
    pub combination: Option<String>,
}

impl StaticParams {
    pub fn for_combination(name: &str) -> Self {
        Self {
            combination: Some(name.to_string()),
        }
    }
}

/// Assembled stiffness and loads of one combination
pub(crate) struct StaticSystem<'m> {
    pub dofs: DofManager,
    pub frames: Vec<ElementFrame<'m>>,
    /// Elastic global stiffness including springs
    pub k: Mat,
    /// Global load vector of the combination
    pub p: Vector,
    /// Local fixed-end forces per frame
    pub fers: Vec<Vec12>,
    pub combination: LoadCombination,
}

impl<'m> StaticSystem<'m> {
    pub fn build(
        model: &'m StructuralModel,
        combination: Option<&str>,
        ctx: &mut SolveContext<'_>,
    ) -> SolverResult<Self> {
        let combination = model.resolve_combination(combination)?;
        let dofs = assembly::build_dof_manager(model)?;
        ctx.milestone(Milestone::Initialized);

        let frames = assembly::element_frames(model, &dofs)?;
        let k = assembly::assemble_stiffness(model, &frames, &dofs)?;
        let (p, fers) = assemble_load_vector(model, &frames, &dofs, &combination)?;
        log::info!(
            "Model built: {} nodes, {} elements, {} DOFs ({} free), combination '{}'",
            dofs.node_count(),
            frames.len(),
            dofs.total_dofs(),
            dofs.free_dofs().len(),
            combination.name
        );
        ctx.milestone(Milestone::ModelBuilt);

        Ok(Self {
            dofs,
            frames,
            k,
            p,
            fers,
            combination,
        })
    }

    /// Displacements, reactions and element forces for a solved `u`
    ///
    /// `k` is the stiffness the solution satisfies (elastic, or elastic plus
    /// geometric); `load_factor` scales the loads and fixed-end forces.
    pub fn recover(
        &self,
        model: &StructuralModel,
        k: &Mat,
        u: &Vector,
        load_factor: f64,
        options: &AnalysisOptions,
        diagnostics: &mut Diagnostics,
    ) -> StaticResult {
        let p = &self.p * load_factor;
        let r = k * u - &p;
        let fers: Vec<Vec12> = self.fers.iter().map(|f| f * load_factor).collect();

        let displacements = results::node_vector_map(&self.dofs, u);
        let reactions = results::reaction_map(model, &self.dofs, &r, u);
        let element_forces = results::element_force_map(&self.frames, u, &fers);

        diagnostics.max_displacement = results::max_displacement(&displacements).0;
        diagnostics.max_stress = results::max_stress(&self.frames, &element_forces);
        if options.check_statics {
            let residual = statics_residual(model, &self.dofs, &p, &reactions);
            if residual > options.tolerance * p.norm().max(1.0) {
                diagnostics.warn(SolverWarning::StaticsResidual { residual });
            }
            diagnostics.statics_residual = Some(residual);
        }

        StaticResult {
            combination: self.combination.name.clone(),
            displacements,
            reactions,
            element_forces,
        }
    }
}

/// Run a linear static analysis
pub fn run(
    model: &StructuralModel,
    params: &StaticParams,
    ctx: &mut SolveContext<'_>,
) -> SolverResult<(StaticResult, Diagnostics)> {
    let system = StaticSystem::build(model, params.combination.as_deref(), ctx)?;
    let mut diagnostics = Diagnostics::for_dofs(&system.dofs);

    ctx.milestone(Milestone::Solving);
    let u = solve_displacements(&system.k, &system.p, &system.dofs, ctx.options, &mut diagnostics)?;

    ctx.milestone(Milestone::PostProcessing);
    let result = system.recover(model, &system.k, &u, 1.0, ctx.options, &mut diagnostics);
    log::info!(
        "Linear static solve finished: max displacement {:.6e}",
        diagnostics.max_displacement
    );
    Ok((result, diagnostics))
}

/// Solve `K·U = P` on the free DOFs and return the full displacement
/// vector, constrained DOFs holding their prescribed values
pub(crate) fn solve_displacements(
    k: &Mat,
    p: &Vector,
    dofs: &DofManager,
    options: &AnalysisOptions,
    diagnostics: &mut Diagnostics,
) -> SolverResult<Vector> {
    solve_scaled(k, p, dofs, 1.0, options, diagnostics)
}

/// As [`solve_displacements`], with settlements scaled by `settlement_factor`
pub(crate) fn solve_scaled(
    k: &Mat,
    p: &Vector,
    dofs: &DofManager,
    settlement_factor: f64,
    options: &AnalysisOptions,
    diagnostics: &mut Diagnostics,
) -> SolverResult<Vector> {
    let free = dofs.free_dofs();
    let constrained = dofs.constrained_dofs();
    let prescribed = dofs.prescribed_values();

    let mut u = Vector::zeros(dofs.total_dofs());
    for &c in constrained {
        u[c] = prescribed[c] * settlement_factor;
    }
    if free.is_empty() {
        return Ok(u);
    }

    let mut rhs = math::subvector(p, free);
    if dofs.has_settlements() {
        for (i, &fi) in free.iter().enumerate() {
            for &c in constrained {
                rhs[i] -= k[(fi, c)] * u[c];
            }
        }
    }

    let x = match options.solver {
        LinearSolver::Sparse => solve_sparse(k, &rhs, dofs, options, diagnostics),
        LinearSolver::Dense => None,
    };
    let x = match x {
        Some(x) => x,
        None => solve_dense(&math::submatrix(k, free), &rhs, diagnostics),
    };

    for (i, &fi) in free.iter().enumerate() {
        u[fi] = x[i];
    }
    Ok(u)
}

fn solve_dense(k_ff: &Mat, rhs: &Vector, diagnostics: &mut Diagnostics) -> Vector {
    let solution = math::solve_with_fallback(k_ff, rhs);
    if solution.rank_deficient {
        diagnostics.rank_deficient = true;
        diagnostics.warn(SolverWarning::SingularSystem {
            free_dofs: k_ff.nrows(),
            rank: solution.rank,
        });
    }
    solution.x
}

fn solve_sparse(
    k: &Mat,
    rhs: &Vector,
    dofs: &DofManager,
    options: &AnalysisOptions,
    diagnostics: &mut Diagnostics,
) -> Option<Vector> {
    let csr = assembly::sparse_free_block(k, dofs);
    match math::cholesky_pivot_ratio(&csr) {
        Some(ratio) if ratio > math::SINGULAR_PIVOT_RATIO => {}
        _ => {
            log::debug!("Free stiffness is singular or indefinite; using the dense solve");
            return None;
        }
    }
    let max_iter = options.max_iterations.max(1) * rhs.len().max(1);
    let tol = options.tolerance.min(1e-10);
    match math::solve_pcg(&csr, rhs, tol, max_iter) {
        Some(outcome) if outcome.converged => {
            log::debug!("PCG converged in {} iterations", outcome.iterations);
            diagnostics.iterations += outcome.iterations;
            Some(outcome.x)
        }
        Some(outcome) => {
            log::warn!(
                "PCG did not converge in {} iterations; falling back to dense solve",
                outcome.iterations
            );
            None
        }
        None => {
            log::debug!("PCG breakdown (matrix not positive definite); falling back to dense solve");
            None
        }
    }
}

/// Largest component of the net force and net moment (about the origin) of
/// applied loads plus reactions
pub(crate) fn statics_residual(
    model: &StructuralModel,
    dofs: &DofManager,
    p: &Vector,
    reactions: &std::collections::BTreeMap<String, crate::results::Reactions>,
) -> f64 {
    let mut force = [0.0; 3];
    let mut moment = [0.0; 3];
    for (name, node) in &model.nodes {
        let Ok(d) = dofs.node_dofs(name) else {
            continue;
        };
        let mut f: [f64; 6] = d.map(|i| p[i]);
        if let Some(r) = reactions.get(name) {
            for (fk, rk) in f.iter_mut().zip(r.as_array()) {
                *fk += rk;
            }
        }
        let [x, y, z] = node.coords();
        force[0] += f[0];
        force[1] += f[1];
        force[2] += f[2];
        moment[0] += f[3] + y * f[2] - z * f[1];
        moment[1] += f[4] + z * f[0] - x * f[2];
        moment[2] += f[5] + x * f[1] - y * f[0];
    }
    force
        .iter()
        .chain(moment.iter())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::CancelToken;
    use crate::dof::Dof;
    use crate::elements::{Element, Material, MemberReleases, Node, Section, Support};
    use crate::loads::{DistributedLoad, Load, LoadDirection, NodalLoad};
    use approx::assert_relative_eq;

    fn run_static(model: &StructuralModel, options: AnalysisOptions) -> (StaticResult, Diagnostics) {
        let token = CancelToken::new();
        let mut ctx = SolveContext::new(&options, &token);
        run(model, &StaticParams::default(), &mut ctx).unwrap()
    }

    fn beam_model(length: f64) -> StructuralModel {
        let mut model = StructuralModel::new();
        model.add_node("A", Node::new(0.0, 0.0, 0.0)).unwrap();
        model.add_node("B", Node::new(length, 0.0, 0.0)).unwrap();
        model.add_material("steel", Material::steel()).unwrap();
        model.add_section("sec", Section::rectangular(0.2, 0.4)).unwrap();
        model.add_element("M1", Element::new("A", "B", "steel", "sec")).unwrap();
        model
    }

    #[test]
    fn fixed_fixed_uniform_load_gives_classic_end_moments() {
        let mut model = beam_model(6.0);
        model.add_support("A", Support::fixed()).unwrap();
        model.add_support("B", Support::fixed()).unwrap();
        model
            .add_load(Load::distributed(
                "Case 1",
                DistributedLoad::uniform("M1", -10.0, LoadDirection::FY),
            ))
            .unwrap();

        let (result, _) = run_static(&model, AnalysisOptions::default().with_statics_check());
        let forces = &result.element_forces["M1"];
        // wL²/12 at both ends, wL/2 shear
        assert_relative_eq!(forces.local[5].abs(), 30.0, max_relative = 1e-9);
        assert_relative_eq!(forces.local[11].abs(), 30.0, max_relative = 1e-9);
        assert_relative_eq!(result.reactions["A"].fy, 30.0, max_relative = 1e-9);
        assert_relative_eq!(result.reactions["B"].fy, 30.0, max_relative = 1e-9);
    }

    #[test]
    fn fully_released_member_behaves_as_simple_span() {
        let mut model = beam_model(4.0);
        model.elements.get_mut("M1").unwrap().releases = MemberReleases::pin_both();
        model.add_support("A", Support::fixed()).unwrap();
        model
            .add_support("B", Support::with_restraints([false, true, true, true, true, true]))
            .unwrap();
        model
            .add_load(Load::distributed(
                "Case 1",
                DistributedLoad::uniform("M1", -5.0, LoadDirection::FY),
            ))
            .unwrap();

        let (result, diagnostics) = run_static(&model, AnalysisOptions::default());
        let forces = &result.element_forces["M1"];
        assert!(forces.local[5].abs() < 1e-6);
        assert!(forces.local[11].abs() < 1e-6);
        assert_relative_eq!(result.reactions["A"].fy, 10.0, max_relative = 1e-9);
        assert_relative_eq!(result.reactions["B"].fy, 10.0, max_relative = 1e-9);
        assert!(result.reactions["A"].mz.abs() < 1e-6);
        assert!(!diagnostics.rank_deficient);
    }

    #[test]
    fn settlement_induces_fixed_end_moment() {
        let length = 5.0;
        let mut model = beam_model(length);
        model.add_support("A", Support::fixed()).unwrap();
        model
            .add_support("B", Support::fixed().with_settlement(Dof::Dy, -0.01))
            .unwrap();
        let (result, _) = run_static(&model, AnalysisOptions::default());

        let section = Section::rectangular(0.2, 0.4);
        let ei = Material::steel().e * section.iz;
        let expected = 6.0 * ei * 0.01 / (length * length);
        assert_relative_eq!(result.displacements["B"].dy, -0.01, epsilon = 1e-15);
        assert_relative_eq!(result.reactions["A"].mz.abs(), expected, max_relative = 1e-9);
    }

    #[test]
    fn sparse_and_dense_paths_agree() {
        let mut model = beam_model(3.0);
        model.add_node("C", Node::new(3.0, 3.0, 0.0)).unwrap();
        model.add_element("M2", Element::new("B", "C", "steel", "sec")).unwrap();
        model.add_support("A", Support::fixed()).unwrap();
        model.add_support("C", Support::pinned()).unwrap();
        model
            .add_load(Load::nodal("Case 1", NodalLoad::new("B", [2e3, -5e3, 1e3, 0.0, 0.0, 4e2])))
            .unwrap();

        let (dense, _) = run_static(&model, AnalysisOptions::default());
        let (sparse, _) = run_static(&model, AnalysisOptions::default().with_solver(LinearSolver::Sparse));
        let d = dense.displacements["B"].as_array();
        let s = sparse.displacements["B"].as_array();
        for k in 0..6 {
            assert_relative_eq!(d[k], s[k], epsilon = 1e-12, max_relative = 1e-4);
        }
    }

    #[test]
    fn collinear_hinged_mechanism_is_flagged() {
        // Two pin-ended members in a straight line: no transverse stiffness at B
        for solver in [LinearSolver::Dense, LinearSolver::Sparse] {
            let mut model = StructuralModel::new();
            model.add_material("steel", Material::steel()).unwrap();
            model.add_section("sec", Section::rectangular(0.2, 0.4)).unwrap();
            model.add_node("A", Node::new(0.0, 0.0, 0.0)).unwrap();
            model.add_node("B", Node::new(3.0, 1.7, 0.9)).unwrap();
            model.add_node("C", Node::new(6.0, 3.4, 1.8)).unwrap();
            for (name, i, j) in [("AB", "A", "B"), ("BC", "B", "C")] {
                model
                    .add_element(
                        name,
                        Element::new(i, j, "steel", "sec").with_releases(MemberReleases::pin_both()),
                    )
                    .unwrap();
            }
            model.add_support("A", Support::fixed()).unwrap();
            model.add_support("C", Support::fixed()).unwrap();
            model
                .add_support("B", Support::with_restraints([false, false, false, true, true, true]))
                .unwrap();
            model
                .add_load(Load::nodal("Case 1", NodalLoad::force("B", Dof::Dz, -1000.0)))
                .unwrap();

            let (result, diagnostics) = run_static(&model, AnalysisOptions::default().with_solver(solver));
            assert!(diagnostics.rank_deficient, "{solver:?} path did not flag the mechanism");
            assert!(diagnostics
                .warnings
                .iter()
                .any(|w| matches!(w, SolverWarning::SingularSystem { .. })));
            let b = &result.displacements["B"];
            assert!(b.translation_magnitude() < 1e-3, "B moved {:?}", b);
        }
    }

    #[test]
    fn unrestrained_model_is_flagged_not_failed() {
        let mut model = beam_model(2.0);
        model
            .add_load(Load::nodal("Case 1", NodalLoad::force("B", Dof::Dx, 1.0)))
            .unwrap();
        let (_, diagnostics) = run_static(&model, AnalysisOptions::default());
        assert!(diagnostics.rank_deficient);
        assert!(diagnostics
            .warnings
            .iter()
            .any(|w| matches!(w, SolverWarning::SingularSystem { .. })));
    }
}
