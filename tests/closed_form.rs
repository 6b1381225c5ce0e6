use approx::assert_relative_eq;
use frame_solver::analysis::{AnalysisParameters, BucklingParams, StaticParams};
use frame_solver::prelude::*;
use frame_solver::results::StaticResult;
use std::f64::consts::PI;

fn steel_e() -> f64 {
    Material::steel().e
}

fn solve_static(model: &StructuralModel) -> (StaticResult, AnalysisResult) {
    let mut case = AnalysisCase::new(
        "static",
        AnalysisParameters::LinearStatic(StaticParams::default()),
    )
    .with_options(AnalysisOptions::default().with_statics_check());
    let result = run_analysis(&mut case, model, None, &CancelToken::new()).unwrap();
    let statics = result.payload.static_result().unwrap().clone();
    (statics, result)
}

#[test]
fn cantilever_tip_deflection() {
    // P L³ / 3EI for a 5 m cantilever
    let length = 5.0;
    let load = 1000.0;
    let section = Section::rectangular(0.2, 0.3);

    let mut model = StructuralModel::new();
    model.add_material("Steel", Material::steel()).unwrap();
    model.add_section("R", section.clone()).unwrap();
    model.add_node("N1", Node::new(0.0, 0.0, 0.0)).unwrap();
    model.add_node("N2", Node::new(length, 0.0, 0.0)).unwrap();
    model.add_element("M1", Element::new("N1", "N2", "Steel", "R")).unwrap();
    model.add_support("N1", Support::fixed()).unwrap();
    model
        .add_load(Load::nodal("Case 1", NodalLoad::force("N2", Dof::Dy, -load)))
        .unwrap();

    let (statics, result) = solve_static(&model);
    let ei = steel_e() * section.iz;
    let expected = load * length.powi(3) / (3.0 * ei);
    let tip = &statics.displacements["N2"];
    assert_relative_eq!(tip.dy, -expected, max_relative = 1e-9);
    assert_relative_eq!(tip.rz, -load * length * length / (2.0 * ei), max_relative = 1e-9);

    let base = &statics.reactions["N1"];
    assert_relative_eq!(base.fy, load, max_relative = 1e-9);
    assert_relative_eq!(base.mz.abs(), load * length, max_relative = 1e-9);
    assert!(result.diagnostics.statics_residual.unwrap() < 1e-6);
}

#[test]
fn reference_vector_turns_bending_into_the_vertical_plane() {
    // Local y along global +Z: a vertical tip load bends about local z
    let length = 4.0;
    let load = 2000.0;
    let section = Section::rectangular(0.2, 0.3);

    let mut model = StructuralModel::new();
    model.add_material("Steel", Material::steel()).unwrap();
    model.add_section("R", section.clone()).unwrap();
    model.add_node("N1", Node::new(0.0, 0.0, 0.0).with_label("Wall")).unwrap();
    model.add_node("N2", Node::new(length, 0.0, 0.0).with_label("Tip")).unwrap();
    model
        .add_element(
            "M1",
            Element::new("N1", "N2", "Steel", "R").with_reference_vector([0.0, 0.0, 1.0]),
        )
        .unwrap();
    model.add_support("N1", Support::fixed()).unwrap();
    model
        .add_load(Load::nodal("Case 1", NodalLoad::force("N2", Dof::Dz, -load)))
        .unwrap();

    let job = frame_solver::analysis::AnalysisJob {
        case: AnalysisCase::for_type("oriented", "LINEAR_STATIC").unwrap(),
        model,
    };
    let json = serde_json::to_string(&job).unwrap();
    let job: frame_solver::analysis::AnalysisJob = serde_json::from_str(&json).unwrap();
    assert_eq!(job.model.nodes["N2"].label.as_deref(), Some("Tip"));
    assert_eq!(job.model.elements["M1"].reference_vector, Some([0.0, 0.0, 1.0]));

    let (statics, _) = solve_static(&job.model);
    let ei = steel_e() * section.iz;
    let tip = &statics.displacements["N2"];
    assert_relative_eq!(tip.dz, -load * length.powi(3) / (3.0 * ei), max_relative = 1e-9);
    assert!(tip.dy.abs() < 1e-15);

    let forces = &statics.element_forces["M1"];
    assert_relative_eq!(forces.local[1].abs(), load, max_relative = 1e-9);
    assert!(forces.local[2].abs() < 1e-6);
    assert_relative_eq!(forces.local[5].abs(), load * length, max_relative = 1e-9);
    assert!(forces.local[4].abs() < 1e-6);
}

#[test]
fn simply_supported_udl_matches_beam_theory() {
    // 4 elements: consistent nodal loads give exact nodal deflections
    let length = 8.0;
    let w = -12e3;
    let section = Section::rectangular(0.3, 0.5);

    let mut model = StructuralModel::new();
    model.add_material("Steel", Material::steel()).unwrap();
    model.add_section("R", section.clone()).unwrap();
    for i in 0..=4 {
        model
            .add_node(&format!("N{i}"), Node::new(length * i as f64 / 4.0, 0.0, 0.0))
            .unwrap();
    }
    for i in 0..4 {
        let name = format!("M{i}");
        model
            .add_element(&name, Element::new(&format!("N{i}"), &format!("N{}", i + 1), "Steel", "R"))
            .unwrap();
        model
            .add_load(Load::distributed(
                "Case 1",
                DistributedLoad::uniform(&name, w, LoadDirection::FY),
            ))
            .unwrap();
    }
    model
        .add_support("N0", Support::with_restraints([true, true, true, true, false, false]))
        .unwrap();
    model
        .add_support("N4", Support::with_restraints([false, true, true, false, false, false]))
        .unwrap();

    let (statics, result) = solve_static(&model);
    let ei = steel_e() * section.iz;
    let midspan = 5.0 * w * length.powi(4) / (384.0 * ei);
    assert_relative_eq!(statics.displacements["N2"].dy, midspan, max_relative = 1e-9);

    // End rotation wL³/24EI
    let rotation = w * length.powi(3) / (24.0 * ei);
    assert_relative_eq!(statics.displacements["N0"].rz, rotation, max_relative = 1e-9);
    assert_relative_eq!(statics.reactions["N0"].fy, -w * length / 2.0, max_relative = 1e-9);
    assert!(!result.diagnostics.rank_deficient);
}

#[test]
fn distributed_load_equals_its_nodal_equivalent() {
    // Fixed-fixed beam: a UDL on one element against the same beam loaded
    // with the free-node share of the consistent nodal loads
    let build = |distributed: bool| {
        let mut model = StructuralModel::new();
        model.add_material("Steel", Material::steel()).unwrap();
        model.add_section("R", Section::rectangular(0.2, 0.4)).unwrap();
        model.add_node("A", Node::new(0.0, 0.0, 0.0)).unwrap();
        model.add_node("B", Node::new(3.0, 0.0, 0.0)).unwrap();
        model.add_node("C", Node::new(6.0, 0.0, 0.0)).unwrap();
        model.add_element("AB", Element::new("A", "B", "Steel", "R")).unwrap();
        model.add_element("BC", Element::new("B", "C", "Steel", "R")).unwrap();
        model.add_support("A", Support::fixed()).unwrap();
        model.add_support("C", Support::fixed()).unwrap();
        let load = if distributed {
            Load::distributed("Case 1", DistributedLoad::uniform("AB", -10e3, LoadDirection::FY))
        } else {
            // wL/2 and -wL²/12 at the far end of AB
            Load::nodal("Case 1", NodalLoad::new("B", [0.0, -15e3, 0.0, 0.0, 0.0, 7.5e3]))
        };
        model.add_load(load).unwrap();
        model
    };

    let (distributed, _) = solve_static(&build(true));
    let (nodal, _) = solve_static(&build(false));
    let d = distributed.displacements["B"].as_array();
    let n = nodal.displacements["B"].as_array();
    for k in 0..6 {
        assert_relative_eq!(d[k], n[k], epsilon = 1e-15, max_relative = 1e-9);
    }
    // Same displacements, so the loaded member differs by its fixed-end forces
    let fd = &distributed.element_forces["AB"].local;
    let fn_ = &nodal.element_forces["AB"].local;
    assert_relative_eq!(fd[1] - fn_[1], 15e3, max_relative = 1e-6);
    assert_relative_eq!(fd[7] - fn_[7], 15e3, max_relative = 1e-6);
    assert_relative_eq!((fd[5] - fn_[5]).abs(), 7.5e3, max_relative = 1e-6);
}

#[test]
fn euler_pin_pin_column() {
    let height = 6.0;
    let segments = 10;
    let section = Section::circular(0.15);

    let mut model = StructuralModel::new();
    model.add_material("Steel", Material::steel()).unwrap();
    model.add_section("C", section.clone()).unwrap();
    for i in 0..=segments {
        let y = height * i as f64 / segments as f64;
        model.add_node(&format!("N{i}"), Node::new(0.0, y, 0.0)).unwrap();
    }
    for i in 0..segments {
        model
            .add_element(
                &format!("E{i}"),
                Element::new(&format!("N{i}"), &format!("N{}", i + 1), "Steel", "C"),
            )
            .unwrap();
    }
    model
        .add_support("N0", Support::with_restraints([true, true, true, false, true, false]))
        .unwrap();
    model
        .add_support(
            &format!("N{segments}"),
            Support::with_restraints([true, false, true, false, false, false]),
        )
        .unwrap();
    model
        .add_load(Load::nodal(
            "Case 1",
            NodalLoad::force(&format!("N{segments}"), Dof::Dy, -1.0),
        ))
        .unwrap();

    let mut case = AnalysisCase::new(
        "buckling",
        AnalysisParameters::Buckling(BucklingParams {
            num_modes: 3,
            ..Default::default()
        }),
    );
    let result = run_analysis(&mut case, &model, None, &CancelToken::new()).unwrap();
    let ResultPayload::Buckling(buckling) = result.payload else {
        panic!("expected a buckling payload");
    };

    let p_cr = PI * PI * steel_e() * section.iz / (height * height);
    assert_relative_eq!(buckling.critical_factor.unwrap(), p_cr, max_relative = 1e-3);
    let shape = &buckling.modes[0].shape;
    let mid = &shape[&format!("N{}", segments / 2)];
    assert_relative_eq!(mid.dx.abs().max(mid.dz.abs()), 1.0, max_relative = 1e-9);
}
