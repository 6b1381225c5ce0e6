use approx::assert_relative_eq;
use frame_solver::analysis::{AnalysisJob, NonlinearParams, StaticParams};
use frame_solver::prelude::*;

fn cantilever() -> StructuralModel {
    let mut model = StructuralModel::new();
    model.add_material("Steel", Material::steel()).unwrap();
    model.add_section("R", Section::rectangular(0.2, 0.3)).unwrap();
    model.add_node("N1", Node::new(0.0, 0.0, 0.0)).unwrap();
    model.add_node("N2", Node::new(5.0, 0.0, 0.0)).unwrap();
    model.add_element("M1", Element::new("N1", "N2", "Steel", "R")).unwrap();
    model.add_support("N1", Support::fixed()).unwrap();
    model
        .add_load(Load::nodal("Case 1", NodalLoad::force("N2", Dof::Dy, -1000.0)))
        .unwrap();
    model
}

#[test]
fn linear_static_end_to_end() {
    let model = cantilever();
    let mut case = AnalysisCase::for_type("end to end", "LINEAR_STATIC").unwrap();
    assert_eq!(case.status, AnalysisStatus::Pending);

    let mut seen = Vec::new();
    let mut observer = |m: Milestone| seen.push(m);
    let result = run_analysis(&mut case, &model, Some(&mut observer), &CancelToken::new()).unwrap();

    assert_eq!(case.status, AnalysisStatus::Completed);
    assert_relative_eq!(case.progress, 100.0);
    assert!(case.started_at.is_some() && case.completed_at.is_some());
    assert!(case.execution_time_seconds.is_some());
    assert!(case.error_message.is_none());
    assert_eq!(result.case_id, case.id);
    assert_eq!(result.analysis_type, AnalysisType::LinearStatic);

    assert_eq!(seen.first(), Some(&Milestone::DataLoaded));
    assert_eq!(seen.last(), Some(&Milestone::Completed));
    assert!(seen.windows(2).all(|w| w[0] < w[1]));

    let statics = result.payload.static_result().unwrap();
    assert_relative_eq!(statics.reactions["N1"].fy, 1000.0, max_relative = 1e-9);
    assert!(statics.displacements["N2"].dy < 0.0);
    assert!(result.diagnostics.converged);
    assert_eq!(result.diagnostics.total_dofs, 12);
    assert_eq!(result.diagnostics.free_dofs, 6);
}

#[test]
fn repeated_runs_are_identical() {
    let model = cantilever();
    let mut case = AnalysisCase::new(
        "repeat",
        AnalysisParameters::LinearStatic(StaticParams::default()),
    );
    let first = run_analysis(&mut case, &model, None, &CancelToken::new()).unwrap();
    case.reset();
    assert_eq!(case.status, AnalysisStatus::Pending);
    let second = run_analysis(&mut case, &model, None, &CancelToken::new()).unwrap();

    let a = first.payload.static_result().unwrap();
    let b = second.payload.static_result().unwrap();
    for (node, da) in &a.displacements {
        let db = &b.displacements[node];
        for (x, y) in da.as_array().iter().zip(db.as_array()) {
            assert!((x - y).abs() <= 1e-9);
        }
    }
}

#[test]
fn running_a_finished_case_again_is_rejected() {
    let model = cantilever();
    let mut case = AnalysisCase::for_type("once", "MODAL").unwrap();
    run_analysis(&mut case, &model, None, &CancelToken::new()).unwrap();
    let err = run_analysis(&mut case, &model, None, &CancelToken::new()).unwrap_err();
    assert!(matches!(err, SolverError::InvalidInput(_)));
    assert_eq!(case.status, AnalysisStatus::Completed);
}

#[test]
fn unsupported_type_is_rejected() {
    let err = AnalysisCase::for_type("bad", "HARMONIC").unwrap_err();
    assert!(matches!(err, SolverError::UnsupportedAnalysisType(ref t) if t == "HARMONIC"));

    let json = r#"{ "name": "bad", "parameters": { "type": "HARMONIC" } }"#;
    assert!(serde_json::from_str::<AnalysisCase>(json).is_err());
}

#[test]
fn input_errors_fail_the_case() {
    let mut model = cantilever();
    model.elements.get_mut("M1").unwrap().section = "Missing".to_string();

    let mut case = AnalysisCase::for_type("broken", "LINEAR_STATIC").unwrap();
    let err = run_analysis(&mut case, &model, None, &CancelToken::new()).unwrap_err();
    assert_eq!(case.status, AnalysisStatus::Failed);
    assert_eq!(case.error_message.as_deref(), Some(err.to_string().as_str()));
}

#[test]
fn job_loads_from_json() {
    let model = serde_json::to_value(cantilever()).unwrap();
    let json = serde_json::json!({
        "model": model,
        "case": {
            "name": "from json",
            "parameters": { "type": "NONLINEAR_STATIC", "load_steps": 4 },
            "options": { "tolerance": 1e-8 }
        }
    });
    let mut job: AnalysisJob = serde_json::from_value(json).unwrap();
    match &job.case.parameters {
        AnalysisParameters::NonlinearStatic(params) => {
            assert_eq!(params.load_steps, 4);
            assert_eq!(params.stepping, NonlinearParams::default().stepping);
        }
        other => panic!("unexpected parameters {other:?}"),
    }

    let result = run_analysis(&mut job.case, &job.model, None, &CancelToken::new()).unwrap();
    let ResultPayload::NonlinearStatic(nonlinear) = result.payload else {
        panic!("expected a nonlinear payload");
    };
    assert_eq!(nonlinear.steps.len(), 4);
    assert_relative_eq!(nonlinear.final_load_factor, 1.0);
}

#[test]
fn manager_runs_jobs_in_parallel() {
    let mut manager = AnalysisManager::new();
    let ok = manager.submit(AnalysisCase::for_type("static", "LINEAR_STATIC").unwrap(), cantilever());
    let pd = manager.submit(AnalysisCase::for_type("p-delta", "P_DELTA").unwrap(), cantilever());
    let bad = manager.submit(
        AnalysisCase::for_type("no mass", "MODAL").unwrap(),
        StructuralModel::new(),
    );
    manager.run_all_parallel();

    assert_eq!(manager.pending(), 0);
    assert_eq!(manager.status(&ok), Some(AnalysisStatus::Completed));
    assert_eq!(manager.status(&pd), Some(AnalysisStatus::Completed));
    assert_eq!(manager.status(&bad), Some(AnalysisStatus::Failed));
    assert!(manager.result(&ok).is_some());
    assert!(manager.failed()[&bad].error_message.is_some());
}
