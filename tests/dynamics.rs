use approx::assert_relative_eq;
use frame_solver::analysis::{
    Damping, Excitation, ModalCombination, ModalParams, SpectrumParams, TimeFunction, TimeHistoryParams,
};
use frame_solver::prelude::*;
use frame_solver::results::ModalResult;

/// Three-storey column with lumped floor masses
fn stick_model() -> StructuralModel {
    let mut model = StructuralModel::new();
    model.add_material("Steel", Material::steel()).unwrap();
    model.add_section("Col", Section::rectangular(0.3, 0.4)).unwrap();
    model.add_node("N0", Node::new(0.0, 0.0, 0.0)).unwrap();
    for i in 1..=3 {
        model
            .add_node(&format!("N{i}"), Node::new(0.0, 3.0 * i as f64, 0.0).with_mass(5000.0))
            .unwrap();
        model
            .add_element(
                &format!("C{i}"),
                Element::new(&format!("N{}", i - 1), &format!("N{i}"), "Steel", "Col"),
            )
            .unwrap();
    }
    model.add_support("N0", Support::fixed()).unwrap();
    model
        .add_load(Load::nodal("Case 1", NodalLoad::force("N3", Dof::Dx, 10e3)))
        .unwrap();
    model
}

fn run(model: &StructuralModel, parameters: AnalysisParameters) -> AnalysisResult {
    let mut case = AnalysisCase::new("dynamic", parameters);
    let result = run_analysis(&mut case, model, None, &CancelToken::new()).unwrap();
    assert_eq!(case.status, AnalysisStatus::Completed);
    result
}

fn modal(model: &StructuralModel, num_modes: usize) -> (ModalResult, AnalysisResult) {
    let result = run(model, AnalysisParameters::Modal(ModalParams { num_modes }));
    let ResultPayload::Modal(modal) = result.payload.clone() else {
        panic!("expected a modal payload");
    };
    (modal, result)
}

#[test]
fn modes_are_ordered_and_mass_ratios_accumulate() {
    let model = stick_model();
    let (modal, _) = modal(&model, 8);

    assert_eq!(modal.modes.len(), 8);
    for pair in modal.modes.windows(2) {
        assert!(pair[1].angular_frequency >= pair[0].angular_frequency);
        for d in 0..3 {
            assert!(pair[1].cumulative_mass_ratios[d] >= pair[0].cumulative_mass_ratios[d] - 1e-12);
        }
    }
    for (i, mode) in modal.modes.iter().enumerate() {
        assert_eq!(mode.mode, i + 1);
        assert_relative_eq!(mode.period * mode.frequency, 1.0, max_relative = 1e-12);
        assert_relative_eq!(mode.eigenvalue, mode.angular_frequency.powi(2), max_relative = 1e-9);
        let peak = mode
            .shape
            .values()
            .flat_map(|d| [d.dx, d.dy, d.dz])
            .fold(0.0_f64, |acc, v| acc.max(v.abs()));
        assert_relative_eq!(peak, 1.0, max_relative = 1e-9);
    }
    // The first sway mode in each lateral direction carries most of its mass
    let first_x = modal
        .modes
        .iter()
        .map(|m| m.effective_mass_ratios[0])
        .fold(0.0_f64, f64::max);
    assert!(first_x > 0.5);
}

#[test]
fn requesting_too_many_modes_is_clamped() {
    let model = stick_model();
    let (modal, result) = modal(&model, 500);

    assert!(modal.modes.len() < 500);
    assert!(modal.modes.len() <= result.diagnostics.free_dofs);
    assert!(result
        .diagnostics
        .warnings
        .iter()
        .any(|w| matches!(w, SolverWarning::ModesClamped { requested: 500, .. })));
    let last = modal.modes.last().unwrap();
    assert_relative_eq!(last.cumulative_mass_ratios[0], 1.0, max_relative = 1e-6);
}

#[test]
fn spectrum_base_shear_is_bounded_by_total_mass() {
    let model = stick_model();
    let sa = 2.5;
    let total_mass = modal(&model, 1).0.total_mass[0];
    for rule in [ModalCombination::Srss, ModalCombination::Cqc, ModalCombination::Abs] {
        let result = run(
            &model,
            AnalysisParameters::ResponseSpectrum(SpectrumParams {
                num_modes: 18,
                spectrum: vec![(0.0, sa), (5.0, sa)],
                combination_rule: rule,
                direction: Direction::X,
                ..Default::default()
            }),
        );
        let ResultPayload::ResponseSpectrum(spectrum) = result.payload else {
            panic!("expected a spectrum payload");
        };
        assert!(spectrum.base_shear > 0.5 * total_mass * sa);
        // Flat spectrum with every mode: modal shears sum to the full mass times Sa
        let sum: f64 = spectrum.modal_base_shears.iter().sum();
        assert_relative_eq!(sum, total_mass * sa, max_relative = 1e-6);
        if rule == ModalCombination::Abs {
            assert_relative_eq!(spectrum.base_shear, sum, max_relative = 1e-12);
        }
        assert!(spectrum.displacements["N3"].dx > 0.0);
        assert_eq!(spectrum.displacements["N0"].dx, 0.0);
    }
}

#[test]
fn damped_ramp_load_settles_at_static_deflection() {
    let model = stick_model();
    let static_result = run(&model, AnalysisParameters::LinearStatic(Default::default()));
    let static_tip = static_result.payload.static_result().unwrap().displacements["N3"].dx;

    let (modal, _) = modal(&model, 1);
    let period = modal.modes[0].period;
    let result = run(
        &model,
        AnalysisParameters::TimeHistory(TimeHistoryParams {
            time_step: period / 50.0,
            duration: 20.0 * period,
            excitation: Excitation::LoadPattern {
                combination: None,
                time_function: TimeFunction::Ramp { rise_time: 5.0 * period },
            },
            damping: Damping::Ratio { ratio: 0.1 },
            ..Default::default()
        }),
    );
    let ResultPayload::TimeHistory(history) = result.payload else {
        panic!("expected a time history payload");
    };

    let series = &history.displacements["N3"];
    assert_eq!(series.len(), history.time.len());
    assert_eq!(series[0][0], 0.0);
    let last = series.last().unwrap()[0];
    assert_relative_eq!(last, static_tip, max_relative = 0.02);
    assert!(history.peak_displacements["N3"].dx >= last);
    assert!(history.rayleigh_alpha > 0.0 && history.rayleigh_beta > 0.0);
}
