//! Command-line runner: solve one analysis job read from JSON
//!
//! ```text
//! frame-solve [job.json] [--json]
//! ```
//!
//! A job is `{ "model": {...}, "case": {...} }`. Without a path a portal
//! frame demo is solved. `RUST_LOG` controls log output.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use frame_solver::analysis::{AnalysisJob, StaticParams};
use frame_solver::prelude::*;
use frame_solver::results::AnalysisSummary;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut path: Option<PathBuf> = None;
    let mut emit_json = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--json" => emit_json = true,
            "-h" | "--help" => {
                println!("usage: frame-solve [job.json] [--json]");
                return Ok(());
            }
            other if other.starts_with('-') => bail!("unknown option '{other}'"),
            other => path = Some(PathBuf::from(other)),
        }
    }

    let mut job = match &path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<AnalysisJob>(&text)
                .with_context(|| format!("parsing job {}", path.display()))?
        }
        None => portal_frame_job()?,
    };

    let mut report = |milestone: Milestone| {
        log::info!("[{:>3.0}%] {}", milestone.percent(), milestone.label());
    };
    let outcome = run_analysis(&mut job.case, &job.model, Some(&mut report), &CancelToken::new());
    let result = match outcome {
        Ok(result) => result,
        Err(err) => {
            let status = job.case.status;
            return Err(anyhow::Error::new(err).context(format!(
                "analysis '{}' ended {:?}",
                job.case.name, status
            )));
        }
    };

    if emit_json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    print_report(&job.case, &job.model, &result);
    Ok(())
}

fn print_report(case: &AnalysisCase, model: &StructuralModel, result: &AnalysisResult) {
    println!("=== {} ({}) ===", case.name, result.analysis_type);
    let diagnostics = &result.diagnostics;
    println!(
        "DOFs: {} total, {} free; solve time {:.3} s",
        diagnostics.total_dofs, diagnostics.free_dofs, diagnostics.solve_time
    );
    for warning in &diagnostics.warnings {
        println!("warning: {}", warning);
    }

    match &result.payload {
        ResultPayload::LinearStatic(r) | ResultPayload::PDelta(r) => {
            let summary = AnalysisSummary::from_static(r, diagnostics);
            println!(
                "Max displacement {:.6e} at {}",
                summary.max_displacement, summary.max_displacement_node
            );
            println!("Max reaction {:.3} at {}", summary.max_reaction, summary.max_reaction_node);
            println!("Max moment {:.3} in {}", summary.max_moment, summary.max_moment_element);
            for (node, d) in &r.displacements {
                let label = model
                    .nodes
                    .get(node)
                    .and_then(|n| n.label.as_deref())
                    .unwrap_or("");
                println!(
                    "  {:<8} {:<10} DX={:+.6e} DY={:+.6e} DZ={:+.6e}",
                    node, label, d.dx, d.dy, d.dz
                );
            }
        }
        ResultPayload::Modal(r) => {
            for mode in &r.modes {
                println!(
                    "  Mode {:>2}: f = {:.4} Hz, T = {:.4} s, mass X/Y/Z = {:.3}/{:.3}/{:.3}",
                    mode.mode,
                    mode.frequency,
                    mode.period,
                    mode.effective_mass_ratios[0],
                    mode.effective_mass_ratios[1],
                    mode.effective_mass_ratios[2]
                );
            }
        }
        ResultPayload::ResponseSpectrum(r) => {
            println!(
                "{:?} combination of {} modes: base shear {:.3}",
                r.combination_rule, r.modes_used, r.base_shear
            );
        }
        ResultPayload::TimeHistory(r) => {
            println!(
                "{} steps, peak displacement {:.6e} at t = {:.4} s",
                r.time.len().saturating_sub(1),
                r.max_displacement,
                r.max_displacement_time
            );
        }
        ResultPayload::NonlinearStatic(r) => {
            for step in &r.steps {
                println!(
                    "  Step {:>2}: factor {:.3}, {} iterations, {}",
                    step.step,
                    step.load_factor,
                    step.iterations,
                    if step.converged { "converged" } else { "NOT converged" }
                );
            }
            for hinge in &r.hinges {
                println!("  Hinge: {} end {:?} at step {}", hinge.element, hinge.end, hinge.step);
            }
        }
        ResultPayload::Buckling(r) => {
            for mode in &r.modes {
                println!("  Mode {:>2}: load factor {:.4}", mode.mode, mode.load_factor);
            }
        }
    }
}

// Portal frame with a gravity load on the beam and a lateral push
fn portal_frame_job() -> Result<AnalysisJob> {
    let height = 4.0;
    let span = 6.0;

    let mut model = StructuralModel::new();
    model.add_material("Steel", Material::steel())?;
    model.add_section("Column", Section::i_section(0.3, 0.15, 0.012, 0.008))?;
    model.add_section("Beam", Section::i_section(0.4, 0.18, 0.014, 0.009))?;

    model.add_node("N1", Node::new(0.0, 0.0, 0.0).with_label("Base left"))?;
    model.add_node("N2", Node::new(span, 0.0, 0.0).with_label("Base right"))?;
    model.add_node("N3", Node::new(0.0, height, 0.0).with_label("Knee left"))?;
    model.add_node("N4", Node::new(span, height, 0.0).with_label("Knee right"))?;

    model.add_element("Col1", Element::new("N1", "N3", "Steel", "Column"))?;
    model.add_element("Col2", Element::new("N2", "N4", "Steel", "Column"))?;
    model.add_element("Beam", Element::new("N3", "N4", "Steel", "Beam"))?;

    model.add_support("N1", Support::fixed())?;
    model.add_support("N2", Support::fixed())?;

    model.add_load(Load::distributed(
        "Dead",
        DistributedLoad::uniform("Beam", -15e3, LoadDirection::FY),
    ))?;
    model.add_load(Load::nodal("Wind", NodalLoad::force("N3", Dof::Dx, 20e3)))?;
    model.add_combination(
        LoadCombination::new("1.2D+1.6W")
            .with_case("Dead", 1.2)
            .with_case("Wind", 1.6),
    )?;

    let case = AnalysisCase::new(
        "Portal frame demo",
        AnalysisParameters::LinearStatic(StaticParams::for_combination("1.2D+1.6W")),
    )
    .with_options(AnalysisOptions::default().with_statics_check());
    Ok(AnalysisJob { case, model })
}
