//! Time history analysis by Newmark-β direct integration
//!
//! `M·ü + C·u̇ + K·u = F(t)` on the free DOFs, stepping strictly forward at
//! a fixed `time_step`. Damping is Rayleigh (`C = α·M + β·K`) plus any
//! support dashpots.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::assembly;
use crate::error::{SolverError, SolverResult};
use crate::loads::assemble_load_vector;
use crate::dof::DofManager;
use crate::math::{self, Vector};
use crate::model::StructuralModel;
use crate::results::{Diagnostics, NodeDisplacement, TimeHistoryResult};

use super::dispatcher::{Milestone, SolveContext};
use super::modal::{influence_vector, natural_modes};
use super::spectrum::interpolate;
use super::Direction;

/// Time variation of a load pattern
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum TimeFunction {
    /// Suddenly applied, held constant
    #[default]
    Constant,
    /// Linear rise from zero, then held
    Ramp { rise_time: f64 },
    /// `sin(2π·f·t)`
    Harmonic { frequency: f64 },
    /// `(time, factor)` pairs, linearly interpolated, end values held
    Table { points: Vec<(f64, f64)> },
}

impl TimeFunction {
    pub fn value(&self, t: f64) -> f64 {
        match self {
            Self::Constant => 1.0,
            Self::Ramp { rise_time } if *rise_time > 0.0 => (t / rise_time).min(1.0),
            Self::Ramp { .. } => 1.0,
            Self::Harmonic { frequency } => (2.0 * PI * frequency * t).sin(),
            Self::Table { points } => interpolate(points, t).0,
        }
    }
}

/// Dynamic loading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Excitation {
    /// Support acceleration record, `F = −M·r·a_g(t)`
    GroundAcceleration {
        direction: Direction,
        /// Samples spaced `record_step` apart, starting at t = 0
        accelerations: Vec<f64>,
        /// Sample spacing; the integration step when absent
        #[serde(default)]
        record_step: Option<f64>,
    },
    /// Static load combination scaled by a time function
    LoadPattern {
        #[serde(default)]
        combination: Option<String>,
        #[serde(default)]
        time_function: TimeFunction,
    },
}

impl Default for Excitation {
    fn default() -> Self {
        Self::LoadPattern {
            combination: None,
            time_function: TimeFunction::Constant,
        }
    }
}

/// Damping model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Damping {
    /// Explicit Rayleigh coefficients
    Rayleigh { alpha: f64, beta: f64 },
    /// Damping ratio matched at the first two natural frequencies
    Ratio { ratio: f64 },
}

impl Default for Damping {
    fn default() -> Self {
        Self::Ratio { ratio: 0.05 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeHistoryParams {
    pub time_step: f64,
    pub duration: f64,
    pub excitation: Excitation,
    pub damping: Damping,
    /// Newmark β (0.25: average acceleration)
    pub beta: f64,
    /// Newmark γ
    pub gamma: f64,
}

impl Default for TimeHistoryParams {
    fn default() -> Self {
        Self {
            time_step: 0.01,
            duration: 1.0,
            excitation: Excitation::default(),
            damping: Damping::default(),
            beta: 0.25,
            gamma: 0.5,
        }
    }
}

impl TimeHistoryParams {
    fn validate(&self) -> SolverResult<()> {
        if !(self.time_step > 0.0 && self.duration > 0.0) {
            return Err(SolverError::InvalidInput(format!(
                "time_step ({}) and duration ({}) must be positive",
                self.time_step, self.duration
            )));
        }
        if self.beta <= 0.0 || self.gamma < 0.5 {
            return Err(SolverError::InvalidInput(format!(
                "Newmark parameters beta = {}, gamma = {} are not usable",
                self.beta, self.gamma
            )));
        }
        if let Excitation::GroundAcceleration { accelerations, record_step, .. } = &self.excitation {
            if accelerations.is_empty() {
                return Err(SolverError::InvalidInput("ground motion record is empty".into()));
            }
            if record_step.is_some_and(|dt| dt <= 0.0) {
                return Err(SolverError::InvalidInput("record_step must be positive".into()));
            }
        }
        if let Excitation::LoadPattern { time_function: TimeFunction::Table { points }, .. } = &self.excitation {
            if points.is_empty() {
                return Err(SolverError::InvalidInput("time function table has no points".into()));
            }
            if let Some(w) = points.windows(2).find(|w| w[1].0 <= w[0].0) {
                return Err(SolverError::InvalidInput(format!(
                    "time function table times must be strictly increasing ({} then {})",
                    w[0].0, w[1].0
                )));
            }
        }
        Ok(())
    }
}

/// Rayleigh coefficients giving damping ratio `xi` at `omega_1` and `omega_2`
pub fn rayleigh_from_ratio(xi: f64, omega_1: f64, omega_2: f64) -> (f64, f64) {
    let sum = omega_1 + omega_2;
    (2.0 * xi * omega_1 * omega_2 / sum, 2.0 * xi / sum)
}

// Free-DOF load at time t
enum Forcing {
    Ground {
        mr: Vector,
        samples: Vec<f64>,
        spacing: f64,
    },
    Pattern {
        p: Vector,
        function: TimeFunction,
    },
}

impl Forcing {
    fn at(&self, t: f64) -> Vector {
        match self {
            Self::Ground { mr, samples, spacing } => mr * -ground_acceleration(samples, *spacing, t),
            Self::Pattern { p, function } => p * function.value(t),
        }
    }
}

fn ground_acceleration(samples: &[f64], spacing: f64, t: f64) -> f64 {
    let position = t / spacing;
    let i = position.floor() as usize;
    match (samples.get(i), samples.get(i + 1)) {
        (Some(a0), Some(a1)) => a0 + (a1 - a0) * (position - i as f64),
        (Some(a0), None) if position - i as f64 <= 1e-9 => *a0,
        _ => 0.0,
    }
}

/// Run a time history analysis
pub fn run(
    model: &StructuralModel,
    params: &TimeHistoryParams,
    ctx: &mut SolveContext<'_>,
) -> SolverResult<(TimeHistoryResult, Diagnostics)> {
    params.validate()?;

    let dofs = assembly::build_dof_manager(model)?;
    ctx.milestone(Milestone::Initialized);

    let frames = assembly::element_frames(model, &dofs)?;
    let k = assembly::assemble_stiffness(model, &frames, &dofs)?;
    let m = assembly::assemble_mass_matrix(model, &frames, &dofs, ctx.options.mass)?;

    let free = dofs.free_dofs().to_vec();
    if free.is_empty() {
        return Err(SolverError::AnalysisFailed(
            "model has no free degrees of freedom".into(),
        ));
    }
    let k_ff = math::submatrix(&k, &free);
    let m_ff = math::submatrix(&m, &free);
    if m_ff.iter().all(|v| *v == 0.0) {
        return Err(SolverError::AnalysisFailed(
            "model has no mass on its free degrees of freedom".into(),
        ));
    }

    let (alpha, beta_k) = match params.damping {
        Damping::Rayleigh { alpha, beta } => (alpha, beta),
        Damping::Ratio { ratio } => {
            let (w1, w2) = match natural_modes(&k_ff, &m_ff) {
                Ok((omegas, _)) => {
                    let w1 = omegas.first().copied().unwrap_or(2.0 * PI);
                    (w1, omegas.get(1).copied().unwrap_or(w1))
                }
                Err(err) => {
                    log::warn!("{}; assuming 1 Hz and 10 Hz for Rayleigh damping", err);
                    (2.0 * PI, 20.0 * PI)
                }
            };
            rayleigh_from_ratio(ratio, w1, w2)
        }
    };
    let mut c_ff = &m_ff * alpha + &k_ff * beta_k;
    for (node, support) in &model.supports {
        let node_dofs = dofs.node_dofs(node)?;
        for (i, &c) in support.dampers.iter().enumerate() {
            if c != 0.0 {
                if let Some(pos) = dofs.free_position(node_dofs[i]) {
                    c_ff[(pos, pos)] += c;
                }
            }
        }
    }

    let forcing = match &params.excitation {
        Excitation::GroundAcceleration { direction, accelerations, record_step } => Forcing::Ground {
            mr: &m_ff * influence_vector(&dofs, *direction),
            samples: accelerations.clone(),
            spacing: record_step.unwrap_or(params.time_step),
        },
        Excitation::LoadPattern { combination, time_function } => {
            let combination = model.resolve_combination(combination.as_deref())?;
            let (p, _) = assemble_load_vector(model, &frames, &dofs, &combination)?;
            Forcing::Pattern {
                p: math::subvector(&p, &free),
                function: time_function.clone(),
            }
        }
    };
    log::info!(
        "Time history: {} free DOFs, dt = {}, duration = {}, Rayleigh alpha = {:.4e}, beta = {:.4e}",
        free.len(),
        params.time_step,
        params.duration,
        alpha,
        beta_k
    );
    ctx.milestone(Milestone::ModelBuilt);

    // Newmark integration constants
    let dt = params.time_step;
    let (beta, gamma) = (params.beta, params.gamma);
    let c0 = 1.0 / (beta * dt * dt);
    let c1 = gamma / (beta * dt);
    let c2 = 1.0 / (beta * dt);
    let c3 = 1.0 / (2.0 * beta) - 1.0;
    let c4 = gamma / beta - 1.0;
    let c5 = dt / 2.0 * (gamma / beta - 2.0);
    let c6 = dt * (1.0 - gamma);
    let c7 = gamma * dt;

    let k_eff = &k_ff + &m_ff * c0 + &c_ff * c1;
    let lu = k_eff.lu();

    let n = free.len();
    let mut u = Vector::zeros(n);
    let mut v = Vector::zeros(n);
    let mut a = math::solve_with_fallback(&m_ff, &forcing.at(0.0)).x;

    let steps = (params.duration / dt).round().max(1.0) as usize;
    let mut recorder = Recorder::new(&dofs, steps + 1);
    recorder.record(0.0, &u);

    ctx.milestone(Milestone::Solving);
    for step in 1..=steps {
        ctx.checkpoint(|| format!("time step {step} of {steps}"))?;
        let t = step as f64 * dt;

        let f_eff = forcing.at(t)
            + &m_ff * (&u * c0 + &v * c2 + &a * c3)
            + &c_ff * (&u * c1 + &v * c4 + &a * c5);
        let u_next = lu.solve(&f_eff).ok_or_else(|| {
            SolverError::AnalysisFailed("effective stiffness matrix is singular".into())
        })?;
        let a_next = (&u_next - &u) * c0 - &v * c2 - &a * c3;
        v += &a * c6 + &a_next * c7;
        a = a_next;
        u = u_next;

        recorder.record(t, &u);
        if step % 100 == 0 {
            log::debug!("Time history step {step}/{steps} (t = {t:.4})");
        }
    }

    ctx.milestone(Milestone::PostProcessing);
    let mut diagnostics = Diagnostics::for_dofs(&dofs);
    diagnostics.iterations = steps;
    let mut result = recorder.finish();
    result.rayleigh_alpha = alpha;
    result.rayleigh_beta = beta_k;
    diagnostics.max_displacement = result.max_displacement;
    log::info!(
        "Time history finished: peak displacement {:.6e} at t = {:.4}",
        result.max_displacement,
        result.max_displacement_time
    );
    Ok((result, diagnostics))
}

// Collects per-node series and peaks as the integration advances
struct Recorder {
    nodes: Vec<(String, [Option<usize>; 6])>,
    time: Vec<f64>,
    series: Vec<Vec<[f64; 6]>>,
    peaks: Vec<[f64; 6]>,
    max_displacement: f64,
    max_displacement_time: f64,
}

impl Recorder {
    fn new(dofs: &DofManager, capacity: usize) -> Self {
        let nodes: Vec<_> = dofs
            .nodes()
            .filter_map(|name| {
                let d = dofs.node_dofs(name).ok()?;
                Some((name.to_string(), d.map(|g| dofs.free_position(g))))
            })
            .collect();
        let count = nodes.len();
        Self {
            nodes,
            time: Vec::with_capacity(capacity),
            series: vec![Vec::with_capacity(capacity); count],
            peaks: vec![[0.0; 6]; count],
            max_displacement: 0.0,
            max_displacement_time: 0.0,
        }
    }

    fn record(&mut self, t: f64, u_free: &Vector) {
        self.time.push(t);
        for (i, (_, positions)) in self.nodes.iter().enumerate() {
            let sample = positions.map(|p| p.map_or(0.0, |p| u_free[p]));
            for (peak, value) in self.peaks[i].iter_mut().zip(sample) {
                if value.abs() > peak.abs() {
                    *peak = value;
                }
            }
            let translation = (sample[0].powi(2) + sample[1].powi(2) + sample[2].powi(2)).sqrt();
            if translation > self.max_displacement {
                self.max_displacement = translation;
                self.max_displacement_time = t;
            }
            self.series[i].push(sample);
        }
    }

    fn finish(self) -> TimeHistoryResult {
        let mut displacements = BTreeMap::new();
        let mut peak_displacements = BTreeMap::new();
        for (((name, _), series), peak) in self.nodes.into_iter().zip(self.series).zip(self.peaks) {
            peak_displacements.insert(name.clone(), NodeDisplacement::from_array(peak));
            displacements.insert(name, series);
        }
        TimeHistoryResult {
            time: self.time,
            displacements,
            peak_displacements,
            max_displacement: self.max_displacement,
            max_displacement_time: self.max_displacement_time,
            rayleigh_alpha: 0.0,
            rayleigh_beta: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisOptions, CancelToken};
    use crate::dof::Dof;
    use crate::elements::{Element, Material, Node, Section, Support};
    use crate::loads::{Load, NodalLoad};
    use approx::assert_relative_eq;

    const MASS: f64 = 1000.0;
    const LENGTH: f64 = 3.0;
    const FORCE: f64 = 5000.0;

    fn oscillator() -> (StructuralModel, f64) {
        let mut model = StructuralModel::new();
        model.add_node("A", Node::new(0.0, 0.0, 0.0)).unwrap();
        model.add_node("B", Node::new(LENGTH, 0.0, 0.0).with_mass(MASS)).unwrap();
        model.add_material("steel", Material::steel()).unwrap();
        model.add_section("sec", Section::rectangular(0.2, 0.4)).unwrap();
        model
            .add_element("M1", Element::new("A", "B", "steel", "sec").with_mass_per_length(1e-9))
            .unwrap();
        model.add_support("A", Support::fixed()).unwrap();
        model
            .add_load(Load::nodal("Case 1", NodalLoad::force("B", Dof::Dy, FORCE)))
            .unwrap();
        let stiffness = 3.0 * Material::steel().e * Section::rectangular(0.2, 0.4).iz / LENGTH.powi(3);
        (model, stiffness)
    }

    fn undamped(period_fraction: f64, stiffness: f64, excitation: Excitation) -> TimeHistoryParams {
        let period = 2.0 * PI * (MASS / stiffness).sqrt();
        TimeHistoryParams {
            time_step: period * period_fraction,
            duration: period,
            excitation,
            damping: Damping::Rayleigh { alpha: 0.0, beta: 0.0 },
            ..Default::default()
        }
    }

    #[test]
    fn suddenly_applied_load_doubles_static_deflection() {
        let (model, stiffness) = oscillator();
        let params = undamped(1.0 / 200.0, stiffness, Excitation::default());
        let options = AnalysisOptions::default();
        let token = CancelToken::new();
        let mut ctx = SolveContext::new(&options, &token);
        let (result, diagnostics) = run(&model, &params, &mut ctx).unwrap();

        assert_eq!(result.time.len(), 201);
        assert_eq!(result.displacements["B"].len(), 201);
        assert_relative_eq!(result.peak_displacements["B"].dy, 2.0 * FORCE / stiffness, max_relative = 2e-3);
        assert_eq!(result.peak_displacements["A"].dy, 0.0);
        assert_eq!(diagnostics.iterations, 200);
    }

    #[test]
    fn constant_ground_acceleration_acts_as_inertial_load() {
        let (model, stiffness) = oscillator();
        let ag = 2.0;
        let excitation = Excitation::GroundAcceleration {
            direction: Direction::Y,
            accelerations: vec![ag; 400],
            record_step: None,
        };
        let params = undamped(1.0 / 200.0, stiffness, excitation);
        let options = AnalysisOptions::default();
        let token = CancelToken::new();
        let mut ctx = SolveContext::new(&options, &token);
        let (result, _) = run(&model, &params, &mut ctx).unwrap();

        assert_relative_eq!(
            result.peak_displacements["B"].dy,
            -2.0 * MASS * ag / stiffness,
            max_relative = 2e-3
        );
    }

    #[test]
    fn rayleigh_ratio_matches_at_both_frequencies() {
        let (alpha, beta) = rayleigh_from_ratio(0.05, 10.0, 30.0);
        let ratio = |w: f64| alpha / (2.0 * w) + beta * w / 2.0;
        assert_relative_eq!(ratio(10.0), 0.05, max_relative = 1e-12);
        assert_relative_eq!(ratio(30.0), 0.05, max_relative = 1e-12);
    }

    #[test]
    fn cancellation_stops_between_steps() {
        let (model, stiffness) = oscillator();
        let params = undamped(1.0 / 50.0, stiffness, Excitation::default());
        let options = AnalysisOptions::default();
        let token = CancelToken::new();
        token.cancel();
        let mut ctx = SolveContext::new(&options, &token);
        assert!(matches!(
            run(&model, &params, &mut ctx),
            Err(SolverError::Cancelled(_))
        ));
    }

    fn run_ok(model: &StructuralModel, params: &TimeHistoryParams) -> TimeHistoryResult {
        let options = AnalysisOptions::default();
        let token = CancelToken::new();
        let mut ctx = SolveContext::new(&options, &token);
        run(model, params, &mut ctx).unwrap().0
    }

    // Peak-to-peak tip motion over the final natural period
    fn final_cycle_amplitude(result: &TimeHistoryResult, period: f64) -> f64 {
        let end = result.time.last().copied().unwrap_or(0.0);
        let (lo, hi) = result
            .time
            .iter()
            .zip(&result.displacements["B"])
            .filter(|(t, _)| **t >= end - period)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, d)| (lo.min(d[1]), hi.max(d[1])));
        hi - lo
    }

    #[test]
    fn support_dashpot_damps_free_vibration() {
        let (plain, stiffness) = oscillator();
        let period = 2.0 * PI * (MASS / stiffness).sqrt();
        // Short pulse, then free vibration for three periods
        let pulse = TimeFunction::Table {
            points: vec![(0.0, 1.0), (0.25 * period, 1.0), (0.3 * period, 0.0)],
        };
        let mut params = undamped(1.0 / 100.0, stiffness, Excitation::LoadPattern {
            combination: None,
            time_function: pulse,
        });
        params.duration = 3.0 * period;

        let critical = 2.0 * (stiffness * MASS).sqrt();
        let mut damped = plain.clone();
        damped
            .add_support("B", Support::default().with_damper(Dof::Dy, 0.2 * critical))
            .unwrap();

        let free = final_cycle_amplitude(&run_ok(&plain, &params), period);
        let decayed = final_cycle_amplitude(&run_ok(&damped, &params), period);
        assert!(free > 0.5 * FORCE / stiffness);
        assert!(decayed < 0.5 * free, "damped {decayed} vs undamped {free}");
    }

    #[test]
    fn unsorted_time_table_is_rejected() {
        let (model, stiffness) = oscillator();
        let table = TimeFunction::Table { points: vec![(0.0, 0.0), (0.5, 1.0), (0.2, 0.5)] };
        let params = undamped(1.0 / 50.0, stiffness, Excitation::LoadPattern {
            combination: None,
            time_function: table,
        });
        let options = AnalysisOptions::default();
        let token = CancelToken::new();
        let mut ctx = SolveContext::new(&options, &token);
        let err = run(&model, &params, &mut ctx).unwrap_err();
        assert!(matches!(err, SolverError::InvalidInput(ref m) if m.contains("strictly increasing")));
    }

    #[test]
    fn time_functions() {
        assert_eq!(TimeFunction::Ramp { rise_time: 2.0 }.value(1.0), 0.5);
        assert_eq!(TimeFunction::Ramp { rise_time: 2.0 }.value(3.0), 1.0);
        let table = TimeFunction::Table { points: vec![(0.0, 0.0), (1.0, 2.0)] };
        assert_relative_eq!(table.value(0.25), 0.5, max_relative = 1e-12);
        assert!(TimeFunction::Harmonic { frequency: 1.0 }.value(0.0).abs() < 1e-15);
    }
}
